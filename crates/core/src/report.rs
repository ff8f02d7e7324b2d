//! Before/after comparisons and plain-text reports over captured
//! snapshots.

use serde::Serialize;

use crate::error::CoreError;
use crate::resolution::ResolutionSummary;
use crate::snapshot::{Snapshot, ThreadInfo};
use crate::store::{EnrichedSnapshot, StateStore};
use crate::tracker::ResolutionTracker;
use crate::types::Timestamp;

/// The counts of one side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSummary {
    pub sequence: u64,
    pub captured_at: Timestamp,
    pub threads: usize,
    pub locks: usize,
    pub deadlocked: usize,
    pub detected: bool,
}

impl From<&EnrichedSnapshot> for CaptureSummary {
    fn from(entry: &EnrichedSnapshot) -> Self {
        Self {
            sequence: entry.sequence,
            captured_at: entry.captured_at,
            threads: entry.thread_count,
            locks: entry.lock_count,
            deadlocked: entry.deadlocked_count,
            detected: entry.deadlock_detected(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub before: CaptureSummary,
    pub after: CaptureSummary,
    pub thread_delta: i64,
    pub lock_delta: i64,
    pub deadlocked_delta: i64,
    pub deadlock_cleared: bool,
}

/// Compare the last two captures held by `store`.
pub fn compare(store: &StateStore) -> Result<Comparison, CoreError> {
    let (before, after) = store.latest_pair()?;
    Ok(compare_entries(before, after))
}

pub fn compare_entries(before: &EnrichedSnapshot, after: &EnrichedSnapshot) -> Comparison {
    let before = CaptureSummary::from(before);
    let after = CaptureSummary::from(after);
    Comparison {
        thread_delta: delta(before.threads, after.threads),
        lock_delta: delta(before.locks, after.locks),
        deadlocked_delta: delta(before.deadlocked, after.deadlocked),
        deadlock_cleared: before.detected && !after.detected,
        before,
        after,
    }
}

fn delta(before: usize, after: usize) -> i64 {
    after as i64 - before as i64
}

fn signed(value: i64) -> String {
    if value >= 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

fn timestamp(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Render a comparison as text with signed deltas.
pub fn render_comparison(comparison: &Comparison) -> String {
    let mut out = String::from("BEFORE/AFTER COMPARISON\n");
    for (title, side) in [("BEFORE", &comparison.before), ("AFTER", &comparison.after)] {
        out.push_str(&format!(
            "\n{title} (capture #{}, {}):\n",
            side.sequence,
            timestamp(&side.captured_at)
        ));
        out.push_str(&format!("  Threads: {}\n", side.threads));
        out.push_str(&format!("  Locks: {}\n", side.locks));
        out.push_str(&format!("  Deadlocked threads: {}\n", side.deadlocked));
        out.push_str(&format!("  Deadlock: {}\n", yes_no(side.detected)));
    }
    out.push_str("\nCHANGES:\n");
    out.push_str(&format!("  Threads: {}\n", signed(comparison.thread_delta)));
    out.push_str(&format!("  Locks: {}\n", signed(comparison.lock_delta)));
    out.push_str(&format!(
        "  Deadlocked threads: {}\n",
        signed(comparison.deadlocked_delta)
    ));
    if comparison.deadlock_cleared {
        out.push_str("  Deadlock CLEARED\n");
    } else {
        out.push_str("  Status unchanged\n");
    }
    out
}

/// Render a capture as a text report.
///
/// Sections with no data behind them are left out.
pub fn render_report(entry: &EnrichedSnapshot) -> String {
    let mut sections = vec![header(entry), deadlock_status(entry)];
    if let Some(resolution) = &entry.resolution {
        sections.push(auto_resolution(resolution));
        if !resolution.recent_events.is_empty() {
            sections.push(recent_events(resolution));
        }
    }
    if !entry.snapshot.threads.is_empty() {
        sections.push(thread_detail(&entry.snapshot));
    }
    sections.join("\n")
}

fn section_title(title: &str) -> String {
    format!("{title}\n{}\n", "-".repeat(title.len()))
}

fn header(entry: &EnrichedSnapshot) -> String {
    let title = "DEADLOCK DETECTION REPORT";
    let mut out = format!("{title}\n{}\n", "=".repeat(title.len()));
    out.push_str(&format!("Capture: #{}\n", entry.sequence));
    out.push_str(&format!("Captured at: {}\n", timestamp(&entry.captured_at)));
    if let Some(reported) = &entry.snapshot.captured_at {
        out.push_str(&format!("Backend timestamp: {}\n", timestamp(reported)));
    }
    if let Some(process) = &entry.process {
        out.push_str(&format!("Process: {process}\n"));
    }
    if let Some(jvm) = &entry.snapshot.jvm_info {
        if let (Some(vendor), Some(version)) = (&jvm.vendor, &jvm.version) {
            out.push_str(&format!("JVM: {vendor} {version}\n"));
        }
    }
    out
}

fn deadlock_status(entry: &EnrichedSnapshot) -> String {
    let mut out = section_title("DEADLOCK STATUS");
    out.push_str(&format!(
        "Deadlock detected: {}\n",
        yes_no(entry.deadlock_detected())
    ));
    out.push_str(&format!("Threads: {}\n", entry.thread_count));
    out.push_str(&format!("Deadlocked threads: {}\n", entry.deadlocked_count));
    out.push_str(&format!("Blocked threads: {}\n", entry.blocked_count));
    out.push_str(&format!("Locks: {}\n", entry.lock_count));
    for (i, cycle) in entry.snapshot.deadlock_cycles.iter().enumerate() {
        let ids: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
        out.push_str(&format!("Cycle {}: {}\n", i + 1, ids.join(" -> ")));
    }
    out
}

fn auto_resolution(resolution: &ResolutionSummary) -> String {
    let derived = ResolutionTracker::derive_from_snapshot_resolution(resolution);
    let mut out = section_title("AUTO-RESOLUTION");
    if let Some(enabled) = resolution.auto_resolution_enabled {
        out.push_str(&format!(
            "Auto-resolution: {}\n",
            if enabled { "ENABLED" } else { "DISABLED" }
        ));
    }
    out.push_str(&format!(
        "Total resolutions: {}\n",
        resolution.total_resolutions
    ));
    out.push_str(&format!("Success rate: {:.1}%\n", derived.success_rate));
    out.push_str(&format!(
        "Average resolution time: {:.0}ms\n",
        derived.avg_resolution_time
    ));
    if let Some(last) = &resolution.last_detection {
        out.push_str(&format!("Last detection: {last}\n"));
    }
    out
}

fn recent_events(resolution: &ResolutionSummary) -> String {
    let mut out = section_title("RECENT RESOLUTION EVENTS");
    for (i, event) in resolution.recent_events.iter().enumerate() {
        let when = event
            .timestamp
            .as_ref()
            .map(timestamp)
            .unwrap_or_else(|| "unknown time".to_string());
        out.push_str(&format!(
            "{}. [{when}] {} {} ({}ms)",
            i + 1,
            event.status,
            event.method_label(),
            event.resolution_time
        ));
        if !event.details.is_empty() {
            out.push_str(&format!(" - {}", event.details));
        }
        out.push('\n');
        if !event.thread_ids.is_empty() {
            let ids: Vec<String> = event.thread_ids.iter().map(|id| id.to_string()).collect();
            out.push_str(&format!("   threads: {}\n", ids.join(", ")));
        }
    }
    out
}

fn thread_detail(snapshot: &Snapshot) -> String {
    let mut out = section_title("THREADS");
    for thread in &snapshot.threads {
        out.push_str(&thread_line(thread));
    }
    out
}

fn thread_line(thread: &ThreadInfo) -> String {
    let mut out = format!(
        "- {} (id {}) {}",
        thread.display_name(),
        thread.id,
        thread.state
    );
    if thread.is_deadlocked {
        out.push_str(" [DEADLOCKED]");
    }
    out.push('\n');
    if let Some(waiting) = &thread.waiting_lock {
        out.push_str(&format!("    waiting for: {}\n", waiting.qualified()));
    }
    for owned in &thread.owned_locks {
        out.push_str(&format!("    holds: {}\n", owned.qualified()));
    }
    out
}
