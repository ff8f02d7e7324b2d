//! Current snapshot plus the session history of user captures.
//!
//! Push and pull updates both go through [`StateStore::apply_snapshot`]:
//! last write wins, no ordering is enforced. Captures are appended by
//! [`StateStore::capture_session`] and kept for the life of the session
//! unless a [`HistoryRetention`] limit is configured.

use std::num::NonZeroUsize;

use chrono::Utc;
use serde::Serialize;

use crate::error::CoreError;
use crate::process::ProcessSelection;
use crate::resolution::ResolutionSummary;
use crate::snapshot::Snapshot;
use crate::types::Timestamp;

/// How many captures the session history keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryRetention {
    #[default]
    Unbounded,
    /// Keep the most recent N captures, evicting the oldest.
    KeepLast(NonZeroUsize),
}

impl HistoryRetention {
    /// `None` or `0` means unbounded.
    pub fn from_limit(limit: Option<usize>) -> Self {
        match limit.and_then(NonZeroUsize::new) {
            Some(n) => Self::KeepLast(n),
            None => Self::Unbounded,
        }
    }
}

/// A captured snapshot with the context it was captured in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedSnapshot {
    /// 1-based capture number within the session.
    pub sequence: u64,
    pub captured_at: Timestamp,
    pub process: Option<ProcessSelection>,
    pub snapshot: Snapshot,
    pub resolution: Option<ResolutionSummary>,
    pub thread_count: usize,
    pub lock_count: usize,
    pub deadlocked_count: usize,
    pub blocked_count: usize,
}

impl EnrichedSnapshot {
    pub fn deadlock_detected(&self) -> bool {
        self.snapshot.deadlock_detected
    }
}

#[derive(Debug, Default)]
pub struct StateStore {
    current: Option<Snapshot>,
    history: Vec<EnrichedSnapshot>,
    captures: u64,
    retention: HistoryRetention,
}

impl StateStore {
    pub fn new(retention: HistoryRetention) -> Self {
        Self {
            retention,
            ..Default::default()
        }
    }

    /// Replace the current snapshot, returning the previous one.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> Option<Snapshot> {
        self.current.replace(snapshot)
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    /// Append an enriched copy of the current snapshot to the history.
    ///
    /// `resolution` is the summary fetched at capture time; when `None`
    /// the snapshot's own resolution block is used.
    pub fn capture_session(
        &mut self,
        resolution: Option<ResolutionSummary>,
        process: Option<ProcessSelection>,
    ) -> Result<&EnrichedSnapshot, CoreError> {
        let snapshot = self.current.clone().ok_or(CoreError::NoCurrentState)?;

        self.captures += 1;
        let entry = EnrichedSnapshot {
            sequence: self.captures,
            captured_at: Utc::now(),
            process,
            resolution: resolution.or_else(|| snapshot.resolution.clone()),
            thread_count: snapshot.thread_count(),
            lock_count: snapshot.lock_count(),
            deadlocked_count: snapshot.deadlocked_count(),
            blocked_count: snapshot.blocked_count(),
            snapshot,
        };

        if let HistoryRetention::KeepLast(limit) = self.retention {
            while self.history.len() >= limit.get() {
                let evicted = self.history.remove(0);
                tracing::debug!(sequence = evicted.sequence, "Evicted oldest capture");
            }
        }

        tracing::info!(
            sequence = entry.sequence,
            threads = entry.thread_count,
            deadlocked = entry.deadlocked_count,
            "Captured snapshot",
        );

        self.history.push(entry);
        Ok(&self.history[self.history.len() - 1])
    }

    /// Captures in order, oldest first.
    pub fn history(&self) -> &[EnrichedSnapshot] {
        &self.history
    }

    /// The last two captures, for before/after comparison.
    pub fn latest_pair(&self) -> Result<(&EnrichedSnapshot, &EnrichedSnapshot), CoreError> {
        match self.history.as_slice() {
            [.., before, after] => Ok((before, after)),
            _ => Err(CoreError::InsufficientHistory {
                available: self.history.len(),
            }),
        }
    }

    pub fn latest(&self) -> Option<&EnrichedSnapshot> {
        self.history.last()
    }
}
