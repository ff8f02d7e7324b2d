//! Line-oriented commands for the interactive binary.

use std::fmt::Write as _;

use lockwatch_core::report;
use lockwatch_core::types::ThreadId;

use crate::dashboard::{DashboardHandle, DashboardView};
use crate::error::MonitorError;

pub const HELP: &str = "\
Commands:
  capture              capture the current snapshot
  compare              compare the last two captures
  report               print a report of the latest capture
  view | status        show the current state
  refresh              reload everything from the backend
  processes            list monitorable processes
  system               show details of the monitored JVM
  select <pid> [name]  monitor a process
  stop                 stop monitoring the current process
  interrupt <id>       interrupt a thread
  toggle               toggle auto-resolution
  trigger              trigger a manual resolution
  simulate ok|fail     simulate a resolution
  help                 show this help
  quit                 exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Capture,
    Compare,
    Report,
    View,
    Refresh,
    Processes,
    SystemInfo,
    Select { pid: String, name: Option<String> },
    Stop,
    Interrupt(ThreadId),
    Toggle,
    Trigger,
    Simulate { success: bool },
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command {0:?}, type 'help' for a list")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<CliCommand>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("capture", []) => CliCommand::Capture,
        ("compare", []) => CliCommand::Compare,
        ("report", []) => CliCommand::Report,
        ("view" | "status", []) => CliCommand::View,
        ("refresh", []) => CliCommand::Refresh,
        ("processes" | "ps", []) => CliCommand::Processes,
        ("system" | "info", []) => CliCommand::SystemInfo,
        ("select", [pid]) => CliCommand::Select {
            pid: pid.to_string(),
            name: None,
        },
        ("select", [pid, rest @ ..]) => CliCommand::Select {
            pid: pid.to_string(),
            name: Some(rest.join(" ")),
        },
        ("select", _) => return Err(ParseError::Usage("select <pid> [name]")),
        ("stop", []) => CliCommand::Stop,
        ("interrupt", [id]) => match id.parse() {
            Ok(id) => CliCommand::Interrupt(id),
            Err(_) => return Err(ParseError::Usage("interrupt <thread id>")),
        },
        ("interrupt", _) => return Err(ParseError::Usage("interrupt <thread id>")),
        ("toggle", []) => CliCommand::Toggle,
        ("trigger", []) => CliCommand::Trigger,
        ("simulate", ["ok" | "success"]) => CliCommand::Simulate { success: true },
        ("simulate", ["fail" | "failure"]) => CliCommand::Simulate { success: false },
        ("simulate", _) => return Err(ParseError::Usage("simulate ok|fail")),
        ("help" | "?", _) => CliCommand::Help,
        ("quit" | "exit", _) => CliCommand::Quit,
        _ => return Err(ParseError::Unknown(line.trim().to_string())),
    };
    Ok(Some(command))
}

/// Run a command against the dashboard and render its output.
///
/// `Quit` is left to the caller and renders nothing.
pub async fn execute(handle: &DashboardHandle, command: CliCommand) -> Result<String, MonitorError> {
    let output = match command {
        CliCommand::Capture => {
            let entry = handle.capture().await?;
            format!(
                "Captured snapshot #{} ({} threads, {} locks, {} deadlocked)",
                entry.sequence, entry.thread_count, entry.lock_count, entry.deadlocked_count
            )
        }
        CliCommand::Compare => report::render_comparison(&handle.compare().await?),
        CliCommand::Report => handle.report().await?,
        CliCommand::View => render_view(&handle.view().await?),
        CliCommand::Refresh => {
            handle.refresh().await?;
            "Refreshed".to_string()
        }
        CliCommand::Processes => render_processes(&handle.view().await?),
        CliCommand::SystemInfo => render_system_info(&handle.system_info().await?),
        CliCommand::Select { pid, name } => {
            let name = name.unwrap_or_else(|| pid.clone());
            let selection = handle.select_process(pid, name).await?;
            format!("Monitoring {selection}")
        }
        CliCommand::Stop => {
            handle.stop_monitoring().await?;
            "Stopped monitoring".to_string()
        }
        CliCommand::Interrupt(thread_id) => {
            let response = handle.interrupt_thread(thread_id).await?;
            response
                .message
                .unwrap_or_else(|| format!("Interrupt sent to thread {thread_id}"))
        }
        CliCommand::Toggle => {
            let enabled = handle.toggle_auto_resolution().await?;
            format!("Auto-resolution {}", if enabled { "ENABLED" } else { "DISABLED" })
        }
        CliCommand::Trigger => {
            let event = handle.trigger_resolution().await?;
            format!("Resolution {} via {}", event.status, event.method_label())
        }
        CliCommand::Simulate { success } => {
            let event = handle.simulate_resolution(success).await?;
            format!("Simulated resolution: {}", event.status)
        }
        CliCommand::Help => HELP.to_string(),
        CliCommand::Quit => String::new(),
    };
    Ok(output)
}

fn render_view(view: &DashboardView) -> String {
    let mut out = String::new();
    let connection = match (view.connected, view.connection_exhausted) {
        (true, _) => "connected",
        (false, true) => "gave up reconnecting",
        (false, false) => "disconnected",
    };
    let _ = writeln!(out, "Connection: {connection}");
    match &view.selection {
        Some(selection) => {
            let _ = writeln!(out, "Monitoring: {selection}");
        }
        None => {
            let _ = writeln!(out, "Monitoring: none");
        }
    }
    match (&view.current, &view.metrics) {
        (Some(current), Some(metrics)) => {
            let status = if current.deadlock_detected {
                "DEADLOCK"
            } else {
                "OK"
            };
            let _ = writeln!(
                out,
                "System: {status} | threads {} | locks {} | deadlocked {} | blocked {}",
                metrics.threads, metrics.locks, metrics.deadlocked, metrics.blocked
            );
            for cycle in &current.deadlock_cycles {
                let ids: Vec<String> = cycle.iter().map(ToString::to_string).collect();
                let _ = writeln!(out, "  cycle: {}", ids.join(" -> "));
            }
        }
        _ => {
            let _ = writeln!(out, "System: no data yet");
        }
    }
    let stats = &view.resolution.stats;
    let _ = writeln!(
        out,
        "Auto-resolution: {} | total {} | success {:.1}% | avg {:.0}ms",
        if stats.auto_resolution_enabled {
            "ENABLED"
        } else {
            "DISABLED"
        },
        stats.total_resolutions,
        stats.success_rate,
        stats.avg_resolution_time
    );
    let _ = writeln!(out, "Captures: {}", view.captures);
    if !view.activity.is_empty() {
        let _ = writeln!(out, "Recent activity:");
        for event in &view.activity {
            let _ = writeln!(
                out,
                "  {} {} - {}",
                event.at.format("%H:%M:%S"),
                event.title,
                event.message
            );
        }
    }
    out.trim_end().to_string()
}

fn render_processes(view: &DashboardView) -> String {
    if view.processes.is_empty() {
        return "No processes found".to_string();
    }
    let selected = view.selection.as_ref().map(|s| s.pid.as_str());
    view.processes
        .iter()
        .map(|p| {
            let marker = if Some(p.pid.as_str()) == selected { "*" } else { " " };
            format!("{marker} {:>8}  {}", p.pid, p.label())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One `key: value` line per top-level field; other payloads as JSON.
fn render_system_info(info: &serde_json::Value) -> String {
    let Some(fields) = info.as_object() else {
        return info.to_string();
    };
    if fields.is_empty() {
        return "No system information".to_string();
    }
    fields
        .iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(text) => format!("{key}: {text}"),
            other => format!("{key}: {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
