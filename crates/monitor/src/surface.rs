//! Rendering and presentation seams.
//!
//! The dashboard never draws anything itself. It hands complete models
//! to a [`GraphSurface`], a [`ChartSurface`] and a [`Presenter`];
//! [`LogSurfaces`] implements all three on top of `tracing` for the
//! command-line binary.

use lockwatch_core::graph::WaitForGraph;
use lockwatch_core::process::ProcessInfo;
use lockwatch_core::resolution::ResolutionEvent;
use lockwatch_core::snapshot::Snapshot;
use lockwatch_core::tracker::{AggregateStats, ChartPoint, OutcomeTally, ResolutionTracker};
use lockwatch_core::types::Timestamp;
use serde::Serialize;

use crate::notifications::{ActivityEvent, Level, Notification};

/// Receives the wait-for graph. Every call is a full replacement.
pub trait GraphSurface: Send {
    fn replace(&mut self, graph: &WaitForGraph);
}

/// Receives the resolution-time series.
pub trait ChartSurface: Send {
    fn push_point(&mut self, point: ChartPoint);
    /// Replace the whole series.
    fn reset(&mut self, points: &[ChartPoint]);
}

/// Receives everything else the user sees.
pub trait Presenter: Send {
    fn notify(&mut self, notification: &Notification);
    fn connection_status(&mut self, connected: bool);
    fn system_status(&mut self, deadlocked: bool);
    fn metrics(&mut self, metrics: &Metrics);
    fn process_list(&mut self, processes: &[ProcessInfo]);
    fn activity(&mut self, event: &ActivityEvent);
    fn resolution(&mut self, view: &ResolutionView);
}

/// The set of surfaces a dashboard renders to.
pub struct Surfaces {
    pub graph: Box<dyn GraphSurface>,
    pub chart: Box<dyn ChartSurface>,
    pub presenter: Box<dyn Presenter>,
}

impl Surfaces {
    /// Log-only surfaces.
    pub fn logging() -> Self {
        Self {
            graph: Box::new(LogSurfaces),
            chart: Box::new(LogSurfaces),
            presenter: Box::new(LogSurfaces),
        }
    }
}

/// Headline thread and lock counts of a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub threads: usize,
    pub locks: usize,
    pub deadlocked: usize,
    pub blocked: usize,
}

impl From<&Snapshot> for Metrics {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            threads: snapshot.thread_count(),
            locks: snapshot.lock_count(),
            deadlocked: snapshot.deadlocked_count(),
            blocked: snapshot.blocked_count(),
        }
    }
}

/// Everything the resolution panel shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionView {
    pub stats: AggregateStats,
    pub tally: OutcomeTally,
    /// Most recent last.
    pub recent: Vec<ResolutionEvent>,
    pub last_detection: Option<Timestamp>,
    pub chart: Vec<ChartPoint>,
}

impl From<&ResolutionTracker> for ResolutionView {
    fn from(tracker: &ResolutionTracker) -> Self {
        Self {
            stats: tracker.stats().clone(),
            tally: tracker.tally(),
            recent: tracker.recent_events().to_vec(),
            last_detection: tracker.last_detection(),
            chart: tracker.chart_points().copied().collect(),
        }
    }
}

/// Surfaces that write to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSurfaces;

impl GraphSurface for LogSurfaces {
    fn replace(&mut self, graph: &WaitForGraph) {
        tracing::debug!(
            threads = graph.thread_count(),
            locks = graph.lock_count(),
            edges = graph.edges.len(),
            deadlocked = graph.deadlocked_count(),
            "Wait-for graph updated",
        );
    }
}

impl ChartSurface for LogSurfaces {
    fn push_point(&mut self, point: ChartPoint) {
        tracing::debug!(resolution_time_ms = point.resolution_time_ms, "Resolution time recorded");
    }

    fn reset(&mut self, points: &[ChartPoint]) {
        tracing::debug!(points = points.len(), "Resolution chart reset");
    }
}

impl Presenter for LogSurfaces {
    fn notify(&mut self, notification: &Notification) {
        let message = notification.message.as_str();
        match notification.level {
            Level::Info | Level::Success => tracing::info!("{message}"),
            Level::Warning => tracing::warn!("{message}"),
            Level::Error | Level::Fatal => tracing::error!("{message}"),
        }
    }

    fn connection_status(&mut self, connected: bool) {
        tracing::info!(connected, "Connection status");
    }

    fn system_status(&mut self, deadlocked: bool) {
        if deadlocked {
            tracing::warn!("Deadlock detected");
        } else {
            tracing::debug!("No deadlock");
        }
    }

    fn metrics(&mut self, metrics: &Metrics) {
        tracing::info!(
            threads = metrics.threads,
            locks = metrics.locks,
            deadlocked = metrics.deadlocked,
            blocked = metrics.blocked,
            "Metrics",
        );
    }

    fn process_list(&mut self, processes: &[ProcessInfo]) {
        tracing::info!(count = processes.len(), "Process list updated");
    }

    fn activity(&mut self, event: &ActivityEvent) {
        tracing::info!(level = ?event.level, title = %event.title, "{}", event.message);
    }

    fn resolution(&mut self, view: &ResolutionView) {
        tracing::debug!(
            total = view.stats.total_resolutions,
            success_rate = view.stats.success_rate,
            avg_ms = view.stats.avg_resolution_time,
            auto_resolution = view.stats.auto_resolution_enabled,
            "Resolution stats",
        );
    }
}
