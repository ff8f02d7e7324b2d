//! Resolution tracking.
//!
//! [`ResolutionTracker`] folds resolution data from three sources into
//! one view: individual events (pushed or listed by the history
//! endpoint), aggregate stats pulled from the backend, and the resolution
//! block embedded in snapshots. Pulled stats always win over aggregates
//! derived locally from events.

use std::collections::VecDeque;

use chrono::Utc;
use serde::Serialize;

use crate::resolution::{
    Outcome, ResolutionEvent, ResolutionHistory, ResolutionSummary, ResolutionUpdate,
};
use crate::types::Timestamp;

/// Number of points kept for the resolution-time chart.
pub const CHART_WINDOW: usize = 20;

/// Where the current aggregate numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsSource {
    #[default]
    None,
    Derived,
    Pulled,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub total_resolutions: u64,
    /// Percentage, one decimal.
    pub success_rate: f64,
    /// Milliseconds.
    pub avg_resolution_time: f64,
    pub auto_resolution_enabled: bool,
    pub source: StatsSource,
}

/// Success rate and mean time computed from a list of events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub success_rate: f64,
    pub avg_resolution_time: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeTally {
    pub success: u64,
    pub failure: u64,
    pub in_progress: u64,
}

impl OutcomeTally {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.success += 1,
            Outcome::Failure => self.failure += 1,
            Outcome::InProgress => self.in_progress += 1,
        }
    }
}

/// One point on the resolution-time chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub at: Timestamp,
    pub resolution_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ResolutionTracker {
    stats: AggregateStats,
    recent: Vec<ResolutionEvent>,
    tally: OutcomeTally,
    series: VecDeque<ChartPoint>,
    last_detection: Option<Timestamp>,
}

impl Default for ResolutionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionTracker {
    pub fn new() -> Self {
        Self {
            // The backend starts with auto-resolution on.
            stats: AggregateStats {
                auto_resolution_enabled: true,
                ..Default::default()
            },
            recent: Vec::new(),
            tally: OutcomeTally::default(),
            series: VecDeque::with_capacity(CHART_WINDOW),
            last_detection: None,
        }
    }

    pub fn stats(&self) -> &AggregateStats {
        &self.stats
    }

    /// Recent events, most recent last.
    pub fn recent_events(&self) -> &[ResolutionEvent] {
        &self.recent
    }

    pub fn tally(&self) -> OutcomeTally {
        self.tally
    }

    pub fn chart_points(&self) -> impl Iterator<Item = &ChartPoint> {
        self.series.iter()
    }

    pub fn last_detection(&self) -> Option<Timestamp> {
        self.last_detection
    }

    pub fn auto_resolution_enabled(&self) -> bool {
        self.stats.auto_resolution_enabled
    }

    pub fn set_auto_resolution(&mut self, enabled: bool) {
        self.stats.auto_resolution_enabled = enabled;
    }

    /// Classify and record one event. Returns the new chart point when
    /// the event carries a positive resolution time.
    pub fn ingest_event(&mut self, event: ResolutionEvent) -> (Outcome, Option<ChartPoint>) {
        let outcome = event.outcome();
        self.tally.record(outcome);

        let point = self.record_point(&event);
        if let Some(ts) = event.timestamp {
            self.last_detection = Some(ts);
        }

        tracing::debug!(
            status = %event.status,
            method = %event.method,
            resolution_time_ms = event.resolution_time,
            ?outcome,
            "Resolution event",
        );

        self.recent.push(event);
        (outcome, point)
    }

    /// Apply a `resolution` push-topic update.
    ///
    /// Toggle broadcasts only flip the auto-resolution flag and return
    /// `None`; everything else is recorded as an event.
    pub fn ingest_update(&mut self, update: &ResolutionUpdate) -> Option<(Outcome, Option<ChartPoint>)> {
        if let Some(enabled) = update.auto_resolution_enabled {
            self.stats.auto_resolution_enabled = enabled;
        }
        if update.is_toggle_only() {
            return None;
        }
        let mut event = update.to_event();
        if event.timestamp.is_none() {
            event.timestamp = Some(Utc::now());
        }
        Some(self.ingest_event(event))
    }

    /// Overwrite aggregate counters with pulled stats.
    ///
    /// Missing rate/time fields are derived from the embedded events; a
    /// missing toggle flag keeps the current value.
    pub fn ingest_stats(&mut self, stats: &ResolutionSummary) {
        let derived = Self::derive_from_snapshot_resolution(stats);
        self.stats.total_resolutions = stats.total_resolutions;
        self.stats.success_rate = derived.success_rate;
        self.stats.avg_resolution_time = derived.avg_resolution_time;
        if let Some(enabled) = stats.auto_resolution_enabled {
            self.stats.auto_resolution_enabled = enabled;
        }
        self.stats.source = StatsSource::Pulled;
    }

    /// Replace the recent list with what the history endpoint returned,
    /// ordered oldest first.
    pub fn ingest_history(&mut self, history: ResolutionHistory) {
        let mut events = history.recent_events;
        events.sort_by_key(|e| e.timestamp);

        self.tally = OutcomeTally::default();
        self.series.clear();
        self.last_detection = None;
        self.recent = Vec::with_capacity(events.len());
        for event in events {
            self.ingest_event(event);
        }
    }

    /// Fold the resolution block of a snapshot.
    ///
    /// The block's aggregates never overwrite stats that were pulled from
    /// the stats endpoint.
    pub fn apply_snapshot_resolution(&mut self, block: &ResolutionSummary) {
        if let Some(last) = block.recent_events.iter().rev().find_map(|e| e.timestamp) {
            self.last_detection = Some(last);
        }
        if let Some(enabled) = block.auto_resolution_enabled {
            self.stats.auto_resolution_enabled = enabled;
        }
        if self.stats.source == StatsSource::Pulled {
            return;
        }
        let derived = Self::derive_from_snapshot_resolution(block);
        self.stats.total_resolutions = block.total_resolutions;
        self.stats.success_rate = derived.success_rate;
        self.stats.avg_resolution_time = derived.avg_resolution_time;
        self.stats.source = StatsSource::Derived;
    }

    /// Success rate and mean time for a resolution block.
    ///
    /// Explicit aggregate fields are used as given; absent ones are
    /// computed from `recent_events`. Zero events yields zeros.
    pub fn derive_from_snapshot_resolution(block: &ResolutionSummary) -> DerivedMetrics {
        let events = &block.recent_events;
        let total = events.len();

        let success_rate = block.success_rate.unwrap_or_else(|| {
            if total == 0 {
                return 0.0;
            }
            let successful = events.iter().filter(|e| e.is_successful()).count();
            round_one_decimal(successful as f64 / total as f64 * 100.0)
        });

        let avg_resolution_time = block.avg_resolution_time.unwrap_or_else(|| {
            if total == 0 {
                return 0.0;
            }
            let sum: u64 = events.iter().map(|e| e.resolution_time).sum();
            sum as f64 / total as f64
        });

        DerivedMetrics {
            success_rate,
            avg_resolution_time,
        }
    }

    /// Current view as a resolution block, used when enriching captures
    /// if the stats endpoint is unavailable.
    pub fn summary(&self) -> ResolutionSummary {
        ResolutionSummary {
            total_resolutions: self.stats.total_resolutions,
            success_rate: Some(self.stats.success_rate),
            avg_resolution_time: Some(self.stats.avg_resolution_time),
            auto_resolution_enabled: Some(self.stats.auto_resolution_enabled),
            last_detection: self.last_detection.map(|ts| ts.to_rfc3339()),
            recent_events: self.recent.clone(),
        }
    }

    fn record_point(&mut self, event: &ResolutionEvent) -> Option<ChartPoint> {
        if event.resolution_time == 0 {
            return None;
        }
        let point = ChartPoint {
            at: event.timestamp.unwrap_or_else(Utc::now),
            resolution_time_ms: event.resolution_time,
        };
        if self.series.len() == CHART_WINDOW {
            self.series.pop_front();
        }
        self.series.push_back(point);
        Some(point)
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
