//! Deadlock-resolution payloads: individual attempts, aggregate stats,
//! history listings and push-topic updates.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::de;
use crate::types::{ThreadId, Timestamp};

/// Status of a single resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStatus {
    Resolving,
    Success,
    Resolved,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolving => "RESOLVING",
            Self::Success => "SUCCESS",
            Self::Resolved => "RESOLVED",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    InProgress,
}

/// One resolution attempt, automatic or manual.
///
/// Backend versions disagree on field names, so several spellings are
/// read: `method`/`strategy`/`type`, `resolutionTime`/`duration`,
/// `details`/`message`, `threadIds`/`affectedThreads` and
/// `successful`/`success`. When a payload carries more than one, the
/// first in that order wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    pub status: ResolutionStatus,
    pub method: String,
    pub resolution_time: u64,
    pub details: String,
    pub thread_ids: Vec<ThreadId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
}

impl ResolutionEvent {
    /// Whether the attempt broke the deadlock.
    pub fn is_successful(&self) -> bool {
        self.successful == Some(true)
            || matches!(self.status, ResolutionStatus::Success | ResolutionStatus::Resolved)
    }

    pub fn outcome(&self) -> Outcome {
        match self.status {
            ResolutionStatus::Success | ResolutionStatus::Resolved => Outcome::Success,
            ResolutionStatus::Failed => Outcome::Failure,
            ResolutionStatus::Resolving => Outcome::InProgress,
            ResolutionStatus::Unknown => match self.successful {
                Some(true) => Outcome::Success,
                Some(false) => Outcome::Failure,
                None => Outcome::InProgress,
            },
        }
    }

    /// Method name for display.
    pub fn method_label(&self) -> &str {
        if self.method.is_empty() {
            "Unknown Method"
        } else {
            &self.method
        }
    }

    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            timestamp: de::field(obj, &["timestamp"]).and_then(de::timestamp),
            status: status(obj).unwrap_or_default(),
            method: de::field(obj, &["method", "strategy", "type"])
                .and_then(de::text)
                .unwrap_or_default(),
            resolution_time: de::field(obj, &["resolutionTime", "duration"])
                .and_then(de::unsigned)
                .unwrap_or_default(),
            details: de::field(obj, &["details", "message"])
                .and_then(de::text)
                .unwrap_or_default(),
            thread_ids: de::list(
                de::field(obj, &["threadIds", "affectedThreads"]),
                "threadIds",
                de::integer,
            ),
            successful: de::field(obj, &["successful", "success"]).and_then(de::flag),
        })
    }
}

fn status(obj: &de::Object) -> Option<ResolutionStatus> {
    de::field(obj, &["status"]).and_then(|v| ResolutionStatus::deserialize(v).ok())
}

fn events(value: Option<&Value>) -> Vec<ResolutionEvent> {
    de::list(value, "recentEvents", ResolutionEvent::from_value)
}

/// Aggregate resolution statistics (`GET /api/resolution/stats`, or the
/// resolution block embedded in a snapshot).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionSummary {
    pub total_resolutions: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_resolution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_resolution_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_detection: Option<String>,
    pub recent_events: Vec<ResolutionEvent>,
}

impl ResolutionSummary {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            total_resolutions: de::field(obj, &["totalResolutions"])
                .and_then(de::unsigned)
                .unwrap_or_default(),
            success_rate: de::field(obj, &["successRate"]).and_then(de::float),
            avg_resolution_time: de::field(obj, &["avgResolutionTime"]).and_then(de::float),
            auto_resolution_enabled: de::field(obj, &["autoResolutionEnabled"]).and_then(de::flag),
            last_detection: de::field(obj, &["lastDetection"]).and_then(de::text),
            recent_events: events(de::field(obj, &["recentEvents"])),
        })
    }
}

/// `GET /api/resolution/history`. The backend answers either with
/// `{"recentEvents": [...]}` or with a bare array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionHistory {
    pub recent_events: Vec<ResolutionEvent>,
}

impl ResolutionHistory {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let recent_events = match value {
            Value::Array(_) => events(Some(value)),
            Value::Object(obj) => events(de::field(obj, &["recentEvents"])),
            _ => return None,
        };
        Some(Self { recent_events })
    }
}

/// Default message when a push update carries none.
pub const DEFAULT_UPDATE_MESSAGE: &str = "Auto-resolution triggered";

/// Payload of the `resolution` push topic.
///
/// The backend publishes both attempt results and toggle broadcasts on
/// this topic; a toggle broadcast carries only `autoResolutionEnabled`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionUpdate {
    pub status: Option<ResolutionStatus>,
    pub message: Option<String>,
    pub resolution_time: Option<u64>,
    pub auto_resolution_enabled: Option<bool>,
    pub successful: Option<bool>,
    pub timestamp: Option<Timestamp>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ResolutionUpdate {
    /// Absent status means the backend is still working on it.
    pub fn status(&self) -> ResolutionStatus {
        self.status.unwrap_or(ResolutionStatus::Resolving)
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(DEFAULT_UPDATE_MESSAGE)
    }

    /// A broadcast that only announces a toggle of auto-resolution.
    pub fn is_toggle_only(&self) -> bool {
        self.auto_resolution_enabled.is_some()
            && self.status.is_none()
            && self.resolution_time.is_none()
            && self.successful.is_none()
    }

    /// The update as a history entry. Without an explicit status the
    /// attempt is still in progress; a `success` flag only confirms that
    /// the request was accepted and is kept as-is on the event.
    pub fn to_event(&self) -> ResolutionEvent {
        ResolutionEvent {
            timestamp: self.timestamp,
            status: self.status(),
            method: self.kind.clone().unwrap_or_default(),
            resolution_time: self.resolution_time.unwrap_or(0),
            details: self.message().to_string(),
            thread_ids: Vec::new(),
            successful: self.successful,
        }
    }

    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            status: status(obj),
            message: de::field(obj, &["message", "details"]).and_then(de::text),
            resolution_time: de::field(obj, &["resolutionTime", "duration"]).and_then(de::unsigned),
            auto_resolution_enabled: de::field(obj, &["autoResolutionEnabled"]).and_then(de::flag),
            successful: de::field(obj, &["successful", "success"]).and_then(de::flag),
            timestamp: de::field(obj, &["timestamp"]).and_then(de::timestamp),
            kind: de::field(obj, &["type", "method"]).and_then(de::text),
        })
    }
}

macro_rules! deserialize_via_value {
    ($($ty:ty => $expected:literal),* $(,)?) => {
        $(
            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let value = Value::deserialize(deserializer)?;
                    Self::from_value(&value).ok_or_else(|| D::Error::custom($expected))
                }
            }
        )*
    };
}

deserialize_via_value! {
    ResolutionEvent => "expected a resolution event object",
    ResolutionSummary => "expected a resolution stats object",
    ResolutionHistory => "expected a resolution history object or array",
    ResolutionUpdate => "expected a resolution update object",
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_aliases() {
        let event: ResolutionEvent = serde_json::from_value(json!({
            "timestamp": 1_700_000_000_000_i64,
            "status": "SUCCESS",
            "strategy": "THREAD_INTERRUPTION",
            "duration": 120,
            "message": "Interrupted worker-2",
            "threadIds": [1, 2]
        }))
        .unwrap();

        assert_eq!(event.status, ResolutionStatus::Success);
        assert_eq!(event.method, "THREAD_INTERRUPTION");
        assert_eq!(event.resolution_time, 120);
        assert_eq!(event.details, "Interrupted worker-2");
        assert_eq!(event.thread_ids, vec![1, 2]);
        assert!(event.is_successful());
    }

    #[test]
    fn manual_trigger_result_reads_as_event() {
        let event: ResolutionEvent = serde_json::from_value(json!({
            "success": true,
            "message": "Manual resolution triggered successfully",
            "timestamp": 1_700_000_000_000_i64,
            "resolutionTime": 250,
            "type": "MANUAL"
        }))
        .unwrap();

        assert_eq!(event.status, ResolutionStatus::Unknown);
        assert_eq!(event.successful, Some(true));
        assert_eq!(event.outcome(), Outcome::Success);
        assert_eq!(event.method, "MANUAL");
    }

    #[test]
    fn outcome_classification() {
        let mut event = ResolutionEvent::default();
        assert_eq!(event.outcome(), Outcome::InProgress);

        event.status = ResolutionStatus::Resolved;
        assert_eq!(event.outcome(), Outcome::Success);

        event.status = ResolutionStatus::Failed;
        assert_eq!(event.outcome(), Outcome::Failure);
        assert!(!event.is_successful());

        event.status = ResolutionStatus::Resolving;
        assert_eq!(event.outcome(), Outcome::InProgress);
    }

    #[test]
    fn unknown_status_string() {
        let event: ResolutionEvent =
            serde_json::from_value(json!({"status": "ESCALATED"})).unwrap();
        assert_eq!(event.status, ResolutionStatus::Unknown);
        assert_eq!(event.method_label(), "Unknown Method");
    }

    #[test]
    fn history_wrapped_and_bare() {
        let wrapped: ResolutionHistory = serde_json::from_value(json!({
            "recentEvents": [{"status": "FAILED"}]
        }))
        .unwrap();
        assert_eq!(wrapped.recent_events.len(), 1);

        let bare: ResolutionHistory =
            serde_json::from_value(json!([{"status": "SUCCESS"}, {"status": "FAILED"}])).unwrap();
        assert_eq!(bare.recent_events.len(), 2);

        let empty: ResolutionHistory = serde_json::from_value(json!({})).unwrap();
        assert!(empty.recent_events.is_empty());
    }

    #[test]
    fn stats_with_float_counts() {
        let stats: ResolutionSummary = serde_json::from_value(json!({
            "totalResolutions": 4,
            "successRate": 75.0,
            "avgResolutionTime": 180.5,
            "lastDetection": "Never",
            "autoResolutionEnabled": false
        }))
        .unwrap();
        assert_eq!(stats.total_resolutions, 4);
        assert_eq!(stats.success_rate, Some(75.0));
        assert_eq!(stats.avg_resolution_time, Some(180.5));
        assert_eq!(stats.auto_resolution_enabled, Some(false));
        assert!(stats.recent_events.is_empty());
    }

    #[test]
    fn update_defaults() {
        let update: ResolutionUpdate = serde_json::from_value(json!({})).unwrap();
        assert_eq!(update.status(), ResolutionStatus::Resolving);
        assert_eq!(update.message(), DEFAULT_UPDATE_MESSAGE);
        assert!(!update.is_toggle_only());
    }

    #[test]
    fn toggle_broadcast_is_recognised() {
        let update: ResolutionUpdate = serde_json::from_value(json!({
            "autoResolutionEnabled": false,
            "message": "Auto-resolution disabled",
            "timestamp": 1_700_000_000_000_i64
        }))
        .unwrap();
        assert!(update.is_toggle_only());
    }

    #[test]
    fn update_success_flag_does_not_settle_status() {
        let update: ResolutionUpdate = serde_json::from_value(json!({
            "success": true,
            "message": "Manual resolution triggered successfully",
            "resolutionTime": 250,
            "type": "MANUAL"
        }))
        .unwrap();
        let event = update.to_event();
        assert_eq!(event.status, ResolutionStatus::Resolving);
        assert_eq!(event.outcome(), Outcome::InProgress);
        assert_eq!(event.successful, Some(true));
        assert_eq!(event.method, "MANUAL");
        assert_eq!(event.details, "Manual resolution triggered successfully");
    }

    #[test]
    fn update_explicit_status_is_kept() {
        let update: ResolutionUpdate =
            serde_json::from_value(json!({"status": "FAILED", "success": false})).unwrap();
        let event = update.to_event();
        assert_eq!(event.status, ResolutionStatus::Failed);
        assert_eq!(event.details, DEFAULT_UPDATE_MESSAGE);
    }

    #[test]
    fn event_with_both_spellings_reads_first() {
        let event: ResolutionEvent = serde_json::from_value(json!({
            "method": "THREAD_INTERRUPTION",
            "type": "MANUAL",
            "details": "interrupted worker-2",
            "message": "ok",
            "resolutionTime": 90,
            "duration": 5,
            "successful": false,
            "success": true
        }))
        .unwrap();

        assert_eq!(event.method, "THREAD_INTERRUPTION");
        assert_eq!(event.details, "interrupted worker-2");
        assert_eq!(event.resolution_time, 90);
        assert_eq!(event.successful, Some(false));
    }

    #[test]
    fn affected_threads_read_as_thread_ids() {
        let event: ResolutionEvent = serde_json::from_value(json!({
            "timestamp": "2024-05-01T10:00:00.123",
            "method": "THREAD_INTERRUPTION",
            "status": "SUCCESS",
            "affectedThreads": [21, 22],
            "resolutionTime": 40
        }))
        .unwrap();

        assert_eq!(event.thread_ids, vec![21, 22]);
        assert!(event.timestamp.is_some());
    }

    #[test]
    fn history_keeps_good_events_around_bad_ones() {
        let history: ResolutionHistory = serde_json::from_value(json!([
            {"details": "x", "message": "y"},
            "garbage",
            {"status": 7, "resolutionTime": "nope"}
        ]))
        .unwrap();

        assert_eq!(history.recent_events.len(), 2);
        assert_eq!(history.recent_events[0].details, "x");
        assert_eq!(history.recent_events[1].status, ResolutionStatus::Unknown);
        assert_eq!(history.recent_events[1].resolution_time, 0);
    }

    #[test]
    fn non_object_payloads_are_errors() {
        assert!(serde_json::from_value::<ResolutionEvent>(json!("SUCCESS")).is_err());
        assert!(serde_json::from_value::<ResolutionSummary>(json!([])).is_err());
        assert!(serde_json::from_value::<ResolutionHistory>(json!(3)).is_err());
    }
}
