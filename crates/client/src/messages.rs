//! Push topics and their decoded payloads.
//!
//! The backend publishes JSON bodies on four STOMP destinations. Each
//! body is decoded into a [`PushMessage`] variant according to the
//! destination it arrived on. Malformed fields and list elements are
//! dropped one by one; a payload of the wrong shape as a whole degrades
//! to the topic default instead of failing.

use lockwatch_core::process::{parse_process_list, MonitorStatus, ProcessInfo};
use lockwatch_core::resolution::ResolutionUpdate;
use lockwatch_core::snapshot::Snapshot;

/// Destinations the push channel subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Full deadlock snapshots.
    Deadlock,
    /// The discoverable process list.
    Processes,
    /// Resolution attempts and auto-resolution toggles.
    Resolution,
    /// Process-selection changes.
    Monitor,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::Deadlock,
        Topic::Processes,
        Topic::Resolution,
        Topic::Monitor,
    ];

    pub fn destination(&self) -> &'static str {
        match self {
            Self::Deadlock => "/topic/deadlock",
            Self::Processes => "/topic/processes",
            Self::Resolution => "/topic/resolution",
            Self::Monitor => "/topic/monitor",
        }
    }

    pub fn from_destination(destination: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.destination() == destination)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.destination())
    }
}

/// A decoded push payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    Deadlock(Snapshot),
    Processes(Vec<ProcessInfo>),
    Resolution(ResolutionUpdate),
    Monitor(MonitorStatus),
}

impl PushMessage {
    pub fn topic(&self) -> Topic {
        match self {
            Self::Deadlock(_) => Topic::Deadlock,
            Self::Processes(_) => Topic::Processes,
            Self::Resolution(_) => Topic::Resolution,
            Self::Monitor(_) => Topic::Monitor,
        }
    }
}

/// Decode a MESSAGE body received on `destination`.
///
/// Returns `None` for destinations this client does not subscribe to.
/// A body that is not JSON is treated as `null` and decodes to the
/// topic's default payload.
pub fn parse_push(destination: &str, body: &str) -> Option<PushMessage> {
    let topic = Topic::from_destination(destination)?;
    let value = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(%topic, error = %e, "Push body is not JSON");
            serde_json::Value::Null
        }
    };

    Some(match topic {
        Topic::Deadlock => PushMessage::Deadlock(Snapshot::from_json(value)),
        Topic::Processes => PushMessage::Processes(parse_process_list(value)),
        Topic::Resolution => PushMessage::Resolution(decode_or_default(topic, value)),
        Topic::Monitor => PushMessage::Monitor(decode_or_default(topic, value)),
    })
}

fn decode_or_default<T: serde::de::DeserializeOwned + Default>(
    topic: Topic,
    value: serde_json::Value,
) -> T {
    match serde_json::from_value(value) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(%topic, error = %e, "Malformed push payload, using defaults");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use lockwatch_core::resolution::ResolutionStatus;

    #[test]
    fn destinations_round_trip() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_destination(topic.destination()), Some(topic));
        }
        assert_eq!(Topic::from_destination("/topic/other"), None);
    }

    #[test]
    fn parse_deadlock_snapshot() {
        let body = r#"{
            "timestamp": 1700000000000,
            "deadlockDetected": true,
            "threads": [{"id": 1, "name": "t1", "state": "BLOCKED", "isDeadlocked": true}],
            "locks": []
        }"#;
        let msg = parse_push("/topic/deadlock", body).unwrap();
        assert_matches!(msg, PushMessage::Deadlock(s) if s.deadlock_detected && s.threads.len() == 1);
    }

    #[test]
    fn parse_resolution_update() {
        let body = r#"{"status": "SUCCESS", "message": "done", "resolutionTime": 42}"#;
        let msg = parse_push("/topic/resolution", body).unwrap();
        assert_matches!(msg, PushMessage::Resolution(u) => {
            assert_eq!(u.status(), ResolutionStatus::Success);
            assert_eq!(u.resolution_time, Some(42));
        });
    }

    #[test]
    fn parse_process_list_and_monitor() {
        let msg = parse_push("/topic/processes", r#"[{"pid": 7, "displayName": "app"}]"#).unwrap();
        assert_matches!(msg, PushMessage::Processes(list) if list[0].pid == "7");

        let msg = parse_push(
            "/topic/monitor",
            r#"{"pid": "7", "processName": "app", "message": "Now monitoring"}"#,
        )
        .unwrap();
        assert_eq!(msg.topic(), Topic::Monitor);
        assert_matches!(msg, PushMessage::Monitor(m) if m.pid.as_deref() == Some("7"));
    }

    #[test]
    fn malformed_bodies_degrade() {
        assert_matches!(
            parse_push("/topic/deadlock", "not json"),
            Some(PushMessage::Deadlock(s)) if s == Snapshot::default()
        );
        assert_matches!(
            parse_push("/topic/resolution", "[1, 2]"),
            Some(PushMessage::Resolution(u)) if u == ResolutionUpdate::default()
        );
        assert_matches!(
            parse_push("/topic/processes", r#"{"oops": true}"#),
            Some(PushMessage::Processes(list)) if list.is_empty()
        );
    }

    #[test]
    fn one_malformed_thread_keeps_the_snapshot() {
        let body = r#"{
            "deadlockDetected": true,
            "threads": [
                {"id": 1, "state": "BLOCKED", "isDeadlocked": true},
                {"id": "3"},
                {"id": {"nested": true}, "state": "BLOCKED"},
                {"id": 2, "state": "BLOCKED", "isDeadlocked": true}
            ],
            "locks": []
        }"#;
        let msg = parse_push("/topic/deadlock", body).unwrap();
        assert_matches!(msg, PushMessage::Deadlock(s) => {
            assert!(s.deadlock_detected);
            assert_eq!(s.thread_count(), 3);
            assert_eq!(s.deadlocked_count(), 2);
        });
    }

    #[test]
    fn process_list_skips_bad_entries() {
        let msg = parse_push(
            "/topic/processes",
            r#"[{"pid": 7, "displayName": "app"}, "junk", {"pid": "8", "cpuUsage": "n/a"}]"#,
        )
        .unwrap();
        assert_matches!(msg, PushMessage::Processes(list) => {
            let pids: Vec<&str> = list.iter().map(|p| p.pid.as_str()).collect();
            assert_eq!(pids, vec!["7", "8"]);
        });
    }

    #[test]
    fn unknown_destination_is_ignored() {
        assert!(parse_push("/topic/unknown", "{}").is_none());
    }
}
