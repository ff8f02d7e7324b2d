//! Point-in-time deadlock state reported by the backend.
//!
//! [`Snapshot`] is what `GET /api/state` returns and what the `deadlock`
//! push topic carries. Deserialization is defensive: every field is
//! optional on the wire, and [`Snapshot::from_json`] decodes field by
//! field so a malformed field or record costs only itself.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::de;
use crate::resolution::ResolutionSummary;
use crate::types::{LockIdentity, ThreadId, Timestamp};

/// JVM thread state, as reported by `Thread.State`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadState {
    New,
    Runnable,
    Blocked,
    Waiting,
    TimedWaiting,
    Terminated,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ThreadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Runnable => "RUNNABLE",
            Self::Blocked => "BLOCKED",
            Self::Waiting => "WAITING",
            Self::TimedWaiting => "TIMED_WAITING",
            Self::Terminated => "TERMINATED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether the thread is parked on a monitor or condition.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked | Self::Waiting | Self::TimedWaiting)
    }
}

impl std::fmt::Display for ThreadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitor or `java.util.concurrent` lock.
///
/// Identity is [`identity_hash_code`](Self::identity_hash_code); two
/// records with the same code denote the same lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    pub identity_hash_code: LockIdentity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A reference to a lock from a thread record. Same shape as [`LockInfo`].
pub type LockRef = LockInfo;

impl LockInfo {
    pub fn new(identity_hash_code: LockIdentity, class_name: impl Into<String>) -> Self {
        Self {
            identity_hash_code,
            class_name: Some(class_name.into()),
            name: None,
        }
    }

    /// Decode one lock record. Anything but an object is rejected; a
    /// missing identity reads as `0`.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            identity_hash_code: de::field(obj, &["identityHashCode"])
                .and_then(de::integer)
                .unwrap_or_default(),
            class_name: de::field(obj, &["className"]).and_then(de::text),
            name: de::field(obj, &["name"]).and_then(de::text),
        })
    }

    /// Short display label: the simple class name when known.
    pub fn label(&self) -> String {
        match self.class_name.as_deref().or(self.name.as_deref()) {
            Some(name) if !name.is_empty() => short_class_name(name).to_string(),
            _ => "Lock".to_string(),
        }
    }

    /// `className@hexIdentity`, the conventional JVM rendering.
    pub fn qualified(&self) -> String {
        format!(
            "{}@{:x}",
            self.class_name.as_deref().unwrap_or("Unknown"),
            self.identity_hash_code
        )
    }
}

/// Last dot-separated segment of a fully-qualified class name.
pub fn short_class_name(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

/// One thread of the monitored process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: String,
    pub state: ThreadState,
    pub is_deadlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_lock: Option<LockRef>,
    pub owned_locks: Vec<LockRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<String>,
}

impl ThreadInfo {
    /// Thread name, or `Thread-{id}` when the backend sent none.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("Thread-{}", self.id)
        } else {
            self.name.clone()
        }
    }

    /// Decode one thread record. A record without a usable id cannot be
    /// placed in the graph and is rejected; every other field degrades
    /// to its default on its own.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = de::field(obj, &["id", "threadId"]).and_then(de::integer)?;
        Some(Self {
            id,
            name: de::field(obj, &["name"]).and_then(de::text).unwrap_or_default(),
            state: de::field(obj, &["state"])
                .and_then(|v| ThreadState::deserialize(v).ok())
                .unwrap_or_default(),
            is_deadlocked: de::field(obj, &["isDeadlocked", "deadlocked"])
                .and_then(de::flag)
                .unwrap_or_default(),
            waiting_lock: de::field(obj, &["waitingLock"]).and_then(LockInfo::from_value),
            owned_locks: de::list(
                de::field(obj, &["ownedLocks"]),
                "ownedLocks",
                LockInfo::from_value,
            ),
            stack_trace: de::list(de::field(obj, &["stackTrace"]), "stackTrace", de::text),
        })
    }
}

/// JVM vendor/version of the monitored process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JvmInfo {
    pub vendor: Option<String>,
    pub version: Option<String>,
}

impl JvmInfo {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            vendor: de::field(obj, &["vendor"]).and_then(de::text),
            version: de::field(obj, &["version"]).and_then(de::text),
        })
    }
}

/// A single point-in-time view of threads, locks and deadlock status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub captured_at: Option<Timestamp>,
    pub deadlock_detected: bool,
    pub threads: Vec<ThreadInfo>,
    pub locks: Vec<LockInfo>,
    pub resolution: Option<ResolutionSummary>,
    pub deadlock_cycles: Vec<Vec<ThreadId>>,
    pub jvm_info: Option<JvmInfo>,
}

impl Snapshot {
    /// Decode a snapshot payload field by field.
    ///
    /// A malformed field falls back to its default and a malformed list
    /// element is dropped, so one bad thread record never hides the rest
    /// of the snapshot. Only a payload that is not an object at all
    /// yields an empty snapshot. The backend nests the resolution block
    /// and JVM info under `additionalData` and names the capture time
    /// `timestamp`; both spellings are read.
    pub fn from_json(value: serde_json::Value) -> Self {
        Self::from_value(&value)
    }

    fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            tracing::warn!(payload = %value, "Snapshot payload is not an object, using empty snapshot");
            return Self::default();
        };
        let additional = de::field(obj, &["additionalData"]).and_then(Value::as_object);
        let nested = |key: &str| additional.and_then(|data| de::field(data, &[key]));

        Self {
            captured_at: de::field(obj, &["capturedAt", "timestamp"]).and_then(de::timestamp),
            deadlock_detected: de::field(obj, &["deadlockDetected"])
                .and_then(de::flag)
                .unwrap_or_default(),
            threads: de::list(de::field(obj, &["threads"]), "threads", ThreadInfo::from_value),
            locks: de::list(de::field(obj, &["locks"]), "locks", LockInfo::from_value),
            resolution: de::field(obj, &["resolution"])
                .or_else(|| nested("resolution"))
                .and_then(ResolutionSummary::from_value),
            deadlock_cycles: de::list(
                de::field(obj, &["deadlockCycles"]),
                "deadlockCycles",
                |cycle| {
                    cycle
                        .is_array()
                        .then(|| de::list(Some(cycle), "deadlockCycle", de::integer))
                },
            ),
            jvm_info: de::field(obj, &["jvmInfo"])
                .or_else(|| nested("jvmInfo"))
                .and_then(JvmInfo::from_value),
        }
    }

    /// Like [`from_json`](Self::from_json) but starting from raw text.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => Self::from_json(value),
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot payload is not JSON, using empty snapshot");
                Self::default()
            }
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    pub fn deadlocked_count(&self) -> usize {
        self.threads.iter().filter(|t| t.is_deadlocked).count()
    }

    /// Threads in `BLOCKED`, `WAITING` or `TIMED_WAITING`.
    pub fn blocked_count(&self) -> usize {
        self.threads.iter().filter(|t| t.state.is_blocked()).count()
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(&Value::deserialize(deserializer)?))
    }
}

impl<'de> Deserialize<'de> for ThreadInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).ok_or_else(|| D::Error::custom("expected a thread record with an id"))
    }
}

impl<'de> Deserialize<'de> for LockInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).ok_or_else(|| D::Error::custom("expected a lock object"))
    }
}
