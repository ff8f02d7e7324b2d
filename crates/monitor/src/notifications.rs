//! User-facing notifications and the activity timeline.

use std::collections::VecDeque;

use chrono::Utc;
use lockwatch_core::types::Timestamp;
use serde::Serialize;

/// Entries kept in the activity timeline.
pub const ACTIVITY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
    /// The session cannot continue without user action.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    pub at: Timestamp,
}

impl Notification {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// One entry of the activity timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEvent {
    pub level: Level,
    pub title: String,
    pub message: String,
    pub at: Timestamp,
}

/// The most recent activity, newest first.
#[derive(Debug, Clone, Default)]
pub struct ActivityFeed {
    events: VecDeque<ActivityEvent>,
}

impl ActivityFeed {
    pub fn push(
        &mut self,
        level: Level,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> &ActivityEvent {
        self.events.push_front(ActivityEvent {
            level,
            title: title.into(),
            message: message.into(),
            at: Utc::now(),
        });
        self.events.truncate(ACTIVITY_LIMIT);
        &self.events[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
