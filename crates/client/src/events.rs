//! Events emitted by the connection manager.
//!
//! These represent push-channel lifecycle changes and decoded push
//! payloads. They are delivered over a bounded channel to whichever
//! component owns the monitoring state.

use std::time::Duration;

use crate::messages::PushMessage;

/// A push-channel event.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Connected and subscribed to every topic.
    Connected,

    /// The connection failed or dropped.
    Disconnected { reason: String },

    /// A decoded push payload.
    Push(PushMessage),

    /// A retry is scheduled after `delay`.
    Reconnecting {
        /// 1-based retry number.
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },

    /// The retry budget is spent. No further connection attempts will
    /// be made.
    Exhausted { attempts: u32 },
}

impl ConnectionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}
