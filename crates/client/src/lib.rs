//! Backend client library for the deadlock monitor.
//!
//! Provides the REST API wrapper, the STOMP-over-WebSocket push channel,
//! push message decoding, the fixed-delay reconnection policy and the
//! [`ConnectionManager`](manager::ConnectionManager) that ties them
//! together.

pub mod api;
pub mod client;
pub mod events;
pub mod manager;
pub mod messages;
pub mod reconnect;
pub mod stomp;
