//! Deadlock monitor: the dashboard service that ties the backend API,
//! the push channel and the state model together.

pub mod backend;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod notifications;
pub mod surface;
