//! Domain model for the lockwatch monitoring client.
//!
//! Holds the typed backend payload schemas, the wait-for graph builder,
//! resolution tracking, the session state store and report generation.
//! Nothing in this crate performs I/O.

mod de;
pub mod error;
pub mod graph;
pub mod process;
pub mod report;
pub mod resolution;
pub mod snapshot;
pub mod store;
pub mod tracker;
pub mod types;

pub use error::CoreError;
