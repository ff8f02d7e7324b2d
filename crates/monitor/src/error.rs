use lockwatch_client::api::ApiError;
use lockwatch_client::client::PushError;
use lockwatch_client::manager::ManagerError;
use lockwatch_core::CoreError;

use crate::config::ConfigError;

/// Errors surfaced by the dashboard and the binary.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Push(#[from] PushError),

    #[error(transparent)]
    Connection(#[from] ManagerError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The health probe failed, so the session was not started.
    #[error("Backend health check failed: {0}")]
    Unhealthy(#[source] ApiError),

    #[error("No snapshot has been captured yet")]
    NoCaptures,

    /// The dashboard loop is no longer running.
    #[error("Dashboard has shut down")]
    ShutDown,
}
