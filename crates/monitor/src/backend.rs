//! The pull side of the backend, as the dashboard sees it.

use async_trait::async_trait;
use lockwatch_client::api::{ApiError, InterruptResponse, MonitorApi, ToggleResponse};
use lockwatch_core::process::{MonitorStatus, ProcessInfo};
use lockwatch_core::resolution::{ResolutionEvent, ResolutionHistory, ResolutionSummary};
use lockwatch_core::snapshot::Snapshot;
use lockwatch_core::types::ThreadId;

/// Backend REST operations used by the dashboard.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn health(&self) -> Result<serde_json::Value, ApiError>;
    async fn state(&self) -> Result<Snapshot, ApiError>;
    async fn select_process(&self, pid: &str, name: &str) -> Result<MonitorStatus, ApiError>;
    async fn current_monitor(&self) -> Result<MonitorStatus, ApiError>;
    async fn stop_monitoring(&self) -> Result<MonitorStatus, ApiError>;
    async fn processes(&self) -> Result<Vec<ProcessInfo>, ApiError>;
    async fn system_info(&self) -> Result<serde_json::Value, ApiError>;
    async fn interrupt_thread(&self, thread_id: ThreadId) -> Result<InterruptResponse, ApiError>;
    async fn toggle_resolution(&self) -> Result<ToggleResponse, ApiError>;
    async fn trigger_resolution(&self) -> Result<ResolutionEvent, ApiError>;
    async fn simulate_resolution(&self, success: bool) -> Result<ResolutionEvent, ApiError>;
    async fn resolution_stats(&self) -> Result<ResolutionSummary, ApiError>;
    async fn resolution_history(&self) -> Result<ResolutionHistory, ApiError>;
}

#[async_trait]
impl Backend for MonitorApi {
    async fn health(&self) -> Result<serde_json::Value, ApiError> {
        MonitorApi::health(self).await
    }

    async fn state(&self) -> Result<Snapshot, ApiError> {
        MonitorApi::state(self).await
    }

    async fn select_process(&self, pid: &str, name: &str) -> Result<MonitorStatus, ApiError> {
        MonitorApi::select_process(self, pid, name).await
    }

    async fn current_monitor(&self) -> Result<MonitorStatus, ApiError> {
        MonitorApi::current_monitor(self).await
    }

    async fn stop_monitoring(&self) -> Result<MonitorStatus, ApiError> {
        MonitorApi::stop_monitoring(self).await
    }

    async fn processes(&self) -> Result<Vec<ProcessInfo>, ApiError> {
        MonitorApi::processes(self).await
    }

    async fn system_info(&self) -> Result<serde_json::Value, ApiError> {
        MonitorApi::system_info(self).await
    }

    async fn interrupt_thread(&self, thread_id: ThreadId) -> Result<InterruptResponse, ApiError> {
        MonitorApi::interrupt_thread(self, thread_id).await
    }

    async fn toggle_resolution(&self) -> Result<ToggleResponse, ApiError> {
        MonitorApi::toggle_resolution(self).await
    }

    async fn trigger_resolution(&self) -> Result<ResolutionEvent, ApiError> {
        MonitorApi::trigger_resolution(self).await
    }

    async fn simulate_resolution(&self, success: bool) -> Result<ResolutionEvent, ApiError> {
        MonitorApi::simulate_resolution(self, success).await
    }

    async fn resolution_stats(&self) -> Result<ResolutionSummary, ApiError> {
        MonitorApi::resolution_stats(self).await
    }

    async fn resolution_history(&self) -> Result<ResolutionHistory, ApiError> {
        MonitorApi::resolution_history(self).await
    }
}
