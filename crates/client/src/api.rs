//! REST API client for the monitoring backend.
//!
//! Wraps the backend HTTP endpoints (state, process selection,
//! resolution control and statistics) using [`reqwest`]. Every request
//! runs under a timeout; expiry is reported as [`ApiError::Timeout`],
//! distinct from transport failures.

use std::future::Future;
use std::time::Duration;

use lockwatch_core::process::{parse_process_list, MonitorStatus, ProcessInfo};
use lockwatch_core::resolution::{ResolutionEvent, ResolutionHistory, ResolutionSummary};
use lockwatch_core::snapshot::Snapshot;
use lockwatch_core::types::ThreadId;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Timeout applied to ordinary requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Timeout applied to the health probe.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_millis(5_000);

/// HTTP client for one backend.
#[derive(Clone)]
pub struct MonitorApi {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    health_timeout: Duration,
}

/// Response of `POST /api/resolution/toggle`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToggleResponse {
    pub auto_resolution_enabled: bool,
    pub message: Option<String>,
}

/// Response of `POST /api/interrupt/{threadId}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterruptResponse {
    pub success: bool,
    pub message: Option<String>,
    pub thread_id: Option<ThreadId>,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// No response arrived within the request timeout.
    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// The backend returned a non-2xx status code.
    #[error("Backend returned {status}: {reason}")]
    HttpStatus { status: u16, reason: String },

    /// The body was not the JSON we expected.
    #[error("Invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl MonitorApi {
    /// Create a client for the backend at `base_url`, e.g.
    /// `http://localhost:8080`, with the default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, request: Duration, health: Duration) -> Self {
        self.request_timeout = request;
        self.health_timeout = health;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/health`. The payload is free-form.
    pub async fn health(&self) -> Result<serde_json::Value, ApiError> {
        let url = self.url("/api/health");
        let body = self
            .execute(self.client.get(&url), &url, self.health_timeout)
            .await?;
        decode(&url, &body)
    }

    /// `GET /api/state`. Fields of the wrong shape fall back to their
    /// defaults; a body that is not an object yields an empty snapshot.
    pub async fn state(&self) -> Result<Snapshot, ApiError> {
        let value: serde_json::Value = self.get_json("/api/state").await?;
        Ok(Snapshot::from_json(value))
    }

    /// `POST /api/monitor/{pid}?name=...`.
    pub async fn select_process(&self, pid: &str, name: &str) -> Result<MonitorStatus, ApiError> {
        let url = self.url(&format!("/api/monitor/{pid}"));
        let request = self.client.post(&url).query(&[("name", name)]);
        let body = self.execute(request, &url, self.request_timeout).await?;

        // Older backends answer with a plain acknowledgement string.
        match serde_json::from_str::<MonitorStatus>(&body) {
            Ok(status) => Ok(status),
            Err(_) => Ok(MonitorStatus {
                pid: Some(pid.to_string()),
                process_name: Some(name.to_string()),
                monitoring: true,
                message: Some(body),
                previous_pid: None,
            }),
        }
    }

    /// `GET /api/monitor/current`.
    pub async fn current_monitor(&self) -> Result<MonitorStatus, ApiError> {
        self.get_json("/api/monitor/current").await
    }

    /// `DELETE /api/monitor/stop`.
    pub async fn stop_monitoring(&self) -> Result<MonitorStatus, ApiError> {
        let url = self.url("/api/monitor/stop");
        let body = self
            .execute(self.client.delete(&url), &url, self.request_timeout)
            .await?;
        decode(&url, &body)
    }

    /// `GET /api/processes`. Entries of the wrong shape are skipped.
    pub async fn processes(&self) -> Result<Vec<ProcessInfo>, ApiError> {
        let value: serde_json::Value = self.get_json("/api/processes").await?;
        Ok(parse_process_list(value))
    }

    /// `GET /api/system`. The payload is free-form.
    pub async fn system_info(&self) -> Result<serde_json::Value, ApiError> {
        self.get_json("/api/system").await
    }

    /// `POST /api/interrupt/{threadId}`.
    pub async fn interrupt_thread(&self, thread_id: ThreadId) -> Result<InterruptResponse, ApiError> {
        let url = self.url(&format!("/api/interrupt/{thread_id}"));
        let body = self
            .execute(self.client.post(&url), &url, self.request_timeout)
            .await?;
        decode(&url, &body)
    }

    /// `POST /api/resolution/toggle`.
    pub async fn toggle_resolution(&self) -> Result<ToggleResponse, ApiError> {
        self.post_json("/api/resolution/toggle", None).await
    }

    /// `POST /api/resolution/trigger`. The result reads as a manual
    /// resolution event.
    pub async fn trigger_resolution(&self) -> Result<ResolutionEvent, ApiError> {
        self.post_json("/api/resolution/trigger", None).await
    }

    /// `POST /api/resolution/simulate` with body `{"success": ok}`.
    pub async fn simulate_resolution(&self, success: bool) -> Result<ResolutionEvent, ApiError> {
        let body = serde_json::json!({ "success": success });
        self.post_json("/api/resolution/simulate", Some(&body)).await
    }

    /// `GET /api/resolution/stats`.
    pub async fn resolution_stats(&self) -> Result<ResolutionSummary, ApiError> {
        self.get_json("/api/resolution/stats").await
    }

    /// `GET /api/resolution/history`.
    pub async fn resolution_history(&self) -> Result<ResolutionHistory, ApiError> {
        self.get_json("/api/resolution/history").await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let body = self
            .execute(self.client.get(&url), &url, self.request_timeout)
            .await?;
        decode(&url, &body)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut request = self.client.post(&url);
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        let body = self.execute(request, &url, self.request_timeout).await?;
        decode(&url, &body)
    }

    /// Send the request and read the body, all under `timeout`.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
        timeout: Duration,
    ) -> Result<String, ApiError> {
        with_timeout(url, timeout, async {
            let response = Self::ensure_success(request.send().await?).await?;
            Ok(response.text().await?)
        })
        .await
    }

    /// Return the response unchanged on a success status, or an
    /// [`ApiError::HttpStatus`] carrying the body (or the canonical
    /// reason when the body is empty).
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("Unknown").to_string()
            } else {
                body
            };
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                reason,
            });
        }
        Ok(response)
    }
}

async fn with_timeout<T>(
    url: &str,
    timeout: Duration,
    fut: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(url, timeout_ms = timeout.as_millis() as u64, "Request timed out");
            Err(ApiError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}
