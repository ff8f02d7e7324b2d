use std::time::Duration;

use lockwatch_client::reconnect::ReconnectPolicy;
use lockwatch_core::store::HistoryRetention;
use reqwest::Url;

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Backend HTTP base URL.
    pub backend_url: String,
    /// Raw WebSocket endpoint carrying STOMP frames.
    pub ws_url: String,
    pub request_timeout: Duration,
    pub health_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub history: HistoryRetention,
    /// Full re-pull period. `None` disables polling.
    pub poll_interval: Option<Duration>,
    /// Process to select right after startup.
    pub monitor_pid: Option<String>,
}

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{name} must be an http(s) URL, got {value:?}")]
    InvalidUrl { name: &'static str, value: String },
}

impl MonitorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                             |
    /// |--------------------------|-------------------------------------|
    /// | `BACKEND_URL`            | `http://localhost:8080`             |
    /// | `BACKEND_WS_URL`         | derived: `ws(s)://host/ws/websocket`|
    /// | `REQUEST_TIMEOUT_MS`     | `10000`                             |
    /// | `HEALTH_TIMEOUT_MS`      | `5000`                              |
    /// | `RECONNECT_DELAY_MS`     | `5000`                              |
    /// | `MAX_RECONNECT_ATTEMPTS` | `10`                                |
    /// | `HISTORY_LIMIT`          | unset (unbounded)                   |
    /// | `POLL_INTERVAL_SECS`     | unset (no polling)                  |
    /// | `MONITOR_PID`            | unset                               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend_url = var("BACKEND_URL")
            .unwrap_or_else(|| "http://localhost:8080".into())
            .trim_end_matches('/')
            .to_string();

        let ws_url = match var("BACKEND_WS_URL") {
            Some(url) => url,
            None => derive_ws_url(&backend_url)?,
        };

        let request_timeout_ms: u64 = parse_or(var("REQUEST_TIMEOUT_MS"), "REQUEST_TIMEOUT_MS", 10_000)?;
        let health_timeout_ms: u64 = parse_or(var("HEALTH_TIMEOUT_MS"), "HEALTH_TIMEOUT_MS", 5_000)?;
        let reconnect_delay_ms: u64 = parse_or(var("RECONNECT_DELAY_MS"), "RECONNECT_DELAY_MS", 5_000)?;
        let max_reconnect_attempts: u32 =
            parse_or(var("MAX_RECONNECT_ATTEMPTS"), "MAX_RECONNECT_ATTEMPTS", 10)?;

        let history_limit: Option<usize> = parse_opt(var("HISTORY_LIMIT"), "HISTORY_LIMIT")?;
        let poll_interval_secs: Option<u64> = parse_opt(var("POLL_INTERVAL_SECS"), "POLL_INTERVAL_SECS")?;

        Ok(Self {
            backend_url,
            ws_url,
            request_timeout: Duration::from_millis(request_timeout_ms),
            health_timeout: Duration::from_millis(health_timeout_ms),
            reconnect: ReconnectPolicy {
                delay: Duration::from_millis(reconnect_delay_ms),
                max_attempts: max_reconnect_attempts,
            },
            history: HistoryRetention::from_limit(history_limit),
            poll_interval: poll_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            monitor_pid: var("MONITOR_PID"),
        })
    }
}

/// `http://host:port/ctx` -> `ws://host:port/ctx/ws/websocket`.
///
/// Only absolute http(s) URLs with a host are accepted.
fn derive_ws_url(backend_url: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        name: "BACKEND_URL",
        value: backend_url.to_string(),
    };

    let mut url = Url::parse(backend_url).map_err(|_| invalid())?;
    if url.host_str().filter(|host| !host.is_empty()).is_none() {
        return Err(invalid());
    }
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Err(invalid()),
    };
    url.set_scheme(scheme).map_err(|_| invalid())?;

    let path = format!("{}/ws/websocket", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.into())
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    Ok(parse_opt(value, name)?.unwrap_or(default))
}

fn parse_opt<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.parse().map_err(|_| ConfigError::Invalid {
                name,
                expected: "a non-negative integer",
                value: v,
            })
        })
        .transpose()
}
