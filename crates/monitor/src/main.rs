//! `lockwatch-monitor` -- interactive deadlock monitoring client.
//!
//! Connects to a deadlock-detection backend, follows its push topics over
//! STOMP, and keeps a live view of threads, locks and resolution
//! activity. Commands are read line by line from stdin; type `help` for
//! the list. See [`MonitorConfig::from_env`] for the environment
//! variables.

use std::sync::Arc;

use lockwatch_client::api::MonitorApi;
use lockwatch_client::client::StompConnector;
use lockwatch_client::manager::ConnectionManager;
use lockwatch_monitor::backend::Backend;
use lockwatch_monitor::cli::{self, CliCommand};
use lockwatch_monitor::config::MonitorConfig;
use lockwatch_monitor::dashboard::{Dashboard, DashboardOptions};
use lockwatch_monitor::surface::Surfaces;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lockwatch_monitor=info,lockwatch_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        backend_url = %config.backend_url,
        ws_url = %config.ws_url,
        max_reconnect_attempts = config.reconnect.max_attempts,
        "Starting lockwatch-monitor",
    );

    let api = MonitorApi::new(&config.backend_url)
        .with_timeouts(config.request_timeout, config.health_timeout);
    let backend: Arc<dyn Backend> = Arc::new(api);

    let (connection, events) =
        ConnectionManager::start(StompConnector::new(&config.ws_url), config.reconnect);

    let dashboard = Dashboard::new(
        backend,
        Surfaces::logging(),
        DashboardOptions {
            history: config.history,
            poll_interval: config.poll_interval,
        },
    );
    let (handle, dashboard_task) = dashboard.spawn(events);

    if let Err(e) = handle.initialize().await {
        tracing::error!(error = %e, "Initialization failed");
        connection.disconnect().await;
        std::process::exit(1);
    }

    if let Some(pid) = &config.monitor_pid {
        if let Err(e) = handle.select_process(pid.as_str(), pid.as_str()).await {
            tracing::warn!(pid = %pid, error = %e, "Could not select configured process");
        }
    }

    println!("{}", cli::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                break;
            }
        };

        let command = match cli::parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        if command == CliCommand::Quit {
            break;
        }

        match cli::execute(&handle, command).await {
            Ok(output) => println!("{output}"),
            Err(e) => println!("Error: {e}"),
        }
    }

    connection.disconnect().await;
    drop(handle);
    if let Err(e) = dashboard_task.await {
        tracing::error!(error = %e, "Dashboard task failed");
    }
    tracing::info!("lockwatch-monitor stopped");
}
