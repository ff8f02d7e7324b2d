//! The dashboard service.
//!
//! [`Dashboard`] owns all monitoring state (current snapshot, session
//! captures, wait-for graph, resolution tracking, process list and the
//! activity timeline) and mutates it from a single loop. Three inputs
//! feed that loop:
//!
//! * commands from any number of [`DashboardHandle`]s,
//! * [`ConnectionEvent`]s from the push channel,
//! * results of pull requests, which run as spawned tasks and re-enter
//!   the loop as messages.
//!
//! Push and pull updates are applied in arrival order; the last one
//! wins. The loop ends once every handle has been dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lockwatch_client::api::{ApiError, InterruptResponse, ToggleResponse};
use lockwatch_client::events::ConnectionEvent;
use lockwatch_client::messages::PushMessage;
use lockwatch_core::graph::{self, WaitForGraph};
use lockwatch_core::process::{MonitorStatus, ProcessInfo, ProcessSelection};
use lockwatch_core::report::{self, Comparison};
use lockwatch_core::resolution::{
    Outcome, ResolutionEvent, ResolutionHistory, ResolutionSummary, ResolutionUpdate,
};
use lockwatch_core::snapshot::Snapshot;
use lockwatch_core::store::{EnrichedSnapshot, HistoryRetention, StateStore};
use lockwatch_core::tracker::ResolutionTracker;
use lockwatch_core::types::ThreadId;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::backend::Backend;
use crate::error::MonitorError;
use crate::notifications::{ActivityEvent, ActivityFeed, Level, Notification};
use crate::surface::{Metrics, ResolutionView, Surfaces};

/// Capacity of the command channel.
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the channel carrying pull results back into the loop.
const PULL_CHANNEL_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, MonitorError>>;

/// Construction options.
#[derive(Debug, Clone, Default)]
pub struct DashboardOptions {
    pub history: HistoryRetention,
    /// Period of the background full re-pull. `None` disables it.
    pub poll_interval: Option<Duration>,
}

/// Everything the dashboard currently knows, as returned by
/// [`DashboardHandle::view`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub connected: bool,
    pub connection_exhausted: bool,
    pub current: Option<Snapshot>,
    pub metrics: Option<Metrics>,
    pub graph: WaitForGraph,
    pub resolution: ResolutionView,
    pub processes: Vec<ProcessInfo>,
    pub selection: Option<ProcessSelection>,
    /// Newest first.
    pub activity: Vec<ActivityEvent>,
    pub captures: usize,
}

enum Command {
    Initialize(Reply<()>),
    Refresh(Reply<()>),
    SelectProcess {
        pid: String,
        name: String,
        reply: Reply<ProcessSelection>,
    },
    StopMonitoring(Reply<()>),
    ToggleAutoResolution(Reply<bool>),
    TriggerResolution(Reply<ResolutionEvent>),
    SimulateResolution {
        success: bool,
        reply: Reply<ResolutionEvent>,
    },
    InterruptThread {
        thread_id: ThreadId,
        reply: Reply<InterruptResponse>,
    },
    SystemInfo(Reply<serde_json::Value>),
    Capture(Reply<EnrichedSnapshot>),
    Compare(Reply<Comparison>),
    Report(Reply<String>),
    View(oneshot::Sender<DashboardView>),
}

/// Results of the pulls behind a full load.
struct FullLoad {
    state: Result<Snapshot, ApiError>,
    stats: Result<ResolutionSummary, ApiError>,
    history: Result<ResolutionHistory, ApiError>,
    processes: Result<Vec<ProcessInfo>, ApiError>,
    monitor: Result<MonitorStatus, ApiError>,
}

/// A finished pull request, re-entering the loop.
enum Pulled {
    Initialized {
        health: Result<serde_json::Value, ApiError>,
        load: Option<FullLoad>,
        reply: Reply<()>,
    },
    Loaded {
        load: FullLoad,
        reply: Option<Reply<()>>,
    },
    ResolutionData {
        stats: Result<ResolutionSummary, ApiError>,
        history: Result<ResolutionHistory, ApiError>,
    },
    ProcessSelected {
        selection: ProcessSelection,
        result: Result<MonitorStatus, ApiError>,
        reply: Reply<ProcessSelection>,
    },
    MonitoringStopped {
        result: Result<MonitorStatus, ApiError>,
        reply: Reply<()>,
    },
    Toggled {
        result: Result<ToggleResponse, ApiError>,
        reply: Reply<bool>,
    },
    Resolution {
        simulated: bool,
        result: Result<ResolutionEvent, ApiError>,
        reply: Reply<ResolutionEvent>,
    },
    Interrupted {
        thread_id: ThreadId,
        result: Result<InterruptResponse, ApiError>,
        reply: Reply<InterruptResponse>,
    },
    CaptureStats {
        result: Result<ResolutionSummary, ApiError>,
        reply: Reply<EnrichedSnapshot>,
    },
    SystemInfo {
        result: Result<serde_json::Value, ApiError>,
        reply: Reply<serde_json::Value>,
    },
}

enum Input {
    Command(Command),
    Pulled(Pulled),
    Connection(ConnectionEvent),
    ConnectionClosed,
    Poll,
    Stop,
}

/// Cheap, cloneable handle for driving a running [`Dashboard`].
#[derive(Clone)]
pub struct DashboardHandle {
    commands: mpsc::Sender<Command>,
}

impl DashboardHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| MonitorError::ShutDown)?;
        rx.await.map_err(|_| MonitorError::ShutDown)?
    }

    /// Probe backend health, then load state, resolution data, the
    /// process list and the current selection. Fails when the backend
    /// is unhealthy.
    pub async fn initialize(&self) -> Result<(), MonitorError> {
        self.request(Command::Initialize).await
    }

    /// Re-pull everything [`initialize`](Self::initialize) loads.
    pub async fn refresh(&self) -> Result<(), MonitorError> {
        self.request(Command::Refresh).await
    }

    pub async fn select_process(
        &self,
        pid: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<ProcessSelection, MonitorError> {
        let (pid, name) = (pid.into(), name.into());
        self.request(|reply| Command::SelectProcess { pid, name, reply })
            .await
    }

    pub async fn stop_monitoring(&self) -> Result<(), MonitorError> {
        self.request(Command::StopMonitoring).await
    }

    /// Returns the new auto-resolution setting.
    pub async fn toggle_auto_resolution(&self) -> Result<bool, MonitorError> {
        self.request(Command::ToggleAutoResolution).await
    }

    pub async fn trigger_resolution(&self) -> Result<ResolutionEvent, MonitorError> {
        self.request(Command::TriggerResolution).await
    }

    pub async fn simulate_resolution(&self, success: bool) -> Result<ResolutionEvent, MonitorError> {
        self.request(|reply| Command::SimulateResolution { success, reply })
            .await
    }

    pub async fn interrupt_thread(&self, thread_id: ThreadId) -> Result<InterruptResponse, MonitorError> {
        self.request(|reply| Command::InterruptThread { thread_id, reply })
            .await
    }

    /// Capture the current snapshot into the session history.
    pub async fn capture(&self) -> Result<EnrichedSnapshot, MonitorError> {
        self.request(Command::Capture).await
    }

    /// Free-form details about the monitored JVM.
    pub async fn system_info(&self) -> Result<serde_json::Value, MonitorError> {
        self.request(Command::SystemInfo).await
    }

    /// Compare the last two captures.
    pub async fn compare(&self) -> Result<Comparison, MonitorError> {
        self.request(Command::Compare).await
    }

    /// Text report of the latest capture.
    pub async fn report(&self) -> Result<String, MonitorError> {
        self.request(Command::Report).await
    }

    pub async fn view(&self) -> Result<DashboardView, MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::View(tx))
            .await
            .map_err(|_| MonitorError::ShutDown)?;
        rx.await.map_err(|_| MonitorError::ShutDown)
    }
}

/// The monitoring state and the loop that owns it.
pub struct Dashboard {
    backend: Arc<dyn Backend>,
    surfaces: Surfaces,
    store: StateStore,
    tracker: ResolutionTracker,
    graph: WaitForGraph,
    processes: Vec<ProcessInfo>,
    selection: Option<ProcessSelection>,
    activity: ActivityFeed,
    connected: bool,
    ever_connected: bool,
    exhausted: bool,
    poll_interval: Option<Duration>,
    pulled_tx: mpsc::Sender<Pulled>,
    pulled_rx: mpsc::Receiver<Pulled>,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn Backend>, surfaces: Surfaces, options: DashboardOptions) -> Self {
        let (pulled_tx, pulled_rx) = mpsc::channel(PULL_CHANNEL_CAPACITY);
        Self {
            backend,
            surfaces,
            store: StateStore::new(options.history),
            tracker: ResolutionTracker::new(),
            graph: WaitForGraph::default(),
            processes: Vec::new(),
            selection: None,
            activity: ActivityFeed::default(),
            connected: false,
            ever_connected: false,
            exhausted: false,
            poll_interval: options.poll_interval,
            pulled_tx,
            pulled_rx,
        }
    }

    /// Spawn the loop. `connection_events` is the receiver returned by
    /// the connection manager.
    pub fn spawn(
        self,
        connection_events: mpsc::Receiver<ConnectionEvent>,
    ) -> (DashboardHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let task = tokio::spawn(self.run(commands_rx, Some(connection_events)));
        (
            DashboardHandle {
                commands: commands_tx,
            },
            task,
        )
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut connection_events: Option<mpsc::Receiver<ConnectionEvent>>,
    ) {
        tracing::info!("Dashboard started");
        let mut poll = self.poll_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            let input = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Input::Command(command),
                    None => Input::Stop,
                },
                Some(pulled) = self.pulled_rx.recv() => Input::Pulled(pulled),
                event = next_event(&mut connection_events) => match event {
                    Some(event) => Input::Connection(event),
                    None => Input::ConnectionClosed,
                },
                _ = next_tick(&mut poll) => Input::Poll,
            };

            match input {
                Input::Command(command) => self.handle_command(command),
                Input::Pulled(pulled) => self.handle_pulled(pulled),
                Input::Connection(event) => self.handle_connection(event),
                Input::ConnectionClosed => {
                    tracing::debug!("Connection event stream ended");
                    connection_events = None;
                }
                Input::Poll => {
                    tracing::debug!("Periodic refresh");
                    self.spawn_full_load(None);
                }
                Input::Stop => break,
            }
        }
        tracing::info!("Dashboard stopped");
    }

    // ---- commands ----

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Initialize(reply) => {
                let backend = Arc::clone(&self.backend);
                self.spawn_pull(async move {
                    let health = backend.health().await;
                    let load = match health {
                        Ok(_) => Some(fetch_full_load(backend.as_ref()).await),
                        Err(_) => None,
                    };
                    Pulled::Initialized {
                        health,
                        load,
                        reply,
                    }
                });
            }
            Command::Refresh(reply) => self.spawn_full_load(Some(reply)),
            Command::SelectProcess { pid, name, reply } => {
                let backend = Arc::clone(&self.backend);
                self.spawn_pull(async move {
                    let result = backend.select_process(&pid, &name).await;
                    Pulled::ProcessSelected {
                        selection: ProcessSelection::new(pid, name),
                        result,
                        reply,
                    }
                });
            }
            Command::StopMonitoring(reply) => {
                let backend = Arc::clone(&self.backend);
                self.spawn_pull(async move {
                    let result = backend.stop_monitoring().await;
                    Pulled::MonitoringStopped { result, reply }
                });
            }
            Command::ToggleAutoResolution(reply) => {
                let backend = Arc::clone(&self.backend);
                self.spawn_pull(async move {
                    let result = backend.toggle_resolution().await;
                    Pulled::Toggled { result, reply }
                });
            }
            Command::TriggerResolution(reply) => {
                let backend = Arc::clone(&self.backend);
                self.spawn_pull(async move {
                    let result = backend.trigger_resolution().await;
                    Pulled::Resolution {
                        simulated: false,
                        result,
                        reply,
                    }
                });
            }
            Command::SimulateResolution { success, reply } => {
                let backend = Arc::clone(&self.backend);
                self.spawn_pull(async move {
                    let result = backend.simulate_resolution(success).await;
                    Pulled::Resolution {
                        simulated: true,
                        result,
                        reply,
                    }
                });
            }
            Command::InterruptThread { thread_id, reply } => {
                let backend = Arc::clone(&self.backend);
                self.spawn_pull(async move {
                    let result = backend.interrupt_thread(thread_id).await;
                    Pulled::Interrupted {
                        thread_id,
                        result,
                        reply,
                    }
                });
            }
            Command::SystemInfo(reply) => {
                let backend = Arc::clone(&self.backend);
                self.spawn_pull(async move {
                    let result = backend.system_info().await;
                    Pulled::SystemInfo { result, reply }
                });
            }
            Command::Capture(reply) => {
                if self.store.current().is_none() {
                    self.notify(Level::Warning, "No data to capture yet");
                    let _ = reply.send(Err(lockwatch_core::CoreError::NoCurrentState.into()));
                    return;
                }
                let backend = Arc::clone(&self.backend);
                self.spawn_pull(async move {
                    let result = backend.resolution_stats().await;
                    Pulled::CaptureStats { result, reply }
                });
            }
            Command::Compare(reply) => {
                let result = report::compare(&self.store);
                match &result {
                    Ok(comparison) => {
                        let status = if comparison.deadlock_cleared {
                            "Deadlock cleared between captures"
                        } else {
                            "Status unchanged between captures"
                        };
                        self.record_activity(
                            Level::Info,
                            "Comparison",
                            format!(
                                "#{} vs #{}: {status}",
                                comparison.before.sequence, comparison.after.sequence
                            ),
                        );
                    }
                    Err(e) => self.notify(Level::Warning, e.to_string()),
                }
                let _ = reply.send(result.map_err(MonitorError::from));
            }
            Command::Report(reply) => {
                let result = self
                    .store
                    .latest()
                    .map(report::render_report)
                    .ok_or(MonitorError::NoCaptures);
                let _ = reply.send(result);
            }
            Command::View(reply) => {
                let _ = reply.send(self.view());
            }
        }
    }

    // ---- pull results ----

    fn handle_pulled(&mut self, pulled: Pulled) {
        match pulled {
            Pulled::Initialized {
                health,
                load,
                reply,
            } => match (health, load) {
                (Ok(_), Some(load)) => {
                    tracing::info!("Backend healthy");
                    let result = self.apply_full_load(load);
                    let _ = reply.send(result);
                }
                (Err(e), _) => {
                    self.notify(Level::Fatal, format!("Backend health check failed: {e}"));
                    let _ = reply.send(Err(MonitorError::Unhealthy(e)));
                }
                (Ok(_), None) => {
                    let _ = reply.send(Ok(()));
                }
            },
            Pulled::Loaded { load, reply } => {
                let result = self.apply_full_load(load);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Pulled::ResolutionData { stats, history } => {
                self.apply_resolution_data(stats, history);
                self.present_resolution();
            }
            Pulled::ProcessSelected {
                selection,
                result,
                reply,
            } => match result {
                Ok(status) => {
                    let selection = status.selection().unwrap_or(selection);
                    let message = status
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("Now monitoring {selection}"));
                    self.selection = Some(selection.clone());
                    self.notify(Level::Success, message.clone());
                    self.record_activity(Level::Info, "Process Selected", message);
                    let _ = reply.send(Ok(selection));
                }
                Err(e) => {
                    self.notify(Level::Error, format!("Failed to select process: {e}"));
                    let _ = reply.send(Err(e.into()));
                }
            },
            Pulled::MonitoringStopped { result, reply } => match result {
                Ok(status) => {
                    self.selection = None;
                    let message = status
                        .message
                        .unwrap_or_else(|| "Stopped monitoring".to_string());
                    self.notify(Level::Info, message.clone());
                    self.record_activity(Level::Info, "Monitoring Stopped", message);
                    let _ = reply.send(Ok(()));
                }
                Err(e) => {
                    self.notify(Level::Error, format!("Failed to stop monitoring: {e}"));
                    let _ = reply.send(Err(e.into()));
                }
            },
            Pulled::Toggled { result, reply } => match result {
                Ok(response) => {
                    let enabled = response.auto_resolution_enabled;
                    self.tracker.set_auto_resolution(enabled);
                    let (level, label) = if enabled {
                        (Level::Success, "ENABLED")
                    } else {
                        (Level::Warning, "DISABLED")
                    };
                    self.notify(level, format!("Auto-Resolution {label}"));
                    self.present_resolution();
                    self.spawn_resolution_reload();
                    let _ = reply.send(Ok(enabled));
                }
                Err(e) => {
                    self.notify(Level::Error, format!("Failed to toggle auto-resolution: {e}"));
                    let _ = reply.send(Err(e.into()));
                }
            },
            Pulled::Resolution {
                simulated,
                result,
                reply,
            } => match result {
                Ok(event) => {
                    let title = if simulated {
                        "Simulated Resolution"
                    } else {
                        "Manual Resolution"
                    };
                    let message = if event.details.is_empty() {
                        "Resolution triggered by user".to_string()
                    } else {
                        event.details.clone()
                    };
                    self.notify(Level::Info, format!("{title} triggered"));
                    self.record_activity(Level::Info, title, message);
                    self.spawn_resolution_reload();
                    let _ = reply.send(Ok(event));
                }
                Err(e) => {
                    self.notify(Level::Error, format!("Failed to trigger resolution: {e}"));
                    let _ = reply.send(Err(e.into()));
                }
            },
            Pulled::Interrupted {
                thread_id,
                result,
                reply,
            } => match result {
                Ok(response) => {
                    let message = response
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("Interrupt sent to thread {thread_id}"));
                    let level = if response.success {
                        Level::Success
                    } else {
                        Level::Warning
                    };
                    self.notify(level, message.clone());
                    self.record_activity(level, "Thread Interrupt", message);
                    let _ = reply.send(Ok(response));
                }
                Err(e) => {
                    self.notify(Level::Error, format!("Failed to interrupt thread {thread_id}: {e}"));
                    let _ = reply.send(Err(e.into()));
                }
            },
            Pulled::SystemInfo { result, reply } => {
                if let Err(e) = &result {
                    self.notify(Level::Warning, format!("Failed to load system info: {e}"));
                }
                let _ = reply.send(result.map_err(MonitorError::from));
            }
            Pulled::CaptureStats { result, reply } => {
                let resolution = match result {
                    Ok(stats) => stats,
                    Err(e) => {
                        self.notify(
                            Level::Warning,
                            format!("Resolution stats unavailable, using local view: {e}"),
                        );
                        self.tracker.summary()
                    }
                };
                let selection = self.selection.clone();
                let result = self
                    .store
                    .capture_session(Some(resolution), selection)
                    .map(EnrichedSnapshot::clone)
                    .map_err(MonitorError::from);
                match &result {
                    Ok(entry) => {
                        let message = format!(
                            "Snapshot #{} captured ({} threads, {} deadlocked)",
                            entry.sequence, entry.thread_count, entry.deadlocked_count
                        );
                        self.notify(Level::Success, message.clone());
                        self.record_activity(Level::Info, "Snapshot Captured", message);
                    }
                    Err(e) => self.notify(Level::Warning, e.to_string()),
                }
                let _ = reply.send(result);
            }
        }
    }

    /// Apply every part of a full load. Failed parts become
    /// notifications; only a failed state pull fails the result.
    fn apply_full_load(&mut self, load: FullLoad) -> Result<(), MonitorError> {
        let FullLoad {
            state,
            stats,
            history,
            processes,
            monitor,
        } = load;

        self.apply_resolution_data(stats, history);

        match processes {
            Ok(list) => self.apply_processes(list),
            Err(e) => self.notify(Level::Warning, format!("Failed to load process list: {e}")),
        }

        match monitor {
            Ok(status) => {
                if let Some(selection) = status.selection() {
                    self.selection = Some(selection);
                }
            }
            Err(e) => tracing::debug!(error = %e, "Current monitor unavailable"),
        }

        let result = match state {
            Ok(snapshot) => {
                self.apply_snapshot(snapshot);
                Ok(())
            }
            Err(e) => {
                self.notify(Level::Error, format!("Failed to load initial data: {e}"));
                Err(e.into())
            }
        };
        self.present_resolution();
        result
    }

    fn apply_resolution_data(
        &mut self,
        stats: Result<ResolutionSummary, ApiError>,
        history: Result<ResolutionHistory, ApiError>,
    ) {
        match history {
            Ok(history) => {
                self.tracker.ingest_history(history);
                let points: Vec<_> = self.tracker.chart_points().copied().collect();
                self.surfaces.chart.reset(&points);
            }
            Err(e) => self.notify(
                Level::Error,
                format!("Failed to load resolution history: {e}"),
            ),
        }
        match stats {
            Ok(stats) => self.tracker.ingest_stats(&stats),
            Err(e) => self.notify(Level::Error, format!("Failed to load resolution data: {e}")),
        }
    }

    // ---- push events ----

    fn handle_connection(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => {
                let reconnected = self.ever_connected;
                self.connected = true;
                self.ever_connected = true;
                self.exhausted = false;
                self.surfaces.presenter.connection_status(true);
                self.notify(Level::Success, "Connected to server");
                self.record_activity(Level::Success, "Connected", "Real-time updates active");
                if reconnected {
                    // Pushes sent while we were away are lost; resync.
                    self.spawn_full_load(None);
                }
            }
            ConnectionEvent::Disconnected { reason } => {
                let was_connected = self.connected;
                self.connected = false;
                self.surfaces.presenter.connection_status(false);
                if was_connected {
                    self.notify(Level::Warning, "Connection lost");
                    self.record_activity(Level::Warning, "Disconnected", reason);
                } else {
                    tracing::debug!(%reason, "Push connection attempt failed");
                }
            }
            ConnectionEvent::Reconnecting {
                attempt,
                max_attempts,
                delay,
            } => {
                self.notify(
                    Level::Info,
                    format!(
                        "Reconnecting in {}s (attempt {attempt}/{max_attempts})",
                        delay.as_secs()
                    ),
                );
            }
            ConnectionEvent::Exhausted { attempts } => {
                self.exhausted = true;
                self.connected = false;
                self.notify(
                    Level::Fatal,
                    format!("Unable to connect to server after {attempts} attempts"),
                );
                self.record_activity(Level::Error, "Connection Lost", "Reconnect attempts exhausted");
            }
            ConnectionEvent::Push(message) => self.handle_push(message),
        }
    }

    fn handle_push(&mut self, message: PushMessage) {
        match message {
            PushMessage::Deadlock(snapshot) => {
                self.apply_snapshot(snapshot);
                self.present_resolution();
            }
            PushMessage::Processes(list) => self.apply_processes(list),
            PushMessage::Resolution(update) => self.apply_resolution_update(update),
            PushMessage::Monitor(status) => self.apply_monitor_status(status),
        }
    }

    // ---- state updates ----

    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        let was_detected = self
            .store
            .current()
            .is_some_and(|current| current.deadlock_detected);
        let detected = snapshot.deadlock_detected;

        if let Some(block) = &snapshot.resolution {
            self.tracker.apply_snapshot_resolution(block);
        }

        self.graph = graph::build(&snapshot);
        self.surfaces.graph.replace(&self.graph);

        let metrics = Metrics::from(&snapshot);
        self.surfaces.presenter.metrics(&metrics);
        self.surfaces.presenter.system_status(detected);

        if detected && !was_detected {
            self.record_activity(
                Level::Error,
                "Deadlock Detected",
                format!("Found {} deadlocked threads", metrics.deadlocked),
            );
        } else if !detected && was_detected {
            self.record_activity(Level::Success, "Deadlock Cleared", "No deadlock detected");
        }

        tracing::debug!(
            threads = metrics.threads,
            locks = metrics.locks,
            deadlocked = metrics.deadlocked,
            "Snapshot applied",
        );
        self.store.apply_snapshot(snapshot);
    }

    fn apply_processes(&mut self, list: Vec<ProcessInfo>) {
        self.processes = list;
        self.surfaces.presenter.process_list(&self.processes);
    }

    fn apply_resolution_update(&mut self, update: ResolutionUpdate) {
        match self.tracker.ingest_update(&update) {
            Some((outcome, point)) => {
                if let Some(point) = point {
                    self.surfaces.chart.push_point(point);
                }
                let message = update.message().to_string();
                match outcome {
                    Outcome::Success => {
                        self.record_activity(Level::Success, "Resolution Success", message);
                        self.notify(Level::Success, "Deadlock Resolved!");
                    }
                    Outcome::Failure => {
                        self.record_activity(Level::Error, "Resolution Failed", message);
                        self.notify(Level::Error, "Resolution Failed");
                    }
                    Outcome::InProgress => {
                        self.record_activity(Level::Warning, "Resolution Attempt", message);
                    }
                }
            }
            None => {
                let enabled = self.tracker.auto_resolution_enabled();
                self.notify(
                    Level::Info,
                    format!("Auto-Resolution {}", if enabled { "ENABLED" } else { "DISABLED" }),
                );
            }
        }
        self.present_resolution();
    }

    fn apply_monitor_status(&mut self, status: MonitorStatus) {
        let message = status.message.clone();
        match status.selection() {
            Some(selection) => self.selection = Some(selection),
            None if status.previous_pid.is_some() || !status.monitoring => self.selection = None,
            None => {}
        }
        if let Some(message) = message {
            self.record_activity(Level::Info, "Process Monitor", message);
        }
    }

    // ---- helpers ----

    fn spawn_pull<F>(&self, fut: F)
    where
        F: Future<Output = Pulled> + Send + 'static,
    {
        let tx = self.pulled_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(fut.await).await;
        });
    }

    fn spawn_full_load(&self, reply: Option<Reply<()>>) {
        let backend = Arc::clone(&self.backend);
        self.spawn_pull(async move {
            let load = fetch_full_load(backend.as_ref()).await;
            Pulled::Loaded { load, reply }
        });
    }

    fn spawn_resolution_reload(&self) {
        let backend = Arc::clone(&self.backend);
        self.spawn_pull(async move {
            let (stats, history) =
                tokio::join!(backend.resolution_stats(), backend.resolution_history());
            Pulled::ResolutionData { stats, history }
        });
    }

    fn notify(&mut self, level: Level, message: impl Into<String>) {
        let notification = Notification::new(level, message);
        self.surfaces.presenter.notify(&notification);
    }

    fn record_activity(&mut self, level: Level, title: &str, message: impl Into<String>) {
        let event = self.activity.push(level, title, message);
        self.surfaces.presenter.activity(event);
    }

    fn present_resolution(&mut self) {
        let view = ResolutionView::from(&self.tracker);
        self.surfaces.presenter.resolution(&view);
    }

    fn view(&self) -> DashboardView {
        let current = self.store.current().cloned();
        DashboardView {
            connected: self.connected,
            connection_exhausted: self.exhausted,
            metrics: current.as_ref().map(Metrics::from),
            current,
            graph: self.graph.clone(),
            resolution: ResolutionView::from(&self.tracker),
            processes: self.processes.clone(),
            selection: self.selection.clone(),
            activity: self.activity.iter().cloned().collect(),
            captures: self.store.history().len(),
        }
    }
}

async fn fetch_full_load(backend: &dyn Backend) -> FullLoad {
    let (state, stats, history, processes, monitor) = tokio::join!(
        backend.state(),
        backend.resolution_stats(),
        backend.resolution_history(),
        backend.processes(),
        backend.current_monitor(),
    );
    FullLoad {
        state,
        stats,
        history,
        processes,
        monitor,
    }
}

async fn next_event(
    events: &mut Option<mpsc::Receiver<ConnectionEvent>>,
) -> Option<ConnectionEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
