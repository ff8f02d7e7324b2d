//! Push-channel connection manager.
//!
//! [`ConnectionManager`] owns the whole push lifecycle in one spawned
//! task: connect and subscribe, forward decoded messages, and on
//! failure schedule a retry after a fixed delay until the retry budget
//! is spent. Because everything runs in that one task there is never
//! more than one pending reconnect timer.
//!
//! Events are delivered over a bounded [`mpsc`] channel returned by
//! [`ConnectionManager::start`]. The current [`ConnectionState`] is
//! published read-only through a [`watch`] channel.

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{PushConnector, PushSession};
use crate::events::ConnectionEvent;
use crate::reconnect::{ConnectionState, ReconnectDecision, ReconnectPolicy, ReconnectState};

/// Capacity of the event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Manages the push connection to one backend.
pub struct ConnectionManager {
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<Result<(), ManagerError>>>>,
}

impl ConnectionManager {
    /// Spawn the connection task and return the manager together with
    /// the receiving end of its event channel.
    pub fn start<C: PushConnector>(
        connector: C,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let initial = ReconnectState::new(policy).snapshot();
        let (state_tx, state_rx) = watch::channel(initial);
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            tracing::info!("Starting push connection task");
            let result = run_connection_loop(&connector, policy, &event_tx, &state_tx, &task_cancel).await;
            tracing::info!("Push connection task exited");
            result
        });

        let manager = Self {
            state_rx,
            cancel,
            task: Mutex::new(Some(task)),
        };
        (manager, event_rx)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Wait for the connection task to end.
    ///
    /// Returns [`ManagerError::ConnectionExhausted`] when it ended
    /// because the retry budget ran out. A second call returns `Ok`.
    pub async fn join(&self) -> Result<(), ManagerError> {
        let Some(task) = self.task.lock().await.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(e) => Err(ManagerError::TaskFailed(e.to_string())),
        }
    }

    /// Unsubscribe, close the connection and cancel any pending
    /// reconnect timer.
    pub async fn disconnect(&self) {
        tracing::info!("Disconnecting push channel");
        self.cancel.cancel();
        if let Err(e) = self.join().await {
            tracing::debug!(error = %e, "Push connection task ended with error");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Why a session stopped delivering messages.
enum SessionEnd {
    Cancelled,
    ReceiverGone,
    Dropped(String),
}

/// Core connection loop: connect -> forward messages -> retry.
///
/// Runs until cancelled, until the event receiver is dropped, or until
/// the retry budget is spent.
async fn run_connection_loop(
    connector: &dyn PushConnector,
    policy: ReconnectPolicy,
    events: &mpsc::Sender<ConnectionEvent>,
    state_tx: &watch::Sender<ConnectionState>,
    cancel: &CancellationToken,
) -> Result<(), ManagerError> {
    let mut reconnect = ReconnectState::new(policy);

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = connector.connect() => result,
        };

        let reason = match result {
            Ok(mut session) => {
                reconnect.on_connected();
                state_tx.send_replace(reconnect.snapshot());
                tracing::info!("Push channel subscribed");

                let end = if emit(events, ConnectionEvent::Connected, cancel).await {
                    forward_messages(session.as_mut(), events, cancel).await
                } else {
                    ended(cancel)
                };

                match end {
                    SessionEnd::Dropped(reason) => reason,
                    SessionEnd::Cancelled | SessionEnd::ReceiverGone => {
                        if let Err(e) = session.close().await {
                            tracing::debug!(error = %e, "Error closing push session");
                        }
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Push connection failed");
                e.to_string()
            }
        };

        let decision = reconnect.on_failure();
        state_tx.send_replace(reconnect.snapshot());
        if !emit(events, ConnectionEvent::Disconnected { reason }, cancel).await {
            break;
        }

        match decision {
            ReconnectDecision::Retry { attempt, delay } => {
                tracing::info!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling push reconnect",
                );
                let event = ConnectionEvent::Reconnecting {
                    attempt,
                    max_attempts: policy.max_attempts,
                    delay,
                };
                if !emit(events, event, cancel).await {
                    break;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            ReconnectDecision::Exhausted { attempts } => {
                tracing::error!(attempts, "Push reconnect attempts exhausted");
                emit(events, ConnectionEvent::Exhausted { attempts }, cancel).await;
                return Err(ManagerError::ConnectionExhausted { attempts });
            }
        }
    }

    let mut state = reconnect.snapshot();
    state.connected = false;
    state_tx.send_replace(state);
    Ok(())
}

/// Forward messages from `session` until it ends.
async fn forward_messages(
    session: &mut dyn PushSession,
    events: &mpsc::Sender<ConnectionEvent>,
    cancel: &CancellationToken,
) -> SessionEnd {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            next = session.next_message() => next,
        };
        match next {
            Ok(Some(msg)) => {
                if !emit(events, ConnectionEvent::Push(msg), cancel).await {
                    return ended(cancel);
                }
            }
            Ok(None) => return SessionEnd::Dropped("connection closed by server".into()),
            Err(e) => {
                tracing::warn!(error = %e, "Push session error");
                return SessionEnd::Dropped(e.to_string());
            }
        }
    }
}

/// Deliver one event. Returns `false` when cancelled or when nobody is
/// listening any more.
async fn emit(
    events: &mpsc::Sender<ConnectionEvent>,
    event: ConnectionEvent,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}

fn ended(cancel: &CancellationToken) -> SessionEnd {
    if cancel.is_cancelled() {
        SessionEnd::Cancelled
    } else {
        SessionEnd::ReceiverGone
    }
}

/// Errors reported by the manager.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ManagerError {
    /// Every retry failed; no further attempts will be made.
    #[error("Push connection lost after {attempts} reconnect attempts")]
    ConnectionExhausted { attempts: u32 },

    /// The connection task panicked or was aborted.
    #[error("Push connection task failed: {0}")]
    TaskFailed(String),
}
