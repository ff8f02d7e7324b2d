//! Push-channel transport.
//!
//! [`PushConnector`] and [`PushSession`] abstract the live connection
//! so the manager's retry logic can run without a server.
//! [`StompConnector`] is the production implementation: a WebSocket
//! carrying STOMP frames, subscribed to every [`Topic`].

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::messages::{parse_push, PushMessage, Topic};
use crate::stomp::{decode_frames, Command, Frame, StompError};

/// How long to wait for CONNECTED after sending CONNECT.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Opens push sessions.
#[async_trait]
pub trait PushConnector: Send + Sync + 'static {
    /// Connect and subscribe. Only returns once every subscription has
    /// been sent.
    async fn connect(&self) -> Result<Box<dyn PushSession>, PushError>;
}

/// A live, subscribed push connection.
#[async_trait]
pub trait PushSession: Send {
    /// The next decoded message, or `Ok(None)` once the server closed
    /// the connection.
    async fn next_message(&mut self) -> Result<Option<PushMessage>, PushError>;

    /// Unsubscribe everything and close the connection.
    async fn close(&mut self) -> Result<(), PushError>;
}

/// Errors on the push channel.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connect(String),

    /// The STOMP handshake did not complete.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server sent a STOMP ERROR frame.
    #[error("STOMP error: {message}")]
    Stomp { message: String },
}

impl From<StompError> for PushError {
    fn from(e: StompError) -> Self {
        Self::Protocol(e.to_string())
    }
}

/// Connects to the backend's STOMP-over-WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct StompConnector {
    ws_url: String,
    handshake_timeout: Duration,
}

impl StompConnector {
    /// * `ws_url` - raw WebSocket endpoint, e.g. `ws://host:8080/ws/websocket`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    fn host(&self) -> String {
        reqwest::Url::parse(&self.ws_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }
}

#[async_trait]
impl PushConnector for StompConnector {
    async fn connect(&self) -> Result<Box<dyn PushSession>, PushError> {
        let (mut ws, _response) = connect_async(self.ws_url.as_str()).await.map_err(|e| {
            PushError::Connect(format!("Failed to connect to {}: {e}", self.ws_url))
        })?;

        send_frame(&mut ws, &Frame::connect(&self.host())).await?;

        let pending = match tokio::time::timeout(self.handshake_timeout, await_connected(&mut ws)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(PushError::Handshake(format!(
                    "no CONNECTED frame within {}ms",
                    self.handshake_timeout.as_millis()
                )))
            }
        };

        let mut subscriptions = Vec::with_capacity(Topic::ALL.len());
        for (i, topic) in Topic::ALL.into_iter().enumerate() {
            let id = format!("sub-{i}");
            send_frame(&mut ws, &Frame::subscribe(&id, topic.destination())).await?;
            subscriptions.push(id);
        }

        tracing::info!(url = %self.ws_url, topics = subscriptions.len(), "Push channel connected");

        let mut session = StompSession {
            ws,
            subscriptions,
            pending: VecDeque::new(),
        };
        session.enqueue(pending)?;
        Ok(Box::new(session))
    }
}

/// Read frames until CONNECTED. Frames that arrive in the same text
/// message after CONNECTED are returned for later delivery.
async fn await_connected(ws: &mut WsStream) -> Result<Vec<Frame>, PushError> {
    while let Some(msg) = ws.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                return Err(PushError::Handshake(format!("closed during handshake: {frame:?}")))
            }
            Ok(_) => continue,
            Err(e) => return Err(PushError::Handshake(e.to_string())),
        };

        let mut frames = decode_frames(&text)?.into_iter();
        while let Some(frame) = frames.next() {
            match frame.command {
                Command::Connected => {
                    tracing::debug!(version = ?frame.header("version"), "STOMP session established");
                    return Ok(frames.collect());
                }
                Command::Error => return Err(stomp_error(&frame)),
                other => {
                    return Err(PushError::Handshake(format!(
                        "expected CONNECTED, got {other}"
                    )))
                }
            }
        }
    }
    Err(PushError::Handshake("connection closed before CONNECTED".into()))
}

fn stomp_error(frame: &Frame) -> PushError {
    let message = frame
        .header("message")
        .map(str::to_string)
        .unwrap_or_else(|| frame.body.clone());
    PushError::Stomp { message }
}

async fn send_frame(ws: &mut WsStream, frame: &Frame) -> Result<(), PushError> {
    ws.send(Message::Text(frame.encode()))
        .await
        .map_err(|e| PushError::Protocol(format!("Failed to send {}: {e}", frame.command)))
}

/// A subscribed STOMP session.
pub struct StompSession {
    ws: WsStream,
    subscriptions: Vec<String>,
    pending: VecDeque<PushMessage>,
}

impl StompSession {
    fn enqueue(&mut self, frames: Vec<Frame>) -> Result<(), PushError> {
        for frame in frames {
            match frame.command {
                Command::Message => {
                    let destination = frame.header("destination").unwrap_or_default();
                    match parse_push(destination, &frame.body) {
                        Some(msg) => self.pending.push_back(msg),
                        None => tracing::debug!(destination, "Ignoring message for unknown destination"),
                    }
                }
                Command::Error => return Err(stomp_error(&frame)),
                other => tracing::trace!(command = %other, "Ignoring frame"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PushSession for StompSession {
    async fn next_message(&mut self) -> Result<Option<PushMessage>, PushError> {
        loop {
            if let Some(msg) = self.pending.pop_front() {
                return Ok(Some(msg));
            }
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frames = decode_frames(&text)?;
                    self.enqueue(frames)?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Push channel closed by server");
                    return Ok(None);
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::trace!("Ignoring binary frame");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(PushError::Protocol(e.to_string())),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<(), PushError> {
        for id in std::mem::take(&mut self.subscriptions) {
            send_frame(&mut self.ws, &Frame::unsubscribe(&id)).await?;
        }
        let receipt = format!("disconnect-{}", uuid::Uuid::now_v7());
        send_frame(&mut self.ws, &Frame::disconnect(&receipt)).await?;
        self.ws
            .close(None)
            .await
            .map_err(|e| PushError::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_from_ws_url() {
        let c = StompConnector::new("ws://backend.local:8080/ws/websocket");
        assert_eq!(c.host(), "backend.local");
    }

    #[test]
    fn host_falls_back_to_localhost() {
        let c = StompConnector::new("not a url");
        assert_eq!(c.host(), "localhost");
    }

    #[test]
    fn error_frame_message_header() {
        let frame = Frame::new(Command::Error).with_header("message", "denied");
        assert!(matches!(stomp_error(&frame), PushError::Stomp { message } if message == "denied"));

        let frame = Frame::new(Command::Error).with_body("body text");
        assert!(matches!(stomp_error(&frame), PushError::Stomp { message } if message == "body text"));
    }
}
