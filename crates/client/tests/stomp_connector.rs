//! Tests for `StompConnector` against an in-process WebSocket server
//! that speaks just enough STOMP.

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use lockwatch_client::client::{PushConnector, PushError, StompConnector};
use lockwatch_client::messages::PushMessage;
use lockwatch_client::stomp::{decode_frames, Command, Frame};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// How the fake server answers the CONNECT frame.
#[derive(Clone, Copy)]
enum Handshake {
    Accept,
    Reject,
}

/// Start a one-connection STOMP server. Every frame it receives is
/// reported on the returned channel.
async fn start_server(handshake: Handshake) -> (String, mpsc::UnboundedReceiver<Frame>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut subscriptions = 0;

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            for frame in decode_frames(&text).unwrap() {
                let command = frame.command;
                let receipt = frame.header("receipt").unwrap_or_default().to_string();
                let _ = frame_tx.send(frame);
                match (command, handshake) {
                    (Command::Connect, Handshake::Accept) => {
                        let reply = Frame::new(Command::Connected).with_header("version", "1.2");
                        ws.send(Message::Text(reply.encode())).await.unwrap();
                    }
                    (Command::Connect, Handshake::Reject) => {
                        let reply = Frame::new(Command::Error).with_header("message", "Access denied");
                        ws.send(Message::Text(reply.encode())).await.unwrap();
                        return;
                    }
                    (Command::Subscribe, _) => {
                        subscriptions += 1;
                        if subscriptions == 4 {
                            let body = r#"{"timestamp": 1700000000000, "deadlockDetected": true, "threads": [], "locks": []}"#;
                            let msg = Frame::new(Command::Message)
                                .with_header("destination", "/topic/deadlock")
                                .with_header("subscription", "sub-0")
                                .with_body(body);
                            // Heart-beat first, then the message.
                            ws.send(Message::Text("\n".into())).await.unwrap();
                            ws.send(Message::Text(msg.encode())).await.unwrap();
                        }
                    }
                    (Command::Disconnect, _) => {
                        let reply = Frame::new(Command::Receipt).with_header("receipt-id", receipt);
                        let _ = ws.send(Message::Text(reply.encode())).await;
                    }
                    _ => {}
                }
            }
        }
    });

    (format!("ws://{addr}/ws/websocket"), frame_rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

// ---------------------------------------------------------------------------
// Test: connect subscribes to every topic and delivers messages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_subscribes_and_receives() {
    let (url, mut frames) = start_server(Handshake::Accept).await;

    let mut session = StompConnector::new(&url).connect().await.unwrap();
    let msg = session.next_message().await.unwrap();

    assert_matches!(msg, Some(PushMessage::Deadlock(s)) if s.deadlock_detected);

    let received = drain(&mut frames);
    assert_eq!(received[0].command, Command::Connect);
    assert_eq!(received[0].header("accept-version"), Some("1.2"));
    assert_eq!(received[0].header("host"), Some("127.0.0.1"));

    let destinations: Vec<&str> = received[1..]
        .iter()
        .filter(|f| f.command == Command::Subscribe)
        .filter_map(|f| f.header("destination"))
        .collect();
    assert_eq!(
        destinations,
        vec!["/topic/deadlock", "/topic/processes", "/topic/resolution", "/topic/monitor"]
    );
}

// ---------------------------------------------------------------------------
// Test: close() unsubscribes everything before DISCONNECT
// ---------------------------------------------------------------------------

#[tokio::test]
async fn close_unsubscribes_then_disconnects() {
    let (url, mut frames) = start_server(Handshake::Accept).await;

    let mut session = StompConnector::new(&url).connect().await.unwrap();
    session.next_message().await.unwrap();
    drain(&mut frames);

    session.close().await.unwrap();

    let mut commands = Vec::new();
    while let Some(frame) = frames.recv().await {
        commands.push(frame.command);
        if frame.command == Command::Disconnect {
            break;
        }
    }
    assert_eq!(
        commands,
        vec![
            Command::Unsubscribe,
            Command::Unsubscribe,
            Command::Unsubscribe,
            Command::Unsubscribe,
            Command::Disconnect,
        ]
    );
}

// ---------------------------------------------------------------------------
// Test: an ERROR frame during the handshake fails the connect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn error_frame_fails_connect() {
    let (url, _frames) = start_server(Handshake::Reject).await;

    let err = StompConnector::new(&url).connect().await.err().unwrap();

    assert_matches!(err, PushError::Stomp { message } if message == "Access denied");
}

// ---------------------------------------------------------------------------
// Test: nothing listening is a connect error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_server_is_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = StompConnector::new(format!("ws://{addr}/ws/websocket"))
        .connect()
        .await
        .err()
        .unwrap();

    assert_matches!(err, PushError::Connect(_));
}
