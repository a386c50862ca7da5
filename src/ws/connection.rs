//! WebSocket read/write loop.
//!
//! Drives one socket through its [`ConnectionSession`]: admission first,
//! then a `select!` over inbound frames, the connection's outbound event
//! queue, the heartbeat ticker, and the shutdown signal. Whatever ends the
//! loop, the session is closed exactly once on the way out.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::session::{CloseReason, ConnectionSession};
use crate::error::GatewayError;
use crate::service::RealtimeService;

/// Close code sent when admission fails.
pub const CLOSE_UNAUTHENTICATED: u16 = 4401;

/// Close code sent when the heartbeat deadline passes.
pub const CLOSE_HEARTBEAT_TIMEOUT: u16 = 4408;

/// Close code sent on server shutdown.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Floor for the ping period; `interval` panics on zero.
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

type WsSink = SplitSink<WebSocket, Message>;

/// Keep-alive timing for one socket.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    /// How often the server pings.
    pub interval: Duration,
    /// Silence after which the socket is dropped.
    pub timeout: Duration,
}

/// Runs the read/write loop for a single WebSocket connection.
pub async fn run_connection(
    socket: WebSocket,
    credential: Option<String>,
    service: RealtimeService,
    heartbeat: Heartbeat,
    mut shutdown: watch::Receiver<bool>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut session = ConnectionSession::new(service);

    let mut outbound = match session.admit(credential.as_deref()).await {
        Ok(outbound) => outbound,
        Err(err) => {
            let _ = send(&mut ws_tx, &WsMessage::error("", &err)).await;
            close_socket(&mut ws_tx, CLOSE_UNAUTHENTICATED, "authentication failed").await;
            session.close(CloseReason::Unauthenticated).await;
            return;
        }
    };

    if let Some(connection) = session.connection() {
        let welcome = WsMessage::response(
            "welcome",
            serde_json::json!({
                "connection_id": connection.id(),
                "user_id": connection.identity().user_id,
            }),
        );
        if let Err(err) = send(&mut ws_tx, &welcome).await {
            session.close(CloseReason::TransportFailure(err.to_string())).await;
            return;
        }
    }

    let period = heartbeat.interval.max(MIN_HEARTBEAT_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    let reason = loop {
        tokio::select! {
            // Incoming frame from client
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        let reply = handle_text_message(text.as_str(), &mut session).await;
                        if let Err(err) = send(&mut ws_tx, &reply).await {
                            break CloseReason::TransportFailure(err.to_string());
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        last_seen = Instant::now();
                        let err = GatewayError::InvalidRequest("binary frames are not supported".to_string());
                        if let Err(err) = send(&mut ws_tx, &WsMessage::error("", &err)).await {
                            break CloseReason::TransportFailure(err.to_string());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break CloseReason::ClientClosed,
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => last_seen = Instant::now(),
                    Some(Err(err)) => break CloseReason::TransportFailure(err.to_string()),
                }
            }
            // Event fanned out to this connection
            event = outbound.recv() => {
                let Some(event) = event else {
                    break CloseReason::TransportFailure("outbound queue closed".to_string());
                };
                if let Err(err) = send(&mut ws_tx, &WsMessage::event(&event)).await {
                    break CloseReason::TransportFailure(err.to_string());
                }
            }
            _ = ticker.tick() => {
                if last_seen.elapsed() >= heartbeat.timeout {
                    close_socket(&mut ws_tx, CLOSE_HEARTBEAT_TIMEOUT, "heartbeat timeout").await;
                    break CloseReason::HeartbeatTimeout;
                }
                if let Err(err) = ws_tx.send(Message::Ping(Bytes::new())).await {
                    break CloseReason::TransportFailure(err.to_string());
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    close_socket(&mut ws_tx, CLOSE_GOING_AWAY, "server shutting down").await;
                    break CloseReason::Shutdown;
                }
            }
        }
    };

    session.close(reason).await;
}

/// Decodes one text frame, applies it, and builds the reply envelope.
async fn handle_text_message(text: &str, session: &mut ConnectionSession) -> WsMessage {
    let msg = match serde_json::from_str::<WsMessage>(text) {
        Ok(msg) => msg,
        Err(err) => {
            let err = GatewayError::InvalidRequest(format!("malformed message: {err}"));
            return WsMessage::error("", &err);
        }
    };
    if msg.msg_type != WsMessageType::Command {
        let err = GatewayError::InvalidRequest("expected a command message".to_string());
        return WsMessage::error(msg.id, &err);
    }

    let result = match WsCommand::from_payload(msg.payload) {
        Ok(command) => session.handle(command).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(payload) => WsMessage::response(msg.id, payload),
        Err(err) => {
            tracing::debug!(error = %err, "ws command failed");
            WsMessage::error(msg.id, &err)
        }
    }
}

async fn send(ws_tx: &mut WsSink, msg: &WsMessage) -> Result<(), GatewayError> {
    let json = msg.to_json()?;
    ws_tx
        .send(Message::text(json))
        .await
        .map_err(|e| GatewayError::TransportFailure(e.to_string()))
}

async fn close_socket(ws_tx: &mut WsSink, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    };
    let _ = ws_tx.send(Message::Close(Some(frame))).await;
}
