//! Per-connection session state machine.
//!
//! ```text
//! Connecting ──admit ok──▶ Authenticated ──close──▶ Closed
//!     │                        │  ▲
//!     └──admit failed──▶ Closed   └─ join / leave / update_availability
//! ```
//!
//! [`ConnectionSession`] knows nothing about sockets: the transport loop
//! feeds it a credential, then decoded commands, then exactly one close.
//! Joins and leaves change room membership but not the state name.

use std::fmt;
use std::sync::Arc;

use crate::domain::{Connection, EventKind, EventReceiver, RoomId};
use crate::error::GatewayError;
use crate::service::RealtimeService;

use super::messages::WsCommand;

/// Top-level session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport is open, admission not yet decided.
    Connecting,
    /// Admitted; commands are accepted.
    Authenticated,
    /// Terminal. Nothing is accepted any more.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Admission failed.
    Unauthenticated,
    /// The client closed the socket.
    ClientClosed,
    /// Reading from or writing to the socket failed.
    TransportFailure(String),
    /// No frame arrived within the heartbeat timeout.
    HeartbeatTimeout,
    /// The server is shutting down.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("unauthenticated"),
            Self::ClientClosed => f.write_str("client closed"),
            Self::TransportFailure(detail) => write!(f, "transport failure: {detail}"),
            Self::HeartbeatTimeout => f.write_str("heartbeat timeout"),
            Self::Shutdown => f.write_str("server shutdown"),
        }
    }
}

/// State machine driving one connection from open to close.
#[derive(Debug)]
pub struct ConnectionSession {
    service: RealtimeService,
    state: SessionState,
    connection: Option<Arc<Connection>>,
}

impl ConnectionSession {
    /// Starts a session in [`SessionState::Connecting`].
    #[must_use]
    pub fn new(service: RealtimeService) -> Self {
        Self {
            service,
            state: SessionState::Connecting,
            connection: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The admitted connection, once authenticated.
    #[must_use]
    pub fn connection(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }

    /// Runs admission. Only valid in [`SessionState::Connecting`].
    ///
    /// On success the session becomes authenticated and the caller gets
    /// the receiving end of the connection's outbound queue. On failure
    /// the session is closed.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Unauthenticated`] / [`GatewayError::VerifierTimeout`]
    ///   if admission fails.
    /// - [`GatewayError::InvalidRequest`] if the session is past
    ///   `Connecting`.
    pub async fn admit(&mut self, credential: Option<&str>) -> Result<EventReceiver, GatewayError> {
        if self.state != SessionState::Connecting {
            return Err(GatewayError::InvalidRequest(
                "admission already decided".to_string(),
            ));
        }
        match self.service.admit(credential).await {
            Ok((connection, outbound)) => {
                self.connection = Some(connection);
                self.state = SessionState::Authenticated;
                Ok(outbound)
            }
            Err(err) => {
                self.state = SessionState::Closed;
                Err(err)
            }
        }
    }

    /// Applies a client command and returns the response payload.
    ///
    /// Failures leave the session open.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::ConnectionClosed`] / [`GatewayError::InvalidRequest`]
    ///   if the session is not authenticated.
    /// - [`GatewayError::InvalidRoom`] for malformed room ids.
    /// - [`GatewayError::Unauthorized`] if the join policy refuses, or an
    ///   availability update targets a room the client is not in.
    pub async fn handle(&mut self, command: WsCommand) -> Result<serde_json::Value, GatewayError> {
        let connection = self.authenticated()?;
        match command {
            WsCommand::Join { kind, room_id } => {
                let room = WsCommand::room(kind, &room_id)?;
                let changed = self.service.join(&connection, &room).await?;
                Ok(serde_json::json!({ "joined": room, "changed": changed }))
            }
            WsCommand::Leave { kind, room_id } => {
                let room = WsCommand::room(kind, &room_id)?;
                let changed = self.service.leave(&connection, &room).await;
                Ok(serde_json::json!({ "left": room, "changed": changed }))
            }
            WsCommand::UpdateAvailability { rehearsal_id, data } => {
                let room = RoomId::rehearsal(rehearsal_id)?;
                let report = self
                    .service
                    .publish_from(&connection, room, EventKind::AvailabilityUpdated, data)
                    .await?;
                Ok(serde_json::json!({
                    "delivered": report.delivered,
                    "dropped": report.dropped,
                }))
            }
            WsCommand::Ping => Ok(serde_json::json!({ "pong": true })),
        }
    }

    /// Moves to [`SessionState::Closed`] and removes the connection from
    /// the core.
    ///
    /// Returns `false` if the session was already closed.
    pub async fn close(&mut self, reason: CloseReason) -> bool {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        if previous == SessionState::Closed {
            return false;
        }
        if let Some(connection) = &self.connection {
            tracing::info!(
                connection_id = %connection.id(),
                user_id = %connection.identity(),
                %reason,
                "session closed"
            );
            self.service.remove(connection.id()).await;
        } else {
            tracing::debug!(%reason, "session closed before admission");
        }
        true
    }

    fn authenticated(&self) -> Result<Arc<Connection>, GatewayError> {
        match (self.state, &self.connection) {
            (SessionState::Authenticated, Some(connection)) => Ok(Arc::clone(connection)),
            (SessionState::Closed, Some(connection)) => {
                Err(GatewayError::ConnectionClosed(*connection.id().as_uuid()))
            }
            _ => Err(GatewayError::InvalidRequest(
                "session is not authenticated".to_string(),
            )),
        }
    }
}

// A session dropped without `close` (task cancelled, panic unwinding) would
// otherwise leave its connection in every room it joined.
impl Drop for ConnectionSession {
    fn drop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let Some(connection) = self.connection.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let service = self.service.clone();
        runtime.spawn(async move {
            if service.remove(connection.id()).await {
                tracing::warn!(connection_id = %connection.id(), "session dropped without close");
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::auth::{StaticGrants, StaticTokenVerifier};
    use crate::domain::RoomKind;

    fn service() -> RealtimeService {
        let verifier = StaticTokenVerifier::new()
            .with_token("t1", "u1")
            .with_token("t2", "u2");
        let Ok(grants) = StaticGrants::parse("u1=band-42|rehearsal-7; u2=band-42") else {
            panic!("valid grants");
        };
        RealtimeService::new(
            Arc::new(verifier),
            Arc::new(grants),
            Duration::from_secs(1),
            8,
        )
    }

    fn join(kind: RoomKind, id: &str) -> WsCommand {
        WsCommand::Join {
            kind,
            room_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn failed_admission_closes_and_blocks_commands() {
        let service = service();
        let mut session = ConnectionSession::new(service.clone());
        assert_eq!(session.state(), SessionState::Connecting);

        let result = session.admit(Some("nope")).await;
        assert!(matches!(result, Err(GatewayError::Unauthenticated(_))));
        assert_eq!(session.state(), SessionState::Closed);

        let refused = session.handle(join(RoomKind::Band, "42")).await;
        assert!(refused.is_err());
        assert_eq!(service.connection_count().await, 0);
        assert_eq!(service.room_count().await, 0);
    }

    #[tokio::test]
    async fn commands_before_admission_are_refused() {
        let mut session = ConnectionSession::new(service());
        let result = session.handle(WsCommand::Ping).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn join_leave_keep_state_authenticated() {
        let mut session = ConnectionSession::new(service());
        assert!(session.admit(Some("t1")).await.is_ok());
        assert_eq!(session.state(), SessionState::Authenticated);

        let Ok(joined) = session.handle(join(RoomKind::Band, "42")).await else {
            panic!("join should succeed");
        };
        assert_eq!(joined["joined"], "band-42");
        assert_eq!(joined["changed"], true);
        assert_eq!(session.state(), SessionState::Authenticated);

        let Ok(left) = session
            .handle(WsCommand::Leave {
                kind: RoomKind::Band,
                room_id: "42".to_string(),
            })
            .await
        else {
            panic!("leave should succeed");
        };
        assert_eq!(left["changed"], true);
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn unauthorized_join_keeps_session_open() {
        let mut session = ConnectionSession::new(service());
        assert!(session.admit(Some("t2")).await.is_ok());
        let result = session.handle(join(RoomKind::Rehearsal, "7")).await;
        assert!(matches!(result, Err(GatewayError::Unauthorized { .. })));
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(session.handle(WsCommand::Ping).await.is_ok());
    }

    #[tokio::test]
    async fn close_removes_connection_once() {
        let service = service();
        let mut session = ConnectionSession::new(service.clone());
        assert!(session.admit(Some("t1")).await.is_ok());
        assert!(session.handle(join(RoomKind::Band, "42")).await.is_ok());

        assert!(session.close(CloseReason::ClientClosed).await);
        assert!(!session.close(CloseReason::HeartbeatTimeout).await);
        assert_eq!(service.connection_count().await, 0);
        assert_eq!(service.room_count().await, 0);

        let result = session.handle(WsCommand::Ping).await;
        assert!(matches!(result, Err(GatewayError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn availability_update_reaches_rehearsal_members() {
        let service = service();
        let mut sender = ConnectionSession::new(service.clone());
        let Ok(_sender_rx) = sender.admit(Some("t1")).await else {
            panic!("admission should succeed");
        };
        let mut listener = ConnectionSession::new(service.clone());
        let Ok(mut listener_rx) = listener.admit(Some("t1")).await else {
            panic!("admission should succeed");
        };
        assert!(sender.handle(join(RoomKind::Rehearsal, "7")).await.is_ok());
        assert!(listener.handle(join(RoomKind::Rehearsal, "7")).await.is_ok());

        let Ok(report) = sender
            .handle(WsCommand::UpdateAvailability {
                rehearsal_id: "7".to_string(),
                data: serde_json::json!({ "status": "maybe" }),
            })
            .await
        else {
            panic!("update should succeed");
        };
        assert_eq!(report["delivered"], 2);
        let Ok(event) = listener_rx.try_recv() else {
            panic!("listener should receive the update");
        };
        assert_eq!(event.kind, EventKind::AvailabilityUpdated);
    }

    #[tokio::test]
    async fn dropped_session_is_cleaned_up() {
        let service = service();
        {
            let mut session = ConnectionSession::new(service.clone());
            assert!(session.admit(Some("t1")).await.is_ok());
            assert!(session.handle(join(RoomKind::Band, "42")).await.is_ok());
        }
        for _ in 0..100 {
            if service.connection_count().await == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(service.connection_count().await, 0);
        assert_eq!(service.room_count().await, 0);
    }
}
