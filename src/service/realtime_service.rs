//! Realtime service: the single entry point into the broadcast core.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{JoinPolicy, TokenVerifier};
use crate::domain::{
    Admission, Connection, ConnectionId, ConnectionRegistry, DispatchReport, Dispatcher,
    EventKind, RoomEvent, RoomId, RoomSummary, RoomTable,
};
use crate::error::GatewayError;

/// Orchestration layer over the registry, the room table, and the
/// dispatcher.
///
/// Cheap to clone. The WebSocket layer drives admission and subscriptions
/// through it; the scheduling application calls [`RealtimeService::publish`]
/// after each committed mutation.
#[derive(Debug, Clone)]
pub struct RealtimeService {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomTable>,
    dispatcher: Dispatcher,
}

impl RealtimeService {
    /// Wires a fresh core around the given collaborators.
    #[must_use]
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        policy: Arc<dyn JoinPolicy>,
        admission_timeout: Duration,
        outbound_capacity: usize,
    ) -> Self {
        let rooms = Arc::new(RoomTable::new(policy));
        let registry = Arc::new(ConnectionRegistry::new(
            verifier,
            Arc::clone(&rooms),
            admission_timeout,
            outbound_capacity,
        ));
        let dispatcher = Dispatcher::new(Arc::clone(&rooms));
        Self {
            registry,
            rooms,
            dispatcher,
        }
    }

    /// Returns a reference to the inner [`ConnectionRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Returns a reference to the inner [`RoomTable`].
    #[must_use]
    pub fn rooms(&self) -> &Arc<RoomTable> {
        &self.rooms
    }

    /// Admits a connection presenting `credential`.
    ///
    /// # Errors
    ///
    /// See [`ConnectionRegistry::admit`].
    pub async fn admit(&self, credential: Option<&str>) -> Result<Admission, GatewayError> {
        self.registry.admit(credential).await
    }

    /// Subscribes `conn` to `room`.
    ///
    /// # Errors
    ///
    /// See [`RoomTable::join`].
    pub async fn join(&self, conn: &Arc<Connection>, room: &RoomId) -> Result<bool, GatewayError> {
        self.rooms.join(conn, room).await
    }

    /// Unsubscribes `conn` from `room`.
    pub async fn leave(&self, conn: &Connection, room: &RoomId) -> bool {
        self.rooms.leave(conn, room).await
    }

    /// Fans an event out to every current member of `room`.
    pub async fn publish(
        &self,
        room: RoomId,
        kind: EventKind,
        data: serde_json::Value,
    ) -> DispatchReport {
        self.dispatcher.publish(RoomEvent::new(room, kind, data)).await
    }

    /// Publishes on behalf of a connected client.
    ///
    /// Clients may only publish into rooms they are currently in.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] if `conn` is not a member of
    /// `room`.
    pub async fn publish_from(
        &self,
        conn: &Connection,
        room: RoomId,
        kind: EventKind,
        data: serde_json::Value,
    ) -> Result<DispatchReport, GatewayError> {
        if !conn.is_member_of(&room).await {
            return Err(GatewayError::Unauthorized {
                action: "publish to",
                room: room.to_string(),
            });
        }
        Ok(self.publish(room, kind, data).await)
    }

    /// Tears a connection down. Idempotent.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        self.registry.remove(id).await
    }

    /// Snapshot of a room's members.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RoomNotFound`] if the room has no members.
    pub async fn room_members(&self, room: &RoomId) -> Result<Vec<Arc<Connection>>, GatewayError> {
        let members = self.rooms.members(room).await;
        if members.is_empty() {
            return Err(GatewayError::RoomNotFound(room.to_string()));
        }
        Ok(members)
    }

    /// Occupancy of every room.
    pub async fn room_summaries(&self) -> Vec<RoomSummary> {
        self.rooms.summaries().await
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    /// Number of non-empty rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.len().await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::{AllowAll, StaticTokenVerifier};
    use crate::domain::EventReceiver;

    fn service() -> RealtimeService {
        let verifier = StaticTokenVerifier::new()
            .with_token("t1", "u1")
            .with_token("t2", "u2");
        RealtimeService::new(
            Arc::new(verifier),
            Arc::new(AllowAll),
            Duration::from_secs(1),
            16,
        )
    }

    fn room(s: &str) -> RoomId {
        let Ok(room) = s.parse() else {
            panic!("valid room id {s}");
        };
        room
    }

    async fn admit(service: &RealtimeService, token: &str) -> (Arc<Connection>, EventReceiver) {
        let Ok(admission) = service.admit(Some(token)).await else {
            panic!("admission for {token} should succeed");
        };
        admission
    }

    #[tokio::test]
    async fn disconnected_member_stops_receiving() {
        let service = service();
        let (u1, mut rx1) = admit(&service, "t1").await;
        let (u2, mut rx2) = admit(&service, "t2").await;
        let band = room("band-42");
        let _ = service.join(&u1, &band).await;
        let _ = service.join(&u2, &band).await;

        assert!(service.remove(u1.id()).await);
        let report = service
            .publish(
                band.clone(),
                EventKind::AvailabilityUpdated,
                serde_json::json!({ "rehearsal_id": "7" }),
            )
            .await;

        assert_eq!(report.delivered, 1);
        assert!(rx1.try_recv().is_err());
        let Ok(event) = rx2.try_recv() else {
            panic!("u2 should receive the event");
        };
        assert_eq!(event.room, band);
        assert_eq!(event.kind, EventKind::AvailabilityUpdated);
    }

    #[tokio::test]
    async fn events_in_different_rooms_arrive_once_each() {
        let service = service();
        let (u1, mut rx) = admit(&service, "t1").await;
        let _ = service.join(&u1, &room("rehearsal-7")).await;
        let _ = service.join(&u1, &room("rehearsal-9")).await;

        service
            .publish(room("rehearsal-7"), EventKind::RehearsalUpdated, serde_json::json!("e1"))
            .await;
        service
            .publish(room("rehearsal-9"), EventKind::RehearsalUpdated, serde_json::json!("e2"))
            .await;

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event.data.clone());
        }
        received.sort_by_key(ToString::to_string);
        assert_eq!(
            received,
            vec![serde_json::json!("e1"), serde_json::json!("e2")]
        );
    }

    #[tokio::test]
    async fn client_publish_requires_membership() {
        let service = service();
        let (u1, _rx) = admit(&service, "t1").await;
        let rehearsal = room("rehearsal-3");
        let denied = service
            .publish_from(&u1, rehearsal.clone(), EventKind::AvailabilityUpdated, serde_json::Value::Null)
            .await;
        assert!(matches!(denied, Err(GatewayError::Unauthorized { .. })));

        let _ = service.join(&u1, &rehearsal).await;
        let allowed = service
            .publish_from(&u1, rehearsal, EventKind::AvailabilityUpdated, serde_json::Value::Null)
            .await;
        assert!(matches!(allowed, Ok(DispatchReport { delivered: 1, .. })));
    }

    #[tokio::test]
    async fn room_members_of_missing_room_is_not_found() {
        let service = service();
        let result = service.room_members(&room("band-0")).await;
        assert!(matches!(result, Err(GatewayError::RoomNotFound(_))));
        assert_eq!(service.room_count().await, 0);
        assert_eq!(service.connection_count().await, 0);
    }
}
