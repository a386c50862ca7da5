//! Live connection registry.
//!
//! [`ConnectionRegistry`] owns connection lifecycle: it admits a credential
//! through the [`TokenVerifier`] under a deadline, hands out fresh
//! [`Connection`]s, and tears them down exactly once.
//!
//! # Concurrency
//!
//! - The id → connection map sits behind a [`tokio::sync::RwLock`].
//! - Teardown is claimed through [`Connection::retire`], so concurrent
//!   removal triggers (socket close racing a protocol error, say) run the
//!   room cleanup once and the others return immediately.
//! - A connection leaves the map only after it has left every room.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use super::{Connection, ConnectionId, EventReceiver, RoomTable};
use crate::auth::TokenVerifier;
use crate::error::GatewayError;

/// Result of a successful admission: the connection and the receiving end
/// of its outbound queue.
pub type Admission = (Arc<Connection>, EventReceiver);

/// Registry of every admitted, not yet removed, connection.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    verifier: Arc<dyn TokenVerifier>,
    rooms: Arc<RoomTable>,
    admission_timeout: Duration,
    outbound_capacity: usize,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        rooms: Arc<RoomTable>,
        admission_timeout: Duration,
        outbound_capacity: usize,
    ) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            verifier,
            rooms,
            admission_timeout,
            outbound_capacity,
        }
    }

    /// Verifies `credential` and registers a new connection.
    ///
    /// The new connection has not joined any room.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Unauthenticated`] if the credential is missing,
    ///   blank, or rejected by the verifier.
    /// - [`GatewayError::VerifierTimeout`] if the verifier does not answer
    ///   within the admission deadline.
    pub async fn admit(&self, credential: Option<&str>) -> Result<Admission, GatewayError> {
        let Some(credential) = credential.map(str::trim).filter(|c| !c.is_empty()) else {
            tracing::info!("admission rejected: missing credential");
            return Err(GatewayError::Unauthenticated(
                "missing credential".to_string(),
            ));
        };

        let verdict = tokio::time::timeout(self.admission_timeout, self.verifier.verify(credential))
            .await
            .map_err(|_| {
                tracing::warn!(
                    timeout_ms = duration_ms(self.admission_timeout),
                    "admission rejected: token verifier timed out"
                );
                GatewayError::VerifierTimeout {
                    timeout_ms: duration_ms(self.admission_timeout),
                }
            })?;

        let identity = verdict.map_err(|rejection| {
            tracing::info!(reason = %rejection, "admission rejected");
            GatewayError::Unauthenticated(rejection.to_string())
        })?;

        let (connection, outbound) = Connection::new(identity, self.outbound_capacity);
        self.connections
            .write()
            .await
            .insert(connection.id(), Arc::clone(&connection));

        tracing::info!(
            connection_id = %connection.id(),
            user_id = %connection.identity(),
            "connection admitted"
        );
        Ok((connection, outbound))
    }

    /// Tears a connection down: marks it dead, leaves every joined room,
    /// then forgets it.
    ///
    /// Idempotent. Returns `true` only for the call that performed the
    /// teardown.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let Some(connection) = self.get(id).await else {
            return false;
        };
        let Some(rooms) = connection.retire().await else {
            return false;
        };

        self.rooms.detach_all(id, &rooms).await;
        self.connections.write().await.remove(&id);

        tracing::info!(
            connection_id = %id,
            user_id = %connection.identity(),
            rooms = rooms.len(),
            "connection removed"
        );
        true
    }

    /// Looks up a live connection.
    pub async fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.read().await.get(&id).cloned()
    }

    /// Returns `true` if `id` is registered.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::{AllowAll, Rejection, StaticTokenVerifier};
    use crate::domain::{Identity, RoomId};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct StalledVerifier;

    #[async_trait]
    impl TokenVerifier for StalledVerifier {
        async fn verify(&self, _credential: &str) -> Result<Identity, Rejection> {
            std::future::pending().await
        }
    }

    fn room(s: &str) -> RoomId {
        let Ok(room) = s.parse() else {
            panic!("valid room id {s}");
        };
        room
    }

    fn registry_with(verifier: Arc<dyn TokenVerifier>) -> (Arc<RoomTable>, ConnectionRegistry) {
        let rooms = Arc::new(RoomTable::new(Arc::new(AllowAll)));
        let registry =
            ConnectionRegistry::new(verifier, Arc::clone(&rooms), Duration::from_millis(50), 8);
        (rooms, registry)
    }

    fn registry() -> (Arc<RoomTable>, ConnectionRegistry) {
        registry_with(Arc::new(
            StaticTokenVerifier::new()
                .with_token("t1", "u1")
                .with_token("t2", "u2"),
        ))
    }

    #[tokio::test]
    async fn admit_registers_connection_without_rooms() {
        let (_rooms, registry) = registry();
        let Ok((conn, _rx)) = registry.admit(Some("t1")).await else {
            panic!("admission should succeed");
        };
        assert_eq!(conn.identity().user_id, "u1");
        assert!(conn.rooms().await.is_empty());
        assert!(registry.contains(conn.id()).await);
    }

    #[tokio::test]
    async fn rejected_credentials_never_register() {
        let (_rooms, registry) = registry();
        for credential in [None, Some(""), Some("   "), Some("bogus")] {
            let result = registry.admit(credential).await;
            assert!(matches!(result, Err(GatewayError::Unauthenticated(_))));
        }
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn stalled_verifier_times_out() {
        let (_rooms, registry) = registry_with(Arc::new(StalledVerifier));
        let result = registry.admit(Some("t1")).await;
        assert!(matches!(
            result,
            Err(GatewayError::VerifierTimeout { timeout_ms: 50 })
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn remove_leaves_every_room_and_drops_empty_ones() {
        let (rooms, registry) = registry();
        let Ok((a, _ra)) = registry.admit(Some("t1")).await else {
            panic!("admission should succeed");
        };
        let Ok((b, _rb)) = registry.admit(Some("t2")).await else {
            panic!("admission should succeed");
        };
        let _ = rooms.join(&a, &room("rehearsal-7")).await;
        let _ = rooms.join(&a, &room("band-42")).await;
        let _ = rooms.join(&b, &room("band-42")).await;

        assert!(registry.remove(a.id()).await);

        assert!(!rooms.contains(&room("rehearsal-7")).await);
        let members = rooms.members(&room("band-42")).await;
        assert_eq!(members.len(), 1);
        assert!(members.iter().all(|m| m.id() == b.id()));
        assert!(!registry.contains(a.id()).await);
        assert!(a.rooms().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_removal_runs_teardown_once() {
        let (rooms, registry) = registry();
        let registry = Arc::new(registry);
        let Ok((a, _ra)) = registry.admit(Some("t1")).await else {
            panic!("admission should succeed");
        };
        let _ = rooms.join(&a, &room("band-1")).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let id = a.id();
                tokio::spawn(async move { registry.remove(id).await })
            })
            .collect();
        let mut performed = 0;
        for handle in handles {
            if matches!(handle.await, Ok(true)) {
                performed += 1;
            }
        }
        assert_eq!(performed, 1);
        assert!(rooms.is_empty().await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn removed_connection_cannot_rejoin() {
        let (rooms, registry) = registry();
        let Ok((a, _ra)) = registry.admit(Some("t1")).await else {
            panic!("admission should succeed");
        };
        registry.remove(a.id()).await;
        assert!(!registry.remove(a.id()).await);
        let result = rooms.join(&a, &room("band-1")).await;
        assert!(matches!(result, Err(GatewayError::ConnectionClosed(_))));
        assert!(rooms.is_empty().await);
    }
}
