//! A single admitted connection.
//!
//! [`Connection`] carries the authenticated identity, the sending half of
//! the bounded outbound queue, the liveness flag, and the set of rooms the
//! connection has joined. The joined-room set is only mutated by the
//! [`super::RoomTable`] while it holds this connection's membership lock,
//! which is how the connection ⇄ room cross-reference stays consistent.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, mpsc};

use super::{ConnectionId, Identity, RoomEvent, RoomId};

/// Sending half of a connection's outbound event queue.
pub type EventSender = mpsc::Sender<Arc<RoomEvent>>;

/// Receiving half of a connection's outbound event queue.
pub type EventReceiver = mpsc::Receiver<Arc<RoomEvent>>;

/// Outcome of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Event is in the connection's outbound queue.
    Queued,
    /// Queue is full; the event was dropped for this connection.
    Full,
    /// Connection is tearing down; the event was dropped.
    Closed,
}

/// Rooms joined by one connection. Guarded by the connection's mutex.
#[derive(Debug, Default)]
pub(crate) struct Membership {
    pub(crate) rooms: BTreeSet<RoomId>,
}

/// One live, authenticated connection.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    identity: Identity,
    connected_at: DateTime<Utc>,
    outbound: EventSender,
    alive: AtomicBool,
    membership: Mutex<Membership>,
}

impl Connection {
    /// Allocates a connection with a fresh id and an outbound queue of
    /// `capacity` events.
    #[must_use]
    pub fn new(identity: Identity, capacity: usize) -> (Arc<Self>, EventReceiver) {
        let (outbound, inbound) = mpsc::channel(capacity.max(1));
        let connection = Arc::new(Self {
            id: ConnectionId::new(),
            identity,
            connected_at: Utc::now(),
            outbound,
            alive: AtomicBool::new(true),
            membership: Mutex::new(Membership::default()),
        });
        (connection, inbound)
    }

    /// Connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Identity set at admission.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Admission time.
    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Returns `false` once removal has started.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Point-in-time copy of the joined-room set.
    pub async fn rooms(&self) -> Vec<RoomId> {
        self.membership.lock().await.rooms.iter().cloned().collect()
    }

    /// Returns `true` if the connection is currently a member of `room`.
    pub async fn is_member_of(&self, room: &RoomId) -> bool {
        self.membership.lock().await.rooms.contains(room)
    }

    /// Enqueues `event` without waiting for queue space.
    pub(crate) fn try_deliver(&self, event: &Arc<RoomEvent>) -> Delivery {
        if !self.is_alive() {
            return Delivery::Closed;
        }
        match self.outbound.try_send(Arc::clone(event)) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Locks the joined-room set.
    pub(crate) async fn membership(&self) -> MutexGuard<'_, Membership> {
        self.membership.lock().await
    }

    /// Flips the liveness flag and hands back the rooms to detach from.
    ///
    /// Returns `None` if the connection was already retired, so only one
    /// caller ever performs the teardown.
    pub(crate) async fn retire(&self) -> Option<BTreeSet<RoomId>> {
        let mut membership = self.membership.lock().await;
        if !self.alive.swap(false, Ordering::AcqRel) {
            return None;
        }
        Some(std::mem::take(&mut membership.rooms))
    }
}
