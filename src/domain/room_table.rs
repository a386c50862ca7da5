//! Room membership with per-room locking.
//!
//! [`RoomTable`] maps each [`RoomId`] to its member set. The outer map is a
//! [`tokio::sync::RwLock`] held only long enough to find, create, or drop an
//! entry; each entry carries its own [`tokio::sync::Mutex`]. Fanning out to
//! room A therefore never waits on a join to room B.
//!
//! # Invariants
//!
//! - A connection is in a room's member set iff the room is in that
//!   connection's joined-room set. Both sides change while the connection's
//!   membership lock is held.
//! - A room with no members is removed from the map. An entry that has
//!   been emptied is marked retired before it is unlinked, and joiners that
//!   race with the unlink retry against a fresh entry.
//!
//! Lock order is connection membership → outer map → room entry. The
//! outer map is never awaited while a room entry is held.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::{Connection, ConnectionId, RoomId};
use crate::auth::JoinPolicy;
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct RoomState {
    members: BTreeMap<ConnectionId, Arc<Connection>>,
    retired: bool,
}

type RoomEntry = Arc<Mutex<RoomState>>;

/// Occupancy of one room at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    /// Room id.
    pub room: RoomId,
    /// Number of member connections.
    pub members: usize,
}

/// Shared room → members table.
#[derive(Debug)]
pub struct RoomTable {
    rooms: RwLock<HashMap<RoomId, RoomEntry>>,
    policy: Arc<dyn JoinPolicy>,
}

impl RoomTable {
    /// Creates an empty table that authorizes joins through `policy`.
    #[must_use]
    pub fn new(policy: Arc<dyn JoinPolicy>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Adds `conn` to `room`, creating the room on first join.
    ///
    /// Returns `Ok(false)` if the connection was already a member.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Unauthorized`] if the join policy refuses.
    /// - [`GatewayError::ConnectionClosed`] if the connection is being
    ///   removed.
    pub async fn join(&self, conn: &Arc<Connection>, room: &RoomId) -> Result<bool, GatewayError> {
        if !self.policy.can_join(conn.identity(), room).await {
            tracing::info!(
                connection_id = %conn.id(),
                user_id = %conn.identity(),
                %room,
                "join refused by policy"
            );
            return Err(GatewayError::Unauthorized {
                action: "join",
                room: room.to_string(),
            });
        }

        let mut membership = conn.membership().await;
        if !conn.is_alive() {
            return Err(GatewayError::ConnectionClosed(*conn.id().as_uuid()));
        }
        if membership.rooms.contains(room) {
            return Ok(false);
        }
        self.attach(conn, room).await;
        membership.rooms.insert(room.clone());
        tracing::debug!(connection_id = %conn.id(), %room, "joined room");
        Ok(true)
    }

    /// Removes `conn` from `room`, dropping the room if it becomes empty.
    ///
    /// Returns `false` if the connection was not a member.
    pub async fn leave(&self, conn: &Connection, room: &RoomId) -> bool {
        let mut membership = conn.membership().await;
        if !membership.rooms.remove(room) {
            return false;
        }
        self.detach(conn.id(), room).await;
        tracing::debug!(connection_id = %conn.id(), %room, "left room");
        true
    }

    /// Removes a retired connection from every room in `rooms`.
    pub(crate) async fn detach_all(&self, id: ConnectionId, rooms: &BTreeSet<RoomId>) {
        for room in rooms {
            self.detach(id, room).await;
        }
    }

    /// Point-in-time snapshot of a room's members.
    pub async fn members(&self, room: &RoomId) -> Vec<Arc<Connection>> {
        let Some(entry) = self.entry(room).await else {
            return Vec::new();
        };
        let state = entry.lock().await;
        state.members.values().cloned().collect()
    }

    /// Runs `visit` on every member of `room` while holding that room's
    /// lock, so concurrent calls for the same room observe each other in
    /// lock order. `visit` must not block.
    ///
    /// Returns `false` if the room does not exist.
    pub async fn for_each_member<F>(&self, room: &RoomId, mut visit: F) -> bool
    where
        F: FnMut(&Arc<Connection>),
    {
        let Some(entry) = self.entry(room).await else {
            return false;
        };
        let state = entry.lock().await;
        if state.retired {
            return false;
        }
        state.members.values().for_each(&mut visit);
        true
    }

    /// Returns `true` if `room` currently has an entry.
    pub async fn contains(&self, room: &RoomId) -> bool {
        self.rooms.read().await.contains_key(room)
    }

    /// Number of rooms with at least one member.
    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Returns `true` if no room exists.
    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    /// Occupancy of every room, ordered by room id.
    pub async fn summaries(&self) -> Vec<RoomSummary> {
        let entries: Vec<(RoomId, RoomEntry)> = {
            let map = self.rooms.read().await;
            map.iter()
                .map(|(room, entry)| (room.clone(), Arc::clone(entry)))
                .collect()
        };
        let mut summaries = Vec::with_capacity(entries.len());
        for (room, entry) in entries {
            let state = entry.lock().await;
            if !state.retired {
                summaries.push(RoomSummary {
                    room,
                    members: state.members.len(),
                });
            }
        }
        summaries.sort_by(|a, b| a.room.cmp(&b.room));
        summaries
    }

    async fn entry(&self, room: &RoomId) -> Option<RoomEntry> {
        self.rooms.read().await.get(room).cloned()
    }

    async fn attach(&self, conn: &Arc<Connection>, room: &RoomId) {
        loop {
            let entry = self.entry_or_insert(room).await;
            let mut state = entry.lock().await;
            if state.retired {
                // Lost the race with the last leaver; wait for the unlink.
                drop(state);
                tokio::task::yield_now().await;
                continue;
            }
            state.members.insert(conn.id(), Arc::clone(conn));
            return;
        }
    }

    async fn entry_or_insert(&self, room: &RoomId) -> RoomEntry {
        if let Some(entry) = self.entry(room).await {
            return entry;
        }
        let mut map = self.rooms.write().await;
        let entry = map.entry(room.clone()).or_insert_with(|| {
            tracing::debug!(%room, "room created");
            RoomEntry::default()
        });
        Arc::clone(entry)
    }

    async fn detach(&self, id: ConnectionId, room: &RoomId) {
        let Some(entry) = self.entry(room).await else {
            return;
        };
        let mut state = entry.lock().await;
        if state.members.remove(&id).is_none() || !state.members.is_empty() {
            return;
        }
        state.retired = true;
        drop(state);

        let mut map = self.rooms.write().await;
        if map.get(room).is_some_and(|current| Arc::ptr_eq(current, &entry)) {
            map.remove(room);
            tracing::debug!(%room, "room removed");
        }
    }
}
