//! Join authorization seam.
//!
//! The room table asks a [`JoinPolicy`] before adding a connection to a
//! room. Membership records live with the scheduling application, which
//! supplies its own policy; [`AllowAll`] and [`StaticGrants`] cover
//! standalone deployments and tests.

use std::collections::{HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;

use crate::domain::{Identity, RoomId};

/// Decides whether an identity may subscribe to a room.
#[async_trait]
pub trait JoinPolicy: Send + Sync + fmt::Debug {
    /// Returns `true` if `identity` may join `room`.
    async fn can_join(&self, identity: &Identity, room: &RoomId) -> bool;
}

/// Lets every authenticated identity join every room.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl JoinPolicy for AllowAll {
    async fn can_join(&self, _identity: &Identity, _room: &RoomId) -> bool {
        true
    }
}

/// Fixed per-user room grants.
#[derive(Debug, Default, Clone)]
pub struct StaticGrants {
    grants: HashMap<String, HashSet<RoomId>>,
}

impl StaticGrants {
    /// Creates an empty grant table that denies everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `user_id` access to `room`.
    #[must_use]
    pub fn grant(mut self, user_id: impl Into<String>, room: RoomId) -> Self {
        self.grants.entry(user_id.into()).or_default().insert(room);
        self
    }

    /// Parses `user=room|room` entries separated by `;`.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed entry or room id.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut grants = Self::new();
        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((user, rooms)) = entry.split_once('=') else {
                return Err(format!("room grant `{entry}` is not user=room|room"));
            };
            let user = user.trim();
            if user.is_empty() {
                return Err(format!("room grant `{entry}` has no user"));
            }
            for text in rooms.split('|').map(str::trim).filter(|r| !r.is_empty()) {
                let room: RoomId = text.parse().map_err(|e| format!("room grant `{entry}`: {e}"))?;
                grants = grants.grant(user, room);
            }
        }
        Ok(grants)
    }
}

#[async_trait]
impl JoinPolicy for StaticGrants {
    async fn can_join(&self, identity: &Identity, room: &RoomId) -> bool {
        self.grants
            .get(&identity.user_id)
            .is_some_and(|rooms| rooms.contains(room))
    }
}
