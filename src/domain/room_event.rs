//! Events fanned out to room members.
//!
//! A [`RoomEvent`] is produced by the scheduling application after it has
//! committed a mutation (or by a client for availability updates), and is
//! handed to the [`super::Dispatcher`]. Events are never stored; each one
//! lives for the duration of a single dispatch plus the time it spends in
//! member outbound queues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RoomId;

/// Kind of state change carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// A member's availability for a rehearsal changed.
    AvailabilityUpdated,
    /// A rehearsal was scheduled.
    RehearsalCreated,
    /// Rehearsal details changed.
    RehearsalUpdated,
    /// A rehearsal was cancelled.
    RehearsalDeleted,
    /// Band details changed.
    BandUpdated,
    /// A user joined the band.
    MemberJoined,
    /// A user left the band.
    MemberLeft,
    /// A setlist attached to the band or rehearsal changed.
    SetlistUpdated,
}

impl EventKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AvailabilityUpdated => "availability-updated",
            Self::RehearsalCreated => "rehearsal-created",
            Self::RehearsalUpdated => "rehearsal-updated",
            Self::RehearsalDeleted => "rehearsal-deleted",
            Self::BandUpdated => "band-updated",
            Self::MemberJoined => "member-joined",
            Self::MemberLeft => "member-left",
            Self::SetlistUpdated => "setlist-updated",
        }
    }
}

/// Immutable event tagged with its target room.
#[derive(Debug, Clone, Serialize)]
pub struct RoomEvent {
    /// Event kind.
    #[serde(rename = "event")]
    pub kind: EventKind,
    /// Target room.
    pub room: RoomId,
    /// Application payload, forwarded verbatim.
    pub data: serde_json::Value,
    /// Time the event entered the dispatcher.
    pub published_at: DateTime<Utc>,
}

impl RoomEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(room: RoomId, kind: EventKind, data: serde_json::Value) -> Self {
        Self {
            kind,
            room,
            data,
            published_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kebab_case_kind() {
        let Ok(room) = RoomId::rehearsal("7") else {
            panic!("valid room id");
        };
        let event = RoomEvent::new(
            room,
            EventKind::AvailabilityUpdated,
            serde_json::json!({ "user_id": "u1", "status": "available" }),
        );
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["event"], "availability-updated");
        assert_eq!(json["room"], "rehearsal-7");
        assert_eq!(json["data"]["status"], "available");
    }

    #[test]
    fn as_str_matches_serde_name() {
        let kind = EventKind::MemberLeft;
        let json = serde_json::to_string(&kind).unwrap_or_default();
        assert_eq!(json, format!("\"{}\"", kind.as_str()));
    }
}
