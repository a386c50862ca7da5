//! Room-related DTOs for introspection and HTTP publishing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{EventKind, RoomKind, RoomSummary};

/// One entry of `GET /rooms`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomSummaryDto {
    /// Textual room id (`band-42`).
    pub room: String,
    /// Room kind.
    pub kind: RoomKind,
    /// Id within the kind.
    pub room_id: String,
    /// Number of member connections.
    pub members: usize,
}

impl From<RoomSummary> for RoomSummaryDto {
    fn from(summary: RoomSummary) -> Self {
        Self {
            room: summary.room.to_string(),
            kind: summary.room.kind(),
            room_id: summary.room.id().to_string(),
            members: summary.members,
        }
    }
}

/// Response body for `GET /rooms`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomListResponse {
    /// Every non-empty room, ordered by room id.
    pub data: Vec<RoomSummaryDto>,
    /// Number of rooms.
    pub total: usize,
}

/// One member of a room.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomMemberDto {
    /// Connection id.
    pub connection_id: uuid::Uuid,
    /// Authenticated user id.
    pub user_id: String,
    /// Admission time.
    pub connected_at: DateTime<Utc>,
}

/// Response body for `GET /rooms/{kind}/{room_id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomDetailResponse {
    /// Textual room id.
    pub room: String,
    /// Current members.
    pub members: Vec<RoomMemberDto>,
}

/// Request body for `POST /rooms/{kind}/{room_id}/events`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishEventRequest {
    /// Event kind.
    pub event: EventKind,
    /// Payload forwarded verbatim to members.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Response body for `POST /rooms/{kind}/{room_id}/events` (202 Accepted).
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishEventResponse {
    /// Textual room id.
    pub room: String,
    /// Members whose queue accepted the event.
    pub delivered: usize,
    /// Members skipped because their queue was full or closing.
    pub dropped: usize,
}
