//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{RoomEvent, RoomId, RoomKind};
use crate::error::GatewayError;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    #[serde(default)]
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

impl WsMessage {
    /// Response to the command with the given id.
    #[must_use]
    pub fn response(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            msg_type: WsMessageType::Response,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Error reply, optionally correlated with a command id.
    #[must_use]
    pub fn error(id: impl Into<String>, err: &GatewayError) -> Self {
        Self {
            id: id.into(),
            msg_type: WsMessageType::Error,
            timestamp: Utc::now(),
            payload: serde_json::to_value(err.to_body()).unwrap_or_default(),
        }
    }

    /// Pushed room event.
    #[must_use]
    pub fn event(event: &RoomEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            msg_type: WsMessageType::Event,
            timestamp: event.published_at,
            payload: serde_json::to_value(event).unwrap_or_default(),
        }
    }

    /// Serializes the envelope to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if serialization fails.
    pub fn to_json(&self) -> Result<String, GatewayError> {
        serde_json::to_string(self).map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

/// Commands that a client can send over WebSocket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to a room.
    Join {
        /// Room kind.
        kind: RoomKind,
        /// Room id within the kind.
        #[serde(deserialize_with = "opaque_id")]
        room_id: String,
    },
    /// Unsubscribe from a room.
    Leave {
        /// Room kind.
        kind: RoomKind,
        /// Room id within the kind.
        #[serde(deserialize_with = "opaque_id")]
        room_id: String,
    },
    /// Broadcast an availability change to a rehearsal room the client
    /// is in.
    UpdateAvailability {
        /// Target rehearsal.
        #[serde(deserialize_with = "opaque_id")]
        rehearsal_id: String,
        /// Availability payload, forwarded verbatim.
        #[serde(default)]
        data: serde_json::Value,
    },
    /// Application-level keep-alive.
    Ping,
}

impl WsCommand {
    /// Parses a command out of an envelope payload.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the payload does not
    /// describe a known command.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, GatewayError> {
        serde_json::from_value(payload).map_err(|e| GatewayError::InvalidRequest(e.to_string()))
    }

    /// Builds the target room for `join` / `leave`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRoom`] if the room id is not a valid
    /// token.
    pub fn room(kind: RoomKind, room_id: &str) -> Result<RoomId, GatewayError> {
        RoomId::new(kind, room_id)
    }
}

/// Accepts ids sent as JSON strings or integers.
fn opaque_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn join_accepts_numeric_room_id() {
        let cmd = WsCommand::from_payload(serde_json::json!({
            "command": "join",
            "kind": "band",
            "room_id": 42
        }));
        assert_eq!(
            cmd.ok(),
            Some(WsCommand::Join {
                kind: RoomKind::Band,
                room_id: "42".to_string()
            })
        );
    }

    #[test]
    fn unknown_command_is_invalid_request() {
        let cmd = WsCommand::from_payload(serde_json::json!({ "command": "dance" }));
        assert!(matches!(cmd, Err(GatewayError::InvalidRequest(_))));
        let cmd = WsCommand::from_payload(serde_json::json!({ "command": "join", "kind": "studio", "room_id": "1" }));
        assert!(matches!(cmd, Err(GatewayError::InvalidRequest(_))));
    }

    #[test]
    fn envelope_defaults_missing_fields() {
        let Ok(msg) = serde_json::from_str::<WsMessage>(r#"{"type":"command","payload":{"command":"ping"}}"#)
        else {
            panic!("envelope should parse");
        };
        assert!(msg.id.is_empty());
        assert_eq!(msg.msg_type, WsMessageType::Command);
        assert_eq!(WsCommand::from_payload(msg.payload).ok(), Some(WsCommand::Ping));
    }

    #[test]
    fn error_envelope_carries_code() {
        let msg = WsMessage::error("c1", &GatewayError::Unauthenticated("bad".to_string()));
        let Ok(json) = msg.to_json() else {
            panic!("serializable");
        };
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("4010"));
        assert!(json.contains("authentication failed"));
    }
}
