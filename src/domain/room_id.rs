//! Room identifiers.
//!
//! A room is addressed by a composite key: its [`RoomKind`] and an opaque
//! id supplied by the scheduling application. The textual form is
//! `<kind>-<id>`, e.g. `band-42` or `rehearsal-7`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

/// Kind of broadcast group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    /// One room per band.
    Band,
    /// One room per rehearsal.
    Rehearsal,
}

impl RoomKind {
    /// Returns the kind as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Band => "band",
            Self::Rehearsal => "rehearsal",
        }
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "band" => Ok(Self::Band),
            "rehearsal" => Ok(Self::Rehearsal),
            other => Err(GatewayError::InvalidRoom(format!(
                "unknown room kind `{other}`"
            ))),
        }
    }
}

/// Composite room key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId {
    kind: RoomKind,
    id: String,
}

impl RoomId {
    /// Builds a room id from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRoom`] if `id` is empty or contains
    /// whitespace.
    pub fn new(kind: RoomKind, id: impl Into<String>) -> Result<Self, GatewayError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(GatewayError::InvalidRoom(format!(
                "room id `{id}` must be a non-empty token"
            )));
        }
        Ok(Self { kind, id })
    }

    /// Shorthand for a band room.
    ///
    /// # Errors
    ///
    /// See [`RoomId::new`].
    pub fn band(id: impl Into<String>) -> Result<Self, GatewayError> {
        Self::new(RoomKind::Band, id)
    }

    /// Shorthand for a rehearsal room.
    ///
    /// # Errors
    ///
    /// See [`RoomId::new`].
    pub fn rehearsal(id: impl Into<String>) -> Result<Self, GatewayError> {
        Self::new(RoomKind::Rehearsal, id)
    }

    /// Room kind.
    #[must_use]
    pub const fn kind(&self) -> RoomKind {
        self.kind
    }

    /// Opaque id within the kind.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.id)
    }
}

impl FromStr for RoomId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, id)) = s.split_once('-') else {
            return Err(GatewayError::InvalidRoom(format!(
                "`{s}` is not of the form <kind>-<id>"
            )));
        };
        Self::new(kind.parse()?, id)
    }
}

impl Serialize for RoomId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_textual_form() {
        let Ok(room) = "rehearsal-7".parse::<RoomId>() else {
            panic!("valid room id");
        };
        assert_eq!(room.kind(), RoomKind::Rehearsal);
        assert_eq!(room.id(), "7");
        assert_eq!(room.to_string(), "rehearsal-7");
    }

    #[test]
    fn opaque_id_may_contain_dashes() {
        let Ok(room) = "band-3f2a-91".parse::<RoomId>() else {
            panic!("valid room id");
        };
        assert_eq!(room.id(), "3f2a-91");
    }

    #[test]
    fn rejects_unknown_kind_and_empty_id() {
        assert!("setlist-1".parse::<RoomId>().is_err());
        assert!("band-".parse::<RoomId>().is_err());
        assert!("band".parse::<RoomId>().is_err());
        assert!(RoomId::band("4 2").is_err());
    }

    #[test]
    fn serializes_as_string() {
        let Ok(room) = RoomId::band("42") else {
            panic!("valid room id");
        };
        let json = serde_json::to_string(&room).unwrap_or_default();
        assert_eq!(json, "\"band-42\"");
        let back: Result<RoomId, _> = serde_json::from_str(&json);
        assert_eq!(back.ok(), Some(room));
    }
}
