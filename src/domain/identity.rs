//! Authenticated caller identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity returned by the token verifier at admission.
///
/// Immutable for the lifetime of the connection it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// User id as known to the scheduling application.
    pub user_id: String,
}

impl Identity {
    /// Creates an identity for the given user id.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_id)
    }
}
