//! Token verification seam.
//!
//! Credential checking belongs to the scheduling application's auth layer.
//! The gateway only consumes it through [`TokenVerifier`]. For standalone
//! deployments [`StaticTokenVerifier`] maps a fixed set of bearer tokens to
//! user ids.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::domain::Identity;

/// Reason a credential was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// Token is unknown, malformed, or expired.
    #[error("invalid credential")]
    InvalidCredential,
    /// The verifier itself failed.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a credential to an [`Identity`].
#[async_trait]
pub trait TokenVerifier: Send + Sync + fmt::Debug {
    /// Verifies `credential`.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] if the credential is not accepted.
    async fn verify(&self, credential: &str) -> Result<Identity, Rejection>;
}

/// In-memory verifier backed by a fixed token table.
#[derive(Default, Clone)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenVerifier {
    /// Creates an empty verifier that rejects everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a token for `user_id`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), Identity::new(user_id));
        self
    }

    /// Parses `token=user_id` pairs separated by commas.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed entry.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut verifier = Self::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((token, user)) = entry.split_once('=') else {
                return Err(format!("auth token entry `{entry}` is not token=user_id"));
            };
            let (token, user) = (token.trim(), user.trim());
            if token.is_empty() || user.is_empty() {
                return Err(format!("auth token entry `{entry}` has an empty side"));
            }
            verifier = verifier.with_token(token, user);
        }
        Ok(verifier)
    }

    /// Number of configured tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no token is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

// Tokens are secrets; only the count is printed.
impl fmt::Debug for StaticTokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenVerifier")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity, Rejection> {
        self.tokens
            .get(credential)
            .cloned()
            .ok_or(Rejection::InvalidCredential)
    }
}
