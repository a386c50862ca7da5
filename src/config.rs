//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Numeric settings fall back to their
//! defaults when missing or malformed; addresses, token tables, and room
//! grants must parse if present.

use std::net::SocketAddr;
use std::time::Duration;

use crate::auth::{StaticGrants, StaticTokenVerifier};

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:5000`).
    pub listen_addr: SocketAddr,

    /// Browser origin allowed by CORS. `None` means permissive.
    pub cors_origin: Option<String>,

    /// Capacity of each connection's outbound event queue.
    pub outbound_buffer: usize,

    /// Deadline for the token verifier during admission.
    pub admission_timeout: Duration,

    /// Interval between server pings on idle sockets.
    pub heartbeat_interval: Duration,

    /// Silence after which a socket is considered dead.
    pub heartbeat_timeout: Duration,

    /// Bearer tokens accepted at admission.
    pub tokens: StaticTokenVerifier,

    /// Per-user room grants. `None` lets every identity join every room.
    pub room_grants: Option<StaticGrants>,

    /// Bearer token required by the HTTP publish endpoint, if any.
    pub publish_token: Option<String>,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            cors_origin: None,
            outbound_buffer: 256,
            admission_timeout: Duration::from_millis(5000),
            heartbeat_interval: Duration::from_secs(25),
            heartbeat_timeout: Duration::from_secs(60),
            tokens: StaticTokenVerifier::new(),
            room_grants: None,
            publish_token: None,
            log_json: false,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR`, `AUTH_TOKENS`, or `ROOM_GRANTS`
    /// is set but malformed.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr: SocketAddr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.listen_addr,
        };

        let tokens = match std::env::var("AUTH_TOKENS") {
            Ok(raw) => StaticTokenVerifier::parse(&raw)?,
            Err(_) => defaults.tokens,
        };

        let room_grants = match std::env::var("ROOM_GRANTS") {
            Ok(raw) => Some(StaticGrants::parse(&raw)?),
            Err(_) => None,
        };

        Ok(Self {
            listen_addr,
            cors_origin: non_empty_env("CORS_ORIGIN"),
            outbound_buffer: parse_env("OUTBOUND_BUFFER", defaults.outbound_buffer),
            admission_timeout: Duration::from_millis(parse_env("ADMISSION_TIMEOUT_MS", 5000)),
            heartbeat_interval: Duration::from_secs(parse_env("HEARTBEAT_INTERVAL_SECS", 25)),
            heartbeat_timeout: Duration::from_secs(parse_env("HEARTBEAT_TIMEOUT_SECS", 60)),
            tokens,
            room_grants,
            publish_token: non_empty_env("PUBLISH_TOKEN"),
            log_json: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Reads an environment variable, treating blank values as unset.
fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
