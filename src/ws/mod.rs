//! WebSocket layer: upgrade, message envelope, session state machine.
//!
//! The WebSocket endpoint at `/ws` admits a client, accepts `join` /
//! `leave` / `update_availability` commands, and pushes the events
//! published to every room the client has joined.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod session;

pub use connection::Heartbeat;
pub use session::{CloseReason, ConnectionSession, SessionState};
