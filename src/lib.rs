//! # bandroom-gateway
//!
//! Real-time, room-scoped broadcast core for a band-rehearsal scheduling
//! application.
//!
//! Clients hold a WebSocket open, authenticate once at admission, and
//! subscribe to rooms (one per band, one per rehearsal). After the
//! scheduling application commits a mutation it publishes an event to the
//! affected room and every connection currently in that room receives it.
//! Nothing is persisted: offline clients simply miss events.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)          Scheduling app (in-process / HTTP)
//!     │                              │
//!     ├── WS Handler (ws/)           ├── REST Handlers (api/)
//!     │   └── ConnectionSession      │
//!     │                              │
//!     └──────── RealtimeService (service/) ────────┘
//!                   │
//!     ├── ConnectionRegistry ── TokenVerifier (auth/)
//!     ├── RoomTable ─────────── JoinPolicy (auth/)
//!     └── Dispatcher
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod router;
pub mod service;
pub mod ws;
