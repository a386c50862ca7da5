//! Service layer: business logic orchestration.
//!
//! [`RealtimeService`] wires the connection registry, the room table, and
//! the dispatcher together and is what both the transport layer and the
//! scheduling application talk to.

pub mod realtime_service;

pub use realtime_service::RealtimeService;
