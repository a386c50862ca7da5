//! Domain layer: identifiers, events, and the broadcast core.
//!
//! This module contains the server-side model of the real-time core: the
//! connection registry that owns connection lifecycle, the room table that
//! tracks membership, and the dispatcher that fans events out to room
//! members. Each is an explicit object handed around by `Arc`; there is no
//! process-wide state.

pub mod connection;
pub mod connection_id;
pub mod connection_registry;
pub mod dispatcher;
pub mod identity;
pub mod room_event;
pub mod room_id;
pub mod room_table;

pub use connection::{Connection, Delivery, EventReceiver, EventSender};
pub use connection_id::ConnectionId;
pub use connection_registry::{Admission, ConnectionRegistry};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use identity::Identity;
pub use room_event::{EventKind, RoomEvent};
pub use room_id::{RoomId, RoomKind};
pub use room_table::{RoomSummary, RoomTable};
