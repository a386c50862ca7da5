//! Room-scoped event fan-out.
//!
//! [`Dispatcher`] delivers a [`RoomEvent`] to every current member of its
//! target room. Each member has its own bounded outbound queue and the
//! dispatcher only ever uses a non-blocking enqueue: a full or closing queue
//! costs that member the event and nothing else.
//!
//! Enqueueing happens under the target room's lock, so two publishes to the
//! same room reach every member's queue in publish order. Publishes to
//! different rooms take different locks and are not ordered with respect to
//! each other.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::{Delivery, RoomEvent, RoomTable};

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DispatchReport {
    /// Members whose queue accepted the event.
    pub delivered: usize,
    /// Members that were skipped (queue full or connection tearing down).
    pub dropped: usize,
}

/// Fans events out to room members.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    rooms: Arc<RoomTable>,
}

impl Dispatcher {
    /// Creates a dispatcher reading membership from `rooms`.
    #[must_use]
    pub fn new(rooms: Arc<RoomTable>) -> Self {
        Self { rooms }
    }

    /// Publishes `event` to every current member of `event.room`.
    ///
    /// Publishing to a room with no members is not an error; the report is
    /// simply empty.
    pub async fn publish(&self, event: RoomEvent) -> DispatchReport {
        let event = Arc::new(event);
        let mut report = DispatchReport::default();
        let room = &event.room;

        self.rooms
            .for_each_member(room, |member| match member.try_deliver(&event) {
                Delivery::Queued => report.delivered += 1,
                Delivery::Full => {
                    report.dropped += 1;
                    tracing::warn!(
                        connection_id = %member.id(),
                        %room,
                        event = event.kind.as_str(),
                        "outbound queue full, event dropped"
                    );
                }
                Delivery::Closed => {
                    report.dropped += 1;
                    tracing::debug!(
                        connection_id = %member.id(),
                        %room,
                        "member closing, event dropped"
                    );
                }
            })
            .await;

        tracing::debug!(
            %room,
            event = event.kind.as_str(),
            delivered = report.delivered,
            dropped = report.dropped,
            "event published"
        );
        report
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::AllowAll;
    use crate::domain::{Connection, EventKind, EventReceiver, Identity, RoomId};

    fn room(s: &str) -> RoomId {
        let Ok(room) = s.parse() else {
            panic!("valid room id {s}");
        };
        room
    }

    fn setup() -> (Arc<RoomTable>, Dispatcher) {
        let table = Arc::new(RoomTable::new(Arc::new(AllowAll)));
        let dispatcher = Dispatcher::new(Arc::clone(&table));
        (table, dispatcher)
    }

    fn event(target: &str, seq: u64) -> RoomEvent {
        RoomEvent::new(
            room(target),
            EventKind::AvailabilityUpdated,
            serde_json::json!({ "seq": seq }),
        )
    }

    fn drain(rx: &mut EventReceiver) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event.data.clone());
        }
        out
    }

    #[tokio::test]
    async fn publish_to_empty_room_reports_nothing() {
        let (_table, dispatcher) = setup();
        let report = dispatcher.publish(event("band-1", 0)).await;
        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn per_room_order_is_preserved_for_each_member() {
        let (table, dispatcher) = setup();
        let (a, mut ra) = Connection::new(Identity::new("u1"), 16);
        let (b, mut rb) = Connection::new(Identity::new("u2"), 16);
        let _ = table.join(&a, &room("rehearsal-7")).await;
        let _ = table.join(&b, &room("rehearsal-7")).await;

        for seq in 1..=3 {
            let report = dispatcher.publish(event("rehearsal-7", seq)).await;
            assert_eq!(report.delivered, 2);
        }

        let expected: Vec<serde_json::Value> =
            (1..=3).map(|seq| serde_json::json!({ "seq": seq })).collect();
        assert_eq!(drain(&mut ra), expected);
        assert_eq!(drain(&mut rb), expected);
    }

    #[tokio::test]
    async fn full_member_does_not_block_others() {
        let (table, dispatcher) = setup();
        let (slow, mut slow_rx) = Connection::new(Identity::new("slow"), 1);
        let (fast, mut fast_rx) = Connection::new(Identity::new("fast"), 16);
        let _ = table.join(&slow, &room("band-5")).await;
        let _ = table.join(&fast, &room("band-5")).await;

        let first = dispatcher.publish(event("band-5", 1)).await;
        let second = dispatcher.publish(event("band-5", 2)).await;
        assert_eq!(first.delivered, 2);
        assert_eq!(second, DispatchReport { delivered: 1, dropped: 1 });

        assert_eq!(drain(&mut slow_rx).len(), 1);
        assert_eq!(drain(&mut fast_rx).len(), 2);
    }

    #[tokio::test]
    async fn members_of_other_rooms_receive_nothing() {
        let (table, dispatcher) = setup();
        let (a, mut ra) = Connection::new(Identity::new("u1"), 4);
        let (b, mut rb) = Connection::new(Identity::new("u2"), 4);
        let _ = table.join(&a, &room("rehearsal-7")).await;
        let _ = table.join(&b, &room("rehearsal-9")).await;

        dispatcher.publish(event("rehearsal-7", 1)).await;
        assert_eq!(drain(&mut ra).len(), 1);
        assert!(drain(&mut rb).is_empty());
    }
}
