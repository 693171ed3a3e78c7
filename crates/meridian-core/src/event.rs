//! Events emitted to downstream collaborators (journal, notifications).
//!
//! Every event carries an engine-wide sequence number with no gaps, so a
//! consumer can detect loss and replay deterministically.

use serde::{Deserialize, Serialize};

use crate::book::Trade;
use crate::fixed::{Price, Quantity};
use crate::order::{OrderId, OwnerId, Side};

/// Whether a fill completed the order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillKind {
    Partial,
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    /// A new order passed validation and entered matching.
    OrderAccepted {
        order_id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
        owner: OwnerId,
    },
    Trade(Trade),
    /// One side of a trade, reported per order.
    OrderFilled {
        order_id: OrderId,
        quantity: Quantity,
        remaining: Quantity,
        kind: FillKind,
    },
    /// The unmatched remainder of a new order was added to the book.
    OrderRested {
        order_id: OrderId,
        side: Side,
        price: Price,
        remaining: Quantity,
    },
    OrderCancelled {
        order_id: OrderId,
        remaining: Quantity,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub sequence: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Destination for engine events.
///
/// `publish` runs on the engine thread after a command has fully applied;
/// implementations must not block on I/O.
pub trait EventSink {
    fn publish(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    #[inline]
    fn publish(&mut self, event: Event) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    #[inline]
    fn publish(&mut self, event: Event) {
        (**self).publish(event);
    }
}

/// Drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    #[inline(always)]
    fn publish(&mut self, _event: Event) {}
}
