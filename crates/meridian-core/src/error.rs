//! Error taxonomy for the matching core.

use thiserror::Error;

use crate::fixed::{Price, Quantity};
use crate::order::OrderId;
use crate::pool::OrderHandle;

/// Convenience alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Everything that can go wrong inside the book or the engine.
///
/// Every variant is raised before the book is mutated, except `OverFill`,
/// which marks a broken invariant and aborts the command in progress.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid order: price {price}, quantity {quantity} (both must be positive)")]
    InvalidOrder { price: Price, quantity: Quantity },

    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("stale order handle {0:?}")]
    StaleHandle(OrderHandle),

    #[error("order {0} is already on the book")]
    DuplicateOrder(OrderId),

    #[error("order pool exhausted ({capacity} slots)")]
    CapacityExhausted { capacity: usize },

    #[error("over-fill on order {order_id}: filled {filled} + {fill} > original {original}")]
    OverFill {
        order_id: OrderId,
        filled: Quantity,
        fill: Quantity,
        original: Quantity,
    },
}

impl Error {
    /// True for unknown ids and stale handles alike.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::StaleHandle(_))
    }

    /// True for internal invariant violations (bugs, not user errors).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::OverFill { .. })
    }
}
