//! Order identity and fill state.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fixed::{Price, Quantity};

/// Side of the order book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Side {
    /// Bid side (buyers).
    Buy = 0,
    /// Ask side (sellers).
    Sell = 1,
}

impl Side {
    /// Get the opposite side.
    #[inline(always)]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Unique order identifier, assigned by the engine starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of whoever submitted the order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct OwnerId(pub u64);

/// A resting or incoming limit order.
///
/// Identity fields never change after construction; only `filled_qty`
/// moves, and only upwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub price: Price,
    pub original_qty: Quantity,
    filled_qty: Quantity,
    /// Command sequence number at acceptance. Lower matches first.
    pub sequence: u64,
    pub owner: OwnerId,
}

impl Order {
    /// Create a new, unfilled order.
    ///
    /// Fails with `InvalidOrder` for a zero price or zero quantity.
    pub fn new(
        id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
        owner: OwnerId,
        sequence: u64,
    ) -> Result<Self> {
        if price.is_zero() || quantity.is_zero() {
            return Err(Error::InvalidOrder { price, quantity });
        }
        Ok(Self {
            id,
            side,
            price,
            original_qty: quantity,
            filled_qty: Quantity::ZERO,
            sequence,
            owner,
        })
    }

    /// Quantity still open.
    #[inline(always)]
    pub const fn remaining(&self) -> Quantity {
        Quantity(self.original_qty.0 - self.filled_qty.0)
    }

    #[inline(always)]
    pub const fn filled_qty(&self) -> Quantity {
        self.filled_qty
    }

    #[inline(always)]
    pub const fn is_filled(&self) -> bool {
        self.filled_qty.0 == self.original_qty.0
    }

    /// Record an execution of `qty` against this order.
    ///
    /// Leaves the order untouched and returns `OverFill` if the fill would
    /// take it past its original quantity.
    pub fn apply_fill(&mut self, qty: Quantity) -> Result<()> {
        match self.filled_qty.checked_add(qty) {
            Some(filled) if filled <= self.original_qty => {
                self.filled_qty = filled;
                Ok(())
            }
            _ => Err(Error::OverFill {
                order_id: self.id,
                filled: self.filled_qty,
                fill: qty,
                original: self.original_qty,
            }),
        }
    }

    /// Whether this order is willing to trade against a resting `price`.
    #[inline(always)]
    pub fn crosses(&self, price: Price) -> bool {
        match self.side {
            // Buy crosses if >= best ask
            Side::Buy => self.price >= price,
            // Sell crosses if <= best bid
            Side::Sell => self.price <= price,
        }
    }
}
