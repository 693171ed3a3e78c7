//! Market data views of the book.
//!
//! The engine thread is the only writer. After every command it publishes
//! a `TopOfBook` into a shared cell; readers on other threads load the
//! latest value without ever blocking the writer.

use std::sync::Arc;

use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};

use crate::book::OrderBook;
use crate::fixed::{Price, Quantity};

/// One aggregated price level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    /// Sum of remaining quantity at this price.
    pub quantity: Quantity,
    pub order_count: usize,
}

/// Aggregated view of the top N levels of both sides, best first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// Command sequence the snapshot was taken after.
    pub sequence: u64,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

/// Best bid and ask with their aggregate sizes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopOfBook {
    pub sequence: u64,
    pub best_bid: Option<Price>,
    pub bid_qty: Quantity,
    pub best_ask: Option<Price>,
    pub ask_qty: Quantity,
}

impl TopOfBook {
    /// Capture the current top of `book`.
    pub fn capture(book: &OrderBook, sequence: u64) -> Self {
        let bid = book.bids().best_level();
        let ask = book.asks().best_level();
        Self {
            sequence,
            best_bid: bid.map(|level| level.price()),
            bid_qty: bid.map_or(Quantity::ZERO, |level| level.total_qty()),
            best_ask: ask.map(|level| level.price()),
            ask_qty: ask.map_or(Quantity::ZERO, |level| level.total_qty()),
        }
    }

    /// No-cross holds for this quote.
    pub fn is_uncrossed(&self) -> bool {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => bid < ask,
            _ => true,
        }
    }
}

/// Writer end of the published top-of-book.
#[derive(Debug, Default)]
pub struct QuotePublisher {
    cell: Arc<AtomicCell<TopOfBook>>,
}

impl QuotePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn publish(&self, quote: TopOfBook) {
        self.cell.store(quote);
    }

    /// A reader sharing this publisher's cell.
    pub fn reader(&self) -> QuoteReader {
        QuoteReader { cell: Arc::clone(&self.cell) }
    }
}

/// Cheap, cloneable reader of the latest published quote.
#[derive(Clone, Debug)]
pub struct QuoteReader {
    cell: Arc<AtomicCell<TopOfBook>>,
}

impl QuoteReader {
    #[inline]
    pub fn latest(&self) -> TopOfBook {
        self.cell.load()
    }
}
