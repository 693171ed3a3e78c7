//! Matching engine façade.
//!
//! Commands are applied one at a time in arrival order; that order alone
//! determines ids, sequence numbers and trades. Events produced by a
//! command are staged and handed to the sink only once the command has
//! fully applied, so a failed command emits nothing.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::book::{OrderBook, Trade};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventSink, FillKind};
use crate::fixed::{Price, Quantity};
use crate::order::{Order, OrderId, OwnerId, Side};
use crate::snapshot::{DepthSnapshot, QuotePublisher, QuoteReader, TopOfBook};

/// Request to place a limit order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub owner: OwnerId,
}

/// Input to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    NewOrder(NewOrder),
    Cancel { order_id: OrderId },
}

impl Command {
    pub fn buy(price: u64, quantity: u64, owner: u64) -> Self {
        Command::NewOrder(NewOrder {
            side: Side::Buy,
            price: Price(price),
            quantity: Quantity(quantity),
            owner: OwnerId(owner),
        })
    }

    pub fn sell(price: u64, quantity: u64, owner: u64) -> Self {
        Command::NewOrder(NewOrder {
            side: Side::Sell,
            price: Price(price),
            quantity: Quantity(quantity),
            owner: OwnerId(owner),
        })
    }

    pub fn cancel(order_id: u64) -> Self {
        Command::Cancel { order_id: OrderId(order_id) }
    }
}

/// Result of a new order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitReport {
    pub order_id: OrderId,
    pub trades: Vec<Trade>,
    /// Set when a remainder was left on the book.
    pub resting_order_id: Option<OrderId>,
    /// Remaining resting quantity (zero when fully filled).
    pub remaining: Quantity,
}

/// Result of a successful cancel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancelReport {
    pub order_id: OrderId,
    /// Quantity that was still open when the order was pulled.
    pub remaining: Quantity,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Submitted(SubmitReport),
    Cancelled(CancelReport),
}

/// The matching engine.
///
/// Owns the book, the id and sequence counters and the event sink.
/// Counters start fresh with every engine and never go backwards.
pub struct MatchingEngine<S: EventSink = Vec<Event>> {
    book: OrderBook,
    sink: S,
    quotes: QuotePublisher,
    config: EngineConfig,
    /// Next order id to hand out.
    next_order_id: u64,
    /// Sequence of the last applied command.
    sequence: u64,
    /// Sequence of the last emitted event.
    event_sequence: u64,
    /// Events of the command in progress.
    staged: Vec<Event>,
}

impl MatchingEngine<Vec<Event>> {
    /// Engine collecting its events in memory.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_sink(config, Vec::new())
    }
}

impl<S: EventSink> MatchingEngine<S> {
    pub fn with_sink(config: EngineConfig, sink: S) -> Self {
        let book = OrderBook::with_capacity(config.capacity);
        let quotes = QuotePublisher::new();
        quotes.publish(TopOfBook::capture(&book, 0));
        Self {
            book,
            sink,
            quotes,
            config,
            next_order_id: 1,
            sequence: 0,
            event_sequence: 0,
            staged: Vec::with_capacity(16),
        }
    }

    /// Apply one command.
    pub fn execute(&mut self, command: Command) -> Result<Outcome> {
        match command {
            Command::NewOrder(new) => self
                .submit_order(new.side, new.price, new.quantity, new.owner)
                .map(Outcome::Submitted),
            Command::Cancel { order_id } => self.cancel_order(order_id).map(Outcome::Cancelled),
        }
    }

    /// Validate, match and possibly rest a new limit order.
    pub fn submit_order(
        &mut self,
        side: Side,
        price: Price,
        quantity: Quantity,
        owner: OwnerId,
    ) -> Result<SubmitReport> {
        let order_id = OrderId(self.next_order_id);
        let sequence = self.sequence + 1;
        let order = match Order::new(order_id, side, price, quantity, owner, sequence) {
            Ok(order) => order,
            Err(err) => return Err(self.abort(err)),
        };

        self.stage(EventKind::OrderAccepted { order_id, side, price, quantity, owner });
        let result = match self.book.submit(order) {
            Ok(result) => result,
            Err(err) => return Err(self.abort(err)),
        };

        for trade in &result.trades {
            self.stage(EventKind::Trade(*trade));
            self.stage(EventKind::OrderFilled {
                order_id: trade.maker_order_id,
                quantity: trade.quantity,
                remaining: trade.maker_remaining,
                kind: fill_kind(trade.maker_remaining),
            });
            self.stage(EventKind::OrderFilled {
                order_id: trade.taker_order_id,
                quantity: trade.quantity,
                remaining: trade.taker_remaining,
                kind: fill_kind(trade.taker_remaining),
            });
        }
        let resting_order_id = result.resting.map(|_| order_id);
        if resting_order_id.is_some() {
            self.stage(EventKind::OrderRested { order_id, side, price, remaining: result.remaining });
        }

        self.next_order_id += 1;
        self.commit(sequence);
        debug!(order_id = %order_id, sequence, trades = result.trades.len(),
            remaining = %result.remaining, "order processed");

        Ok(SubmitReport {
            order_id,
            trades: result.trades,
            resting_order_id,
            remaining: result.remaining,
        })
    }

    /// Pull a resting order. Unknown or already removed ids fail with `NotFound`.
    pub fn cancel_order(&mut self, order_id: OrderId) -> Result<CancelReport> {
        let order = match self.book.cancel(order_id) {
            Ok(order) => order,
            Err(err) => return Err(self.abort(err)),
        };

        let remaining = order.remaining();
        self.stage(EventKind::OrderCancelled { order_id, remaining });
        self.commit(self.sequence + 1);
        Ok(CancelReport { order_id, remaining })
    }

    fn stage(&mut self, kind: EventKind) {
        let sequence = self.event_sequence + self.staged.len() as u64 + 1;
        self.staged.push(Event { sequence, kind });
    }

    /// Close out a successful command: flush events, publish the quote.
    fn commit(&mut self, sequence: u64) {
        self.sequence = sequence;
        self.event_sequence += self.staged.len() as u64;
        for event in self.staged.drain(..) {
            self.sink.publish(event);
        }
        self.quotes.publish(TopOfBook::capture(&self.book, sequence));
    }

    /// Drop the staged events of a failed command and hand the error back.
    fn abort(&mut self, err: Error) -> Error {
        self.staged.clear();
        if err.is_fatal() {
            error!(error = %err, sequence = self.sequence, "command aborted on broken invariant");
        } else {
            warn!(error = %err, "command rejected");
        }
        err
    }

    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        self.book.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        self.book.best_ask()
    }

    /// Top `levels` aggregated levels per side.
    pub fn depth_snapshot(&self, levels: usize) -> DepthSnapshot {
        DepthSnapshot {
            sequence: self.sequence,
            bids: self.book.depth(Side::Buy, levels),
            asks: self.book.depth(Side::Sell, levels),
        }
    }

    /// Depth snapshot with the configured number of levels.
    pub fn depth(&self) -> DepthSnapshot {
        self.depth_snapshot(self.config.depth_levels)
    }

    pub fn top_of_book(&self) -> TopOfBook {
        TopOfBook::capture(&self.book, self.sequence)
    }

    /// Reader of the quote published after every command.
    pub fn quote_reader(&self) -> QuoteReader {
        self.quotes.reader()
    }

    #[inline]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Sequence of the last applied command.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Sequence of the last emitted event.
    #[inline]
    pub fn event_sequence(&self) -> u64 {
        self.event_sequence
    }

    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[inline]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// (active orders, pool capacity).
    pub fn pool_stats(&self) -> (usize, usize) {
        self.book.pool_stats()
    }
}

#[inline]
fn fill_kind(remaining: Quantity) -> FillKind {
    if remaining.is_zero() { FillKind::Full } else { FillKind::Partial }
}
