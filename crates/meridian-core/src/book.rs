//! Order book data structures and the price-time matching loop.
//!
//! Each side keeps its price levels in an ordered map, so the best level is
//! the first (asks) or last (bids) key: O(log n) to find, insert or drop a
//! level. Orders are located by id through a hash index of pool handles,
//! which makes cancellation O(1) once the level is found.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::fixed::{Price, Quantity};
use crate::level::PriceLevel;
use crate::order::{Order, OrderId, Side};
use crate::pool::{OrderHandle, OrderPool};
use crate::snapshot::DepthLevel;

/// One side of the order book (Bids or Asks).
#[derive(Debug)]
pub struct BookSide {
    side: Side,
    levels: BTreeMap<Price, PriceLevel>,
    /// Total order count on this side.
    order_count: usize,
    /// Total remaining quantity on this side.
    total_qty: Quantity,
}

impl BookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            order_count: 0,
            total_qty: Quantity::ZERO,
        }
    }

    #[inline(always)]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Get the best price level (highest bid or lowest ask).
    #[inline]
    pub fn best_level(&self) -> Option<&PriceLevel> {
        match self.side {
            Side::Buy => self.levels.values().next_back(),
            Side::Sell => self.levels.values().next(),
        }
    }

    #[inline]
    pub fn best_price(&self) -> Option<Price> {
        self.best_level().map(PriceLevel::price)
    }

    /// Check if an incoming order at `price` would cross the best resting price.
    #[inline]
    pub fn would_match(&self, price: Price, incoming_side: Side) -> bool {
        match self.best_price() {
            Some(best) => match incoming_side {
                Side::Buy => price >= best,
                Side::Sell => price <= best,
            },
            None => false,
        }
    }

    /// Level at an exact price.
    #[inline]
    pub fn level(&self, price: Price) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    /// Levels from best to worst.
    pub fn levels(&self) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match self.side {
            Side::Buy => Box::new(self.levels.values().rev()),
            Side::Sell => Box::new(self.levels.values()),
        }
    }

    /// Up to `max_levels` aggregated levels, best first.
    pub fn depth(&self, max_levels: usize) -> Vec<DepthLevel> {
        self.levels()
            .take(max_levels)
            .map(|level| DepthLevel {
                price: level.price(),
                quantity: level.total_qty(),
                order_count: level.len(),
            })
            .collect()
    }

    /// Add order to the tail of its price level, creating the level if absent.
    pub fn add_order(&mut self, pool: &mut OrderPool, order: Order) -> Result<OrderHandle> {
        debug_assert_eq!(order.side, self.side);

        let qty = order.remaining();
        let level = self
            .levels
            .entry(order.price)
            .or_insert_with(|| PriceLevel::new(order.side, order.price));

        match level.append(pool, order) {
            Ok(handle) => {
                self.order_count += 1;
                self.total_qty = self.total_qty.saturating_add(qty);
                Ok(handle)
            }
            Err(err) => {
                if level.is_empty() {
                    self.levels.remove(&order.price);
                }
                Err(err)
            }
        }
    }

    /// Remove an order from its level, dropping the level once it empties.
    pub fn remove_order(&mut self, pool: &mut OrderPool, handle: OrderHandle) -> Result<Order> {
        let price = pool
            .get(handle)
            .filter(|node| node.order.side == self.side)
            .map(|node| node.order.price)
            .ok_or(Error::StaleHandle(handle))?;
        let level = self
            .levels
            .get_mut(&price)
            .ok_or(Error::StaleHandle(handle))?;

        let order = level.remove(pool, handle)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }

        self.order_count -= 1;
        self.total_qty = self.total_qty.saturating_sub(order.remaining());
        Ok(order)
    }

    /// Account for a fill against an order resting at `price`.
    #[inline]
    fn reduce_qty(&mut self, price: Price, qty: Quantity) {
        if let Some(level) = self.levels.get_mut(&price) {
            level.reduce_qty(qty);
        }
        self.total_qty = self.total_qty.saturating_sub(qty);
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[inline(always)]
    pub fn order_count(&self) -> usize {
        self.order_count
    }

    #[inline(always)]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    #[inline(always)]
    pub fn total_qty(&self) -> Quantity {
        self.total_qty
    }
}

/// Execution between a resting (maker) and an incoming (taker) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Monotonic per book, starting at 1.
    pub trade_id: u64,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub maker_side: Side,
    /// Always the maker's price.
    pub price: Price,
    pub quantity: Quantity,
    /// Maker quantity still open after this trade.
    pub maker_remaining: Quantity,
    /// Taker quantity still open after this trade.
    pub taker_remaining: Quantity,
}

/// Outcome of `OrderBook::submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Trades in execution order.
    pub trades: Vec<Trade>,
    /// Where the remainder rests, if any.
    pub resting: Option<OrderHandle>,
    /// Quantity left resting on the book (zero when fully filled).
    pub remaining: Quantity,
}

impl MatchResult {
    #[inline]
    pub fn is_filled(&self) -> bool {
        self.resting.is_none()
    }

    pub fn filled_qty(&self) -> Quantity {
        self.trades
            .iter()
            .fold(Quantity::ZERO, |acc, trade| acc.saturating_add(trade.quantity))
    }
}

/// The complete order book for a single instrument.
#[derive(Debug)]
pub struct OrderBook {
    bids: BookSide,
    asks: BookSide,
    /// Owns every resting order.
    pool: OrderPool,
    /// Non-owning lookup from id to pool slot.
    index: HashMap<OrderId, OrderHandle>,
    next_trade_id: u64,
}

impl OrderBook {
    /// Create an empty book able to hold `capacity` resting orders.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bids: BookSide::new(Side::Buy),
            asks: BookSide::new(Side::Sell),
            pool: OrderPool::with_capacity(capacity),
            index: HashMap::with_capacity(capacity.min(1 << 16)),
            next_trade_id: 0,
        }
    }

    /// Match an incoming order and rest whatever is left of it.
    ///
    /// Duplicate ids, and non-crossing orders on a full pool, are rejected
    /// before the book is touched.
    pub fn submit(&mut self, mut order: Order) -> Result<MatchResult> {
        if self.index.contains_key(&order.id) {
            return Err(Error::DuplicateOrder(order.id));
        }
        // Matching only ever frees slots. A crossing order that leaves a
        // remainder has fully filled at least one maker, so only an order
        // that would rest untouched needs a free slot up front.
        let crosses = self.side(order.side.opposite()).would_match(order.price, order.side);
        if self.pool.is_full() && !crosses {
            return Err(Error::CapacityExhausted { capacity: self.pool.capacity() });
        }

        let mut trades = Vec::new();
        self.match_order(&mut order, &mut trades)?;

        if order.is_filled() {
            return Ok(MatchResult { trades, resting: None, remaining: Quantity::ZERO });
        }

        let side = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let handle = side.add_order(&mut self.pool, order)?;
        self.index.insert(order.id, handle);
        debug!(order_id = %order.id, side = ?order.side, price = %order.price,
            remaining = %order.remaining(), "order rested");

        Ok(MatchResult { trades, resting: Some(handle), remaining: order.remaining() })
    }

    /// Core matching loop.
    fn match_order(&mut self, taker: &mut Order, trades: &mut Vec<Trade>) -> Result<()> {
        let maker_side = taker.side.opposite();

        while !taker.is_filled() {
            let book = match maker_side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };

            let (best_price, maker_handle) = match book.best_level() {
                Some(level) => (level.price(), level.peek_front()),
                None => break, // No liquidity
            };
            if !taker.crosses(best_price) {
                break;
            }
            let maker_handle = match maker_handle {
                Some(handle) => handle,
                None => {
                    debug_assert!(false, "empty level left in book at {best_price}");
                    book.levels.remove(&best_price);
                    continue;
                }
            };

            let maker = &mut self
                .pool
                .get_mut(maker_handle)
                .ok_or(Error::StaleHandle(maker_handle))?
                .order;
            let qty = taker.remaining().min(maker.remaining());
            fill_pair(maker, taker, qty)?;
            let maker = *maker;

            book.reduce_qty(best_price, qty);
            if maker.is_filled() {
                book.remove_order(&mut self.pool, maker_handle)?;
                self.index.remove(&maker.id);
            }

            self.next_trade_id += 1;
            let (buy_order_id, sell_order_id) = match maker.side {
                Side::Buy => (maker.id, taker.id),
                Side::Sell => (taker.id, maker.id),
            };
            let trade = Trade {
                trade_id: self.next_trade_id,
                buy_order_id,
                sell_order_id,
                maker_order_id: maker.id,
                taker_order_id: taker.id,
                maker_side: maker.side,
                price: best_price,
                quantity: qty,
                maker_remaining: maker.remaining(),
                taker_remaining: taker.remaining(),
            };
            trace!(trade_id = trade.trade_id, maker = %maker.id, taker = %taker.id,
                price = %best_price, qty = %qty, "fill");
            trades.push(trade);
        }

        Ok(())
    }

    /// Remove a resting order by id.
    ///
    /// A second cancel of the same id fails with `NotFound`.
    pub fn cancel(&mut self, order_id: OrderId) -> Result<Order> {
        let handle = *self.index.get(&order_id).ok_or(Error::NotFound(order_id))?;
        let side = self
            .pool
            .get(handle)
            .map(|node| node.order.side)
            .ok_or(Error::StaleHandle(handle))?;

        let book = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let order = book.remove_order(&mut self.pool, handle)?;
        self.index.remove(&order_id);
        debug!(order_id = %order_id, remaining = %order.remaining(), "order cancelled");
        Ok(order)
    }

    /// Look up a resting order.
    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        let handle = self.index.get(&order_id)?;
        self.pool.get(*handle).map(|node| &node.order)
    }

    #[inline]
    pub fn contains(&self, order_id: OrderId) -> bool {
        self.index.contains_key(&order_id)
    }

    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Get the spread (best ask - best bid).
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask.checked_sub(bid),
            _ => None,
        }
    }

    /// Get midpoint price, rounded down to a whole tick.
    pub fn midpoint(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(Price(bid.0 + (ask.0 - bid.0) / 2)),
            (Some(bid), None) => Some(bid),
            (None, Some(ask)) => Some(ask),
            (None, None) => None,
        }
    }

    #[inline]
    pub fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    #[inline]
    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    #[inline]
    pub fn asks(&self) -> &BookSide {
        &self.asks
    }

    /// Up to `max_levels` aggregated levels of one side, best first.
    pub fn depth(&self, side: Side, max_levels: usize) -> Vec<DepthLevel> {
        self.side(side).depth(max_levels)
    }

    /// Resting orders at one price, in matching order.
    pub fn orders_at(&self, side: Side, price: Price) -> Vec<Order> {
        self.side(side)
            .level(price)
            .map(|level| level.iter(&self.pool).map(|(_, order)| *order).collect())
            .unwrap_or_default()
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// (active orders, pool capacity).
    pub fn pool_stats(&self) -> (usize, usize) {
        (self.pool.active(), self.pool.capacity())
    }

    /// Full structural check: no-cross, index/level agreement and level
    /// aggregates. Linear in the size of the book; meant for tests and
    /// diagnostics.
    pub fn is_consistent(&self) -> bool {
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                return false;
            }
        }

        let mut seen = 0usize;
        for book in [&self.bids, &self.asks] {
            let mut side_orders = 0usize;
            let mut side_qty = Quantity::ZERO;
            for level in book.levels() {
                if level.is_empty() {
                    return false;
                }
                let mut level_qty = Quantity::ZERO;
                let mut count = 0usize;
                for (handle, order) in level.iter(&self.pool) {
                    if order.side != book.side()
                        || order.price != level.price()
                        || order.is_filled()
                        || self.index.get(&order.id) != Some(&handle)
                    {
                        return false;
                    }
                    level_qty = level_qty.saturating_add(order.remaining());
                    count += 1;
                }
                if count != level.len() || level_qty != level.total_qty() {
                    return false;
                }
                side_orders += count;
                side_qty = side_qty.saturating_add(level_qty);
            }
            if side_orders != book.order_count() || side_qty != book.total_qty() {
                return false;
            }
            seen += side_orders;
        }

        seen == self.index.len() && seen == self.pool.active()
    }
}

/// Apply `qty` to both sides of a trade, or to neither.
fn fill_pair(maker: &mut Order, taker: &mut Order, qty: Quantity) -> Result<()> {
    let mut filled_taker = *taker;
    filled_taker.apply_fill(qty)?;
    maker.apply_fill(qty)?;
    *taker = filled_taker;
    Ok(())
}
