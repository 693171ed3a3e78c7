//! Price level queue management.
//!
//! A price level contains all orders at a specific price, organized as a
//! FIFO queue (price-time priority). The queue is an intrusive doubly-linked
//! list threaded through the order pool: the level keeps head and tail
//! handles, each node keeps its neighbours. Push to tail, pop from head and
//! removal from the middle are all O(1).

use crate::error::{Error, Result};
use crate::fixed::{Price, Quantity};
use crate::order::{Order, Side};
use crate::pool::{OrderHandle, OrderPool};

/// A single price level in the order book.
#[derive(Debug)]
pub struct PriceLevel {
    side: Side,
    price: Price,
    /// Sum of the remaining quantity of every order in the queue.
    total_qty: Quantity,
    order_count: usize,
    /// Oldest order (next to match).
    head: Option<OrderHandle>,
    /// Newest order.
    tail: Option<OrderHandle>,
}

impl PriceLevel {
    /// Create a new empty price level.
    pub fn new(side: Side, price: Price) -> Self {
        Self {
            side,
            price,
            total_qty: Quantity::ZERO,
            order_count: 0,
            head: None,
            tail: None,
        }
    }

    #[inline(always)]
    pub fn price(&self) -> Price {
        self.price
    }

    #[inline(always)]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Number of orders at this level.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.order_count
    }

    /// Aggregate remaining quantity.
    #[inline(always)]
    pub fn total_qty(&self) -> Quantity {
        self.total_qty
    }

    /// Add order to back of queue.
    ///
    /// The order must carry this level's side and price.
    pub fn append(&mut self, pool: &mut OrderPool, order: Order) -> Result<OrderHandle> {
        debug_assert!(order.side == self.side && order.price == self.price);

        let qty = order.remaining();
        let handle = pool
            .insert(order, self.tail)
            .ok_or(Error::CapacityExhausted { capacity: pool.capacity() })?;

        match self.tail.and_then(|tail| pool.get_mut(tail)) {
            Some(tail) => tail.next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.order_count += 1;
        self.total_qty = self.total_qty.saturating_add(qty);
        Ok(handle)
    }

    /// Unlink an order from anywhere in the queue and release its slot.
    ///
    /// Fails with `StaleHandle` if the handle is no longer live or does not
    /// belong to this level.
    pub fn remove(&mut self, pool: &mut OrderPool, handle: OrderHandle) -> Result<Order> {
        let node = pool
            .get(handle)
            .filter(|node| node.order.side == self.side && node.order.price == self.price)
            .copied()
            .ok_or(Error::StaleHandle(handle))?;

        match node.prev.and_then(|prev| pool.get_mut(prev)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|next| pool.get_mut(next)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }

        pool.remove(handle);
        self.order_count -= 1;
        self.total_qty = self.total_qty.saturating_sub(node.order.remaining());
        Ok(node.order)
    }

    /// Handle of the front order (next to match) without removing it.
    #[inline(always)]
    pub fn peek_front(&self) -> Option<OrderHandle> {
        self.head
    }

    /// The front order itself.
    #[inline]
    pub fn front<'p>(&self, pool: &'p OrderPool) -> Option<&'p Order> {
        self.head.and_then(|head| pool.get(head)).map(|node| &node.order)
    }

    /// Update total quantity after a partial fill of a queued order.
    #[inline(always)]
    pub fn reduce_qty(&mut self, qty: Quantity) {
        self.total_qty = self.total_qty.saturating_sub(qty);
    }

    /// Orders in matching order.
    pub fn iter<'a>(&self, pool: &'a OrderPool) -> PriceLevelIter<'a> {
        PriceLevelIter {
            pool,
            cursor: self.head,
            remaining: self.order_count,
        }
    }
}

/// Iterator over the orders of a price level, oldest first.
pub struct PriceLevelIter<'a> {
    pool: &'a OrderPool,
    cursor: Option<OrderHandle>,
    remaining: usize,
}

impl<'a> Iterator for PriceLevelIter<'a> {
    type Item = (OrderHandle, &'a Order);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let node = self.pool.get(handle)?;
        self.cursor = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((handle, &node.order))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderId, OwnerId};

    fn sell(id: u64, qty: u64) -> Order {
        Order::new(OrderId(id), Side::Sell, Price(100), Quantity(qty), OwnerId(1), id).unwrap()
    }

    fn ids(level: &PriceLevel, pool: &OrderPool) -> Vec<u64> {
        level.iter(pool).map(|(_, order)| order.id.0).collect()
    }

    #[test]
    fn test_level_append_fifo() {
        let mut pool = OrderPool::with_capacity(8);
        let mut level = PriceLevel::new(Side::Sell, Price(100));
        assert!(level.is_empty());

        level.append(&mut pool, sell(1, 100)).unwrap();
        level.append(&mut pool, sell(2, 200)).unwrap();
        level.append(&mut pool, sell(3, 300)).unwrap();

        assert_eq!(level.len(), 3);
        assert_eq!(level.total_qty(), Quantity(600));
        assert_eq!(level.front(&pool).unwrap().id, OrderId(1));
        assert_eq!(ids(&level, &pool), vec![1, 2, 3]);
    }

    #[test]
    fn test_level_remove_middle_head_tail() {
        let mut pool = OrderPool::with_capacity(8);
        let mut level = PriceLevel::new(Side::Sell, Price(100));

        let h1 = level.append(&mut pool, sell(1, 10)).unwrap();
        let h2 = level.append(&mut pool, sell(2, 20)).unwrap();
        let h3 = level.append(&mut pool, sell(3, 30)).unwrap();
        let h4 = level.append(&mut pool, sell(4, 40)).unwrap();

        assert_eq!(level.remove(&mut pool, h2).unwrap().id, OrderId(2));
        assert_eq!(ids(&level, &pool), vec![1, 3, 4]);

        level.remove(&mut pool, h1).unwrap();
        assert_eq!(level.peek_front(), Some(h3));
        assert_eq!(ids(&level, &pool), vec![3, 4]);

        level.remove(&mut pool, h4).unwrap();
        assert_eq!(ids(&level, &pool), vec![3]);
        assert_eq!(level.total_qty(), Quantity(30));

        // Appending after a tail removal links behind the new tail
        level.append(&mut pool, sell(5, 50)).unwrap();
        assert_eq!(ids(&level, &pool), vec![3, 5]);

        level.remove(&mut pool, h3).unwrap();
        assert_eq!(ids(&level, &pool), vec![5]);
        assert_eq!(pool.active(), 1);
    }

    #[test]
    fn test_level_remove_stale_handle() {
        let mut pool = OrderPool::with_capacity(8);
        let mut level = PriceLevel::new(Side::Sell, Price(100));

        let h1 = level.append(&mut pool, sell(1, 10)).unwrap();
        level.remove(&mut pool, h1).unwrap();

        assert_eq!(level.remove(&mut pool, h1), Err(Error::StaleHandle(h1)));
        assert!(level.is_empty());
        assert_eq!(level.peek_front(), None);
    }

    #[test]
    fn test_level_rejects_foreign_handle() {
        let mut pool = OrderPool::with_capacity(8);
        let mut level_100 = PriceLevel::new(Side::Sell, Price(100));
        let mut level_101 = PriceLevel::new(Side::Sell, Price(101));

        let h1 = level_100.append(&mut pool, sell(1, 10)).unwrap();
        let other = Order::new(OrderId(2), Side::Sell, Price(101), Quantity(5), OwnerId(1), 2).unwrap();
        level_101.append(&mut pool, other).unwrap();

        assert!(level_101.remove(&mut pool, h1).unwrap_err().is_not_found());
        assert_eq!(level_100.len(), 1);
    }

    #[test]
    fn test_level_capacity_exhausted() {
        let mut pool = OrderPool::with_capacity(1);
        let mut level = PriceLevel::new(Side::Sell, Price(100));

        level.append(&mut pool, sell(1, 10)).unwrap();
        assert_eq!(
            level.append(&mut pool, sell(2, 10)),
            Err(Error::CapacityExhausted { capacity: 1 })
        );
        assert_eq!(level.len(), 1);
        assert_eq!(level.total_qty(), Quantity(10));
    }

    #[test]
    fn test_level_reduce_qty() {
        let mut pool = OrderPool::with_capacity(2);
        let mut level = PriceLevel::new(Side::Sell, Price(100));
        let handle = level.append(&mut pool, sell(1, 10)).unwrap();

        pool.get_mut(handle).unwrap().order.apply_fill(Quantity(4)).unwrap();
        level.reduce_qty(Quantity(4));
        assert_eq!(level.total_qty(), Quantity(6));

        // Removal subtracts what is still open, not the original size
        level.remove(&mut pool, handle).unwrap();
        assert_eq!(level.total_qty(), Quantity::ZERO);
    }
}
