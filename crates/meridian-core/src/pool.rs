//! Arena of resting orders.
//!
//! Every resting order lives in exactly one slot together with its FIFO
//! links. Price levels and the id index refer to slots through
//! generation-checked handles, so a handle to a removed order can never
//! alias whatever later reuses the slot. Uses a LIFO free list for better
//! cache locality on recently released slots.

use crate::order::Order;

/// Index into the order pool plus the generation it was issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OrderHandle {
    index: u32,
    generation: u32,
}

impl OrderHandle {
    #[inline(always)]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Get raw slot index.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    #[inline(always)]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// An order plus its position in its price level's queue.
#[derive(Clone, Copy, Debug)]
pub struct OrderNode {
    pub order: Order,
    /// Towards the head (older orders).
    pub(crate) prev: Option<OrderHandle>,
    /// Towards the tail (newer orders).
    pub(crate) next: Option<OrderHandle>,
}

impl OrderNode {
    #[inline(always)]
    pub fn prev(&self) -> Option<OrderHandle> {
        self.prev
    }

    #[inline(always)]
    pub fn next(&self) -> Option<OrderHandle> {
        self.next
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<OrderNode>,
}

/// Bounded pool of order slots.
///
/// Slots are created lazily up to `capacity` and recycled afterwards.
#[derive(Debug)]
pub struct OrderPool {
    slots: Vec<Slot>,
    /// LIFO free list for O(1) alloc/dealloc.
    free_list: Vec<u32>,
    capacity: usize,
    active: usize,
}

impl OrderPool {
    /// Largest supported capacity; slot indices are `u32`.
    pub const MAX_CAPACITY: usize = u32::MAX as usize;

    /// Create a pool holding at most `capacity` orders.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(Self::MAX_CAPACITY);
        Self {
            slots: Vec::with_capacity(capacity.min(1 << 16)),
            free_list: Vec::new(),
            capacity,
            active: 0,
        }
    }

    /// Store an order as a new tail node linked after `prev`.
    ///
    /// Returns `None` if the pool is exhausted. The caller is responsible
    /// for pointing `prev.next` at the returned handle.
    pub fn insert(&mut self, order: Order, prev: Option<OrderHandle>) -> Option<OrderHandle> {
        let node = OrderNode { order, prev, next: None };

        let handle = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.node.is_none(), "free slot still occupied");
            slot.node = Some(node);
            OrderHandle::new(index, slot.generation)
        } else if self.slots.len() < self.capacity {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            OrderHandle::new(index, 0)
        } else {
            return None;
        };

        self.active += 1;
        Some(handle)
    }

    /// Release a slot, returning its node.
    ///
    /// Returns `None` for a stale handle. The slot's generation is bumped so
    /// every outstanding copy of `handle` becomes stale.
    pub fn remove(&mut self, handle: OrderHandle) -> Option<OrderNode> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.active -= 1;
        Some(node)
    }

    /// Look up a live node.
    #[inline]
    pub fn get(&self, handle: OrderHandle) -> Option<&OrderNode> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    /// Look up a live node mutably.
    #[inline]
    pub fn get_mut(&mut self, handle: OrderHandle) -> Option<&mut OrderNode> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    #[inline(always)]
    pub fn contains(&self, handle: OrderHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of free slots.
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.capacity - self.active
    }

    /// Number of live orders.
    #[inline(always)]
    pub fn active(&self) -> usize {
        self.active
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.active == self.capacity
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.active == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{Price, Quantity};
    use crate::order::{OrderId, OwnerId, Side};

    fn order(id: u64) -> Order {
        Order::new(OrderId(id), Side::Buy, Price(100), Quantity(1000), OwnerId(1), id).unwrap()
    }

    #[test]
    fn test_pool_insert_remove() {
        let mut pool = OrderPool::with_capacity(16);
        assert_eq!(pool.capacity(), 16);
        assert_eq!(pool.available(), 16);

        let h1 = pool.insert(order(1), None).unwrap();
        let h2 = pool.insert(order(2), Some(h1)).unwrap();
        assert_eq!(pool.active(), 2);
        assert_eq!(pool.get(h2).unwrap().prev(), Some(h1));

        let node = pool.remove(h1).unwrap();
        assert_eq!(node.order.id, OrderId(1));
        assert_eq!(pool.available(), 15);

        // LIFO: next insert reuses h1's slot under a new generation
        let h3 = pool.insert(order(3), None).unwrap();
        assert_eq!(h3.index(), h1.index());
        assert_ne!(h3.generation(), h1.generation());
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut pool = OrderPool::with_capacity(4);
        let h1 = pool.insert(order(1), None).unwrap();
        assert!(pool.remove(h1).is_some());
        assert!(pool.remove(h1).is_none());

        let _h2 = pool.insert(order(2), None).unwrap();
        assert!(pool.get(h1).is_none());
        assert!(pool.remove(h1).is_none());
        assert_eq!(pool.active(), 1);
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut pool = OrderPool::with_capacity(4);
        for id in 1..=4 {
            assert!(pool.insert(order(id), None).is_some());
        }

        assert!(pool.is_full());
        assert!(pool.insert(order(5), None).is_none());
    }
}
