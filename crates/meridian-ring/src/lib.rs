//! Lock-free SPSC ring buffer (Disruptor pattern).
//!
//! Carries commands into the engine thread and events out of it. Cursors
//! live on their own cache lines; each handle keeps a private copy of the
//! other side's cursor so the shared one is only reloaded when the cached
//! value says the ring is full (producer) or empty (consumer).
//!
//! Shutdown is cooperative: closing (or dropping) the producer marks the
//! ring closed, and the consumer keeps handing out items until the ring is
//! both closed and drained. Dropping the consumer disconnects the ring, after
//! which blocking publishes give up instead of waiting for space.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam::utils::{Backoff, CachePadded};

/// Default buffer size (64K entries).
pub const DEFAULT_CAPACITY: usize = 1 << 16;

/// Single-producer single-consumer ring buffer with a heap-allocated slab.
pub struct SpscRing<T: Copy> {
    /// Next slot to write (owned by producer).
    write_cursor: CachePadded<AtomicU64>,
    /// Next slot to read (owned by consumer).
    read_cursor: CachePadded<AtomicU64>,
    /// Set once the producer is done.
    closed: CachePadded<AtomicBool>,
    /// Set once the consumer is gone.
    disconnected: CachePadded<AtomicBool>,
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: u64,
}

// SAFETY: a slot is written only by the producer before the write cursor is
// released past it, and read only by the consumer after acquiring that
// cursor. `split` hands out at most one of each handle.
unsafe impl<T: Copy + Send> Send for SpscRing<T> {}
unsafe impl<T: Copy + Send> Sync for SpscRing<T> {}

impl<T: Copy> SpscRing<T> {
    /// Create a ring holding at least `capacity` items.
    ///
    /// The capacity is rounded up to the next power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            write_cursor: CachePadded::new(AtomicU64::new(0)),
            read_cursor: CachePadded::new(AtomicU64::new(0)),
            closed: CachePadded::new(AtomicBool::new(false)),
            disconnected: CachePadded::new(AtomicBool::new(false)),
            buffer,
            mask: (capacity - 1) as u64,
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    /// Split into producer and consumer handles.
    ///
    /// The exclusive borrow keeps a second split from happening while the
    /// handles are alive.
    pub fn split(&mut self) -> (Producer<'_, T>, Consumer<'_, T>) {
        let ring: &Self = self;
        let write = ring.write_cursor.load(Ordering::Relaxed);
        let read = ring.read_cursor.load(Ordering::Relaxed);
        (
            Producer { ring, write_pos: write, cached_read: read },
            Consumer { ring, read_pos: read, cached_write: write },
        )
    }

    #[inline(always)]
    fn slot(&self, pos: u64) -> *mut MaybeUninit<T> {
        self.buffer[(pos & self.mask) as usize].get()
    }
}

impl<T: Copy> Default for SpscRing<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

/// Producer handle (write-only). Closes the ring when dropped.
pub struct Producer<'a, T: Copy> {
    ring: &'a SpscRing<T>,
    write_pos: u64,
    cached_read: u64,
}

impl<'a, T: Copy> Producer<'a, T> {
    /// Attempt to publish a value.
    ///
    /// Returns `false` if buffer is full.
    #[inline]
    pub fn try_publish(&mut self, value: T) -> bool {
        let capacity = self.ring.capacity() as u64;

        if self.write_pos - self.cached_read >= capacity {
            self.cached_read = self.ring.read_cursor.load(Ordering::Acquire);
            if self.write_pos - self.cached_read >= capacity {
                return false;
            }
        }

        // SAFETY: the consumer has released this slot (checked above) and
        // will not touch it until the store below publishes it.
        unsafe {
            (*self.ring.slot(self.write_pos)).write(value);
        }
        self.write_pos += 1;
        self.ring.write_cursor.store(self.write_pos, Ordering::Release);
        true
    }

    /// Publish a value, backing off until space is available.
    ///
    /// Returns `false`, dropping the value, once the consumer is gone.
    #[inline]
    pub fn publish(&mut self, value: T) -> bool {
        let backoff = Backoff::new();
        while !self.try_publish(value) {
            if self.ring.is_disconnected() {
                return false;
            }
            backoff.snooze();
        }
        true
    }

    /// Number of free slots as seen right now.
    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        let read = self.ring.read_cursor.load(Ordering::Acquire);
        self.ring.capacity() - (self.write_pos - read) as usize
    }

    /// Signal that nothing more will be published.
    pub fn close(self) {
        drop(self);
    }
}

impl<T: Copy> Drop for Producer<'_, T> {
    fn drop(&mut self) {
        self.ring.closed.store(true, Ordering::Release);
    }
}

/// Consumer handle (read-only).
pub struct Consumer<'a, T: Copy> {
    ring: &'a SpscRing<T>,
    read_pos: u64,
    cached_write: u64,
}

impl<'a, T: Copy> Consumer<'a, T> {
    /// Attempt to consume a value.
    ///
    /// Returns `None` if buffer is empty.
    #[inline]
    pub fn try_consume(&mut self) -> Option<T> {
        if self.read_pos >= self.cached_write {
            self.cached_write = self.ring.write_cursor.load(Ordering::Acquire);
            if self.read_pos >= self.cached_write {
                return None;
            }
        }

        // SAFETY: the acquire load above observed the producer's release of
        // this slot, so it holds an initialized value.
        let value = unsafe { (*self.ring.slot(self.read_pos)).assume_init_read() };
        self.read_pos += 1;
        self.ring.read_cursor.store(self.read_pos, Ordering::Release);
        Some(value)
    }

    /// Wait for the next value.
    ///
    /// Returns `None` only once the producer has closed the ring and every
    /// published value has been consumed.
    pub fn recv(&mut self) -> Option<T> {
        let backoff = Backoff::new();
        loop {
            if let Some(value) = self.try_consume() {
                return Some(value);
            }
            if self.ring.is_closed() {
                // Anything published before the close is visible now.
                return self.try_consume();
            }
            backoff.snooze();
        }
    }

    /// Check number of items available to consume.
    #[inline]
    pub fn available(&self) -> usize {
        let write = self.ring.write_cursor.load(Ordering::Acquire);
        (write - self.read_pos) as usize
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.ring.is_closed()
    }
}

impl<T: Copy> Drop for Consumer<'_, T> {
    fn drop(&mut self) {
        self.ring.disconnected.store(true, Ordering::Release);
    }
}

impl<T: Copy> Iterator for Consumer<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_message() {
        let mut ring: SpscRing<u64> = SpscRing::with_capacity(16);
        let (mut producer, mut consumer) = ring.split();

        assert!(producer.try_publish(42));
        assert_eq!(consumer.try_consume(), Some(42));
        assert_eq!(consumer.try_consume(), None);
    }

    #[test]
    fn test_capacity_rounds_up() {
        let ring: SpscRing<u8> = SpscRing::with_capacity(100);
        assert_eq!(ring.capacity(), 128);
    }

    #[test]
    fn test_fill_drain() {
        let mut ring: SpscRing<u64> = SpscRing::with_capacity(16);
        let (mut producer, mut consumer) = ring.split();

        for i in 0..16 {
            assert!(producer.try_publish(i), "Failed at {}", i);
        }
        assert!(!producer.try_publish(100));

        for i in 0..16 {
            assert_eq!(consumer.try_consume(), Some(i));
        }
        assert_eq!(consumer.try_consume(), None);
    }

    #[test]
    fn test_wrap_around() {
        let mut ring: SpscRing<u64> = SpscRing::with_capacity(4);
        let (mut producer, mut consumer) = ring.split();

        for round in 0..10 {
            let base = round * 4;
            for i in 0..4 {
                assert!(producer.try_publish(base + i));
            }
            for i in 0..4 {
                assert_eq!(consumer.try_consume(), Some(base + i));
            }
        }
    }

    #[test]
    fn test_remaining_capacity_and_available() {
        let mut ring: SpscRing<u64> = SpscRing::with_capacity(8);
        let (mut producer, consumer) = ring.split();

        assert_eq!(producer.remaining_capacity(), 8);
        assert_eq!(consumer.available(), 0);

        producer.try_publish(1);
        producer.try_publish(2);
        producer.try_publish(3);
        assert_eq!(producer.remaining_capacity(), 5);
        assert_eq!(consumer.available(), 3);
    }

    #[test]
    fn test_close_drains_before_ending() {
        let mut ring: SpscRing<u64> = SpscRing::with_capacity(8);
        let (mut producer, mut consumer) = ring.split();

        producer.publish(1);
        producer.publish(2);
        producer.close();

        assert!(consumer.is_closed());
        assert_eq!(consumer.recv(), Some(1));
        assert_eq!(consumer.recv(), Some(2));
        assert_eq!(consumer.recv(), None);
    }

    #[test]
    fn test_publish_gives_up_after_consumer_drops() {
        let mut ring: SpscRing<u64> = SpscRing::with_capacity(4);
        let (mut producer, consumer) = ring.split();

        for i in 0..4 {
            assert!(producer.publish(i));
        }
        drop(consumer);
        assert!(!producer.publish(4));
    }

    #[test]
    fn test_consumer_panic_releases_producer() {
        let mut ring: SpscRing<u64> = SpscRing::with_capacity(4);
        let (mut producer, mut consumer) = ring.split();

        let (published, reader) = std::thread::scope(|scope| {
            let reader = scope.spawn(move || {
                let first = consumer.recv();
                assert_eq!(first, Some(0));
                panic!("consumer failed");
            });
            let published = (0..1_000u64).take_while(|&i| producer.publish(i)).count();
            (published, reader.join())
        });

        assert!(reader.is_err());
        assert!(published < 1_000);
    }

    #[test]
    fn test_cross_thread_order_preserved() {
        let mut ring: SpscRing<u64> = SpscRing::with_capacity(64);
        let (mut producer, consumer) = ring.split();

        let received = std::thread::scope(|scope| {
            let reader = scope.spawn(move || consumer.collect::<Vec<u64>>());
            for i in 0..10_000 {
                producer.publish(i);
            }
            drop(producer);
            reader.join().unwrap()
        });

        assert_eq!(received, (0..10_000).collect::<Vec<u64>>());
    }
}
