//! # Frame Buffer Module
//!
//! This module provides the circular (ring) buffer for queuing frames and
//! the frame buffers themselves.
//!
//! ## Plain English Explanation
//!
//! Imagine a circular conveyor belt with a fixed number of spots.
//! Every time a new frame comes off the camera:
//! 1. It goes on the belt at the next spot
//! 2. If the belt is full, the oldest frame falls off the end
//! 3. Workers take frames off the other end, oldest first
//!
//! Dropping the oldest frame is the policy, not a failure: a capture
//! device must never be stalled by a slow consumer.

mod frame;
mod ring_buffer;

pub use frame::{FrameBuffer, FrameHandle};
pub use ring_buffer::RingBuffer;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::sync::{Notify, RendezvousSlot};

// ============================================
// SHARED RING
// Thread-safe wrapper for our ring buffer
// ============================================

/// A thread-safe ring buffer that can be shared across threads
///
/// Every operation takes the same lock for its whole (O(1)) duration, so
/// any number of producers and consumers may use it at once.
pub struct SharedRing<T> {
    inner: Mutex<RingBuffer<T>>,

    /// Fixed at construction
    capacity: usize,

    stats: Counters,
}

#[derive(Default)]
struct Counters {
    pushed: AtomicU64,
    popped: AtomicU64,
    dropped: AtomicU64,
}

/// Lifetime counters of a [`SharedRing`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingStats {
    pub pushed: u64,
    pub popped: u64,
    /// Items overwritten before anyone read them
    pub dropped: u64,
}

/// The ring type every pipeline queue uses.
pub type FrameRing = SharedRing<FrameHandle>;

impl<T> SharedRing<T> {
    /// Creates a new shared ring holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        let ring = RingBuffer::new(capacity);
        let capacity = ring.capacity();
        Self {
            inner: Mutex::new(ring),
            capacity,
            stats: Counters::default(),
        }
    }

    /// Adds an item, silently evicting the oldest one if full.
    ///
    /// The evicted item is released after the lock is dropped.
    pub fn put(&self, item: T) {
        let evicted = self.inner.lock().put(item);
        self.record_put(evicted.is_some());
    }

    /// `put`, then signal `slot` with the new size to all waiters.
    pub fn put_and_signal(&self, item: T, slot: &RendezvousSlot<usize>) {
        let (evicted, size) = {
            let mut ring = self.inner.lock();
            let evicted = ring.put(item);
            (evicted, ring.len())
        };
        self.record_put(evicted.is_some());
        drop(evicted);
        slot.signal(size, Notify::All);
    }

    /// `put_and_signal`, unless `refuse` says otherwise.
    ///
    /// `refuse` runs under the ring lock, so a reader that saw it turn true
    /// and then emptied the ring can never miss an item. A refused item is
    /// handed back.
    pub fn put_and_signal_unless<F>(
        &self,
        item: T,
        slot: &RendezvousSlot<usize>,
        refuse: F,
    ) -> Result<(), T>
    where
        F: FnOnce() -> bool,
    {
        let (evicted, size) = {
            let mut ring = self.inner.lock();
            if refuse() {
                return Err(item);
            }
            let evicted = ring.put(item);
            (evicted, ring.len())
        };
        self.record_put(evicted.is_some());
        drop(evicted);
        slot.signal(size, Notify::All);
        Ok(())
    }

    fn record_put(&self, evicted: bool) {
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        if evicted {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Removes the oldest item; `None` when empty. Never blocks.
    pub fn get(&self) -> Option<T> {
        let item = self.inner.lock().get();
        if item.is_some() {
            self.stats.popped.fetch_add(1, Ordering::Relaxed);
        }
        item
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().is_full()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns how full the buffer is (0.0 = empty, 1.0 = full)
    pub fn fill_percentage(&self) -> f32 {
        self.len() as f32 / self.capacity as f32
    }

    /// Empties the ring without reading it.
    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            pushed: self.stats.pushed.load(Ordering::Relaxed),
            popped: self.stats.popped.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

impl<T: Clone> SharedRing<T> {
    /// The `n` most recent items, newest first (`0` = all).
    pub fn get_latest(&self, n: usize) -> Vec<T> {
        self.inner.lock().latest(n)
    }

    /// Takes a snapshot of all current items, oldest first.
    ///
    /// The ring is NOT modified.
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.lock().get_all_cloned()
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_ring_creation() {
        let ring: SharedRing<u32> = SharedRing::new(10);
        assert_eq!(ring.capacity(), 10);
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
        assert_eq!(ring.fill_percentage(), 0.0);
    }

    #[test]
    fn test_overflow_counts_drops() {
        let ring = SharedRing::new(5);
        for i in 0..8 {
            ring.put(i);
        }

        assert!(ring.is_full());
        assert_eq!(ring.snapshot(), vec![3, 4, 5, 6, 7]);
        assert_eq!(
            ring.stats(),
            RingStats {
                pushed: 8,
                popped: 0,
                dropped: 3
            }
        );
    }

    #[test]
    fn test_put_and_signal_reports_size() {
        let ring = SharedRing::new(4);
        let slot = RendezvousSlot::new(0usize);

        ring.put_and_signal('a', &slot);
        ring.put_and_signal('b', &slot);

        assert!(slot.is_ready());
        assert_eq!(slot.wait(), 2);
    }

    #[test]
    fn test_refused_put_hands_item_back() {
        let ring = SharedRing::new(4);
        let slot = RendezvousSlot::new(0usize);

        assert_eq!(ring.put_and_signal_unless('a', &slot, || false), Ok(()));
        assert_eq!(ring.put_and_signal_unless('b', &slot, || true), Err('b'));

        assert_eq!(ring.snapshot(), vec!['a']);
        assert_eq!(ring.stats().pushed, 1);
        assert_eq!(slot.wait(), 1);
    }

    #[test]
    fn test_get_latest_and_reset() {
        let ring = SharedRing::new(3);
        for i in 1..=4 {
            ring.put(i);
        }
        assert_eq!(ring.get_latest(2), vec![4, 3]);

        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.get(), None);
    }

    #[test]
    fn test_dropped_frames_are_released() {
        let ring = SharedRing::new(2);
        let first = FrameBuffer::create_from_slice(b"one");
        ring.put(first.clone_handle());
        assert_eq!(first.handle_count(), 2);

        ring.put(FrameBuffer::create_from_slice(b"two"));
        ring.put(FrameBuffer::create_from_slice(b"three"));
        assert_eq!(first.handle_count(), 1);
    }

    #[test]
    fn test_concurrent_producers_and_consumer() {
        const PER_PRODUCER: u64 = 1000;
        let ring = Arc::new(SharedRing::new(16));

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        ring.put(i);
                        assert!(ring.len() <= ring.capacity());
                    }
                })
            })
            .collect();

        let mut taken = 0u64;
        for p in producers {
            p.join().unwrap();
        }
        while ring.get().is_some() {
            taken += 1;
        }

        let stats = ring.stats();
        assert_eq!(stats.pushed, 4 * PER_PRODUCER);
        assert_eq!(stats.popped, taken);
        assert_eq!(stats.pushed, stats.popped + stats.dropped);
    }
}
