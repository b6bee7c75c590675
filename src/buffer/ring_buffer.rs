//! # Ring Buffer Implementation
//!
//! A fixed-size circular buffer that overwrites old elements when full.
//!
//! ## Plain English
//!
//! Picture a circular track with numbered parking spots.
//! When all spots are full and a new car arrives,
//! the oldest car is towed away to make room.
//!
//! ```text
//!   tail (oldest)         head (next write)
//!      │                     │
//!   ┌──▼──┬─────┬─────┬─────▼─┬─────┐
//!   │  3  │  4  │  5  │       │     │
//!   └─────┴─────┴─────┴───────┴─────┘
//! ```

/// A fixed-capacity ring buffer over a flat slot array.
///
/// ## Properties
/// - Fixed capacity (doesn't grow)
/// - O(1) put and get
/// - Overwrites the oldest item when full
/// - FIFO among the items that survive
///
/// Not synchronized; see [`super::SharedRing`] for the locked wrapper.
#[derive(Debug)]
pub struct RingBuffer<T> {
    items: Vec<Option<T>>,
    head: usize,
    tail: usize,
    full: bool,
}

impl<T> RingBuffer<T> {
    /// Creates a new ring buffer with the given capacity (at least one slot).
    ///
    /// ## Example
    /// ```
    /// # use frame_relay::buffer::RingBuffer;
    /// let buffer: RingBuffer<i32> = RingBuffer::new(100);
    /// assert_eq!(buffer.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut items = Vec::with_capacity(capacity);
        items.resize_with(capacity, || None);
        Self {
            items,
            head: 0,
            tail: 0,
            full: false,
        }
    }

    /// Adds an item at `head`.
    ///
    /// If the buffer is full, the oldest item is evicted and returned.
    pub fn put(&mut self, item: T) -> Option<T> {
        let capacity = self.capacity();
        let evicted = if self.full {
            let oldest = self.items[self.tail].take();
            self.tail = (self.tail + 1) % capacity;
            oldest
        } else {
            None
        };

        self.items[self.head] = Some(item);
        self.head = (self.head + 1) % capacity;
        self.full = self.head == self.tail;
        evicted
    }

    /// Removes and returns the oldest item, or `None` when empty.
    pub fn get(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.items[self.tail].take();
        self.tail = (self.tail + 1) % self.capacity();
        self.full = false;
        item
    }

    /// Returns the number of items currently stored.
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity()
        } else if self.head >= self.tail {
            self.head - self.tail
        } else {
            self.capacity() + self.head - self.tail
        }
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        !self.full && self.head == self.tail
    }

    /// Returns true if the buffer is at capacity.
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Returns the maximum capacity.
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Empties the buffer, releasing every held item.
    pub fn reset(&mut self) {
        for slot in &mut self.items {
            slot.take();
        }
        self.tail = self.head;
        self.full = false;
    }

    /// Returns an iterator over all items (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let capacity = self.capacity();
        (0..self.len()).filter_map(move |i| self.items[(self.tail + i) % capacity].as_ref())
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copies of the `n` most recent items, newest first.
    ///
    /// `n == 0` or `n > len()` returns everything.
    pub fn latest(&self, n: usize) -> Vec<T> {
        let len = self.len();
        let count = if n == 0 || n > len { len } else { n };
        let capacity = self.capacity();

        (0..count)
            .filter_map(|i| self.items[(self.head + capacity - 1 - i) % capacity].clone())
            .collect()
    }

    /// Returns cloned copies of all items (oldest first).
    pub fn get_all_cloned(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

// ============================================
// TESTS
// ============================================
