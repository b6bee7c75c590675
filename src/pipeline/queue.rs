//! One stage-to-stage hop: a frame ring plus the slot that wakes its reader.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::{FrameHandle, FrameRing, RingStats};
use crate::sync::{Notify, RendezvousSlot};

use super::state::PipelineState;

/// A frame queue feeding one consumer thread.
///
/// Closing a queue tells its consumer to drain what is left and exit. A
/// queue linked to a [`PipelineState`] also counts as closed once the
/// pipeline terminates.
pub struct FrameQueue {
    name: String,
    ring: FrameRing,
    slot: Arc<RendezvousSlot<usize>>,
    closed: AtomicBool,
    state: Option<Arc<PipelineState>>,
}

impl FrameQueue {
    /// A standalone queue, closed only by [`close`](Self::close).
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            ring: FrameRing::new(capacity),
            slot: Arc::new(RendezvousSlot::new(0)),
            closed: AtomicBool::new(false),
            state: None,
        }
    }

    /// A queue that closes when `state` terminates.
    pub fn linked(name: impl Into<String>, capacity: usize, state: &Arc<PipelineState>) -> Self {
        let mut queue = Self::new(name, capacity);
        state.register_slot(&queue.slot);
        queue.state = Some(Arc::clone(state));
        queue
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues `frame` and wakes the consumer.
    ///
    /// Returns `false` (dropping the frame) once the queue is closed.
    pub fn publish(&self, frame: FrameHandle) -> bool {
        self.ring
            .put_and_signal_unless(frame, &self.slot, || self.is_closed())
            .is_ok()
    }

    /// Blocks until something was published or the queue closed.
    ///
    /// Returns the ring size reported by the last signal.
    pub fn wait(&self) -> usize {
        self.slot.wait()
    }

    /// `wait`, but gives up after `timeout` and returns `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<usize> {
        self.slot.wait_timeout(timeout)
    }

    /// Oldest queued frame, if any. Never blocks.
    pub fn take(&self) -> Option<FrameHandle> {
        self.ring.get()
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::debug!("Queue '{}' closed with {} frame(s) left", self.name, self.len());
        }
        self.wake();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
            || self.state.as_ref().is_some_and(|s| s.is_terminated())
    }

    /// Re-signals the slot, passing a wakeup on to any other waiter.
    pub(crate) fn wake(&self) {
        self.slot.signal(self.ring.len(), Notify::All);
    }

    /// The `n` newest frames, newest first (`0` = all).
    pub fn latest(&self, n: usize) -> Vec<FrameHandle> {
        self.ring.get_latest(n)
    }

    /// Every queued frame, oldest first, without dequeuing.
    pub fn snapshot(&self) -> Vec<FrameHandle> {
        self.ring.snapshot()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn stats(&self) -> RingStats {
        self.ring.stats()
    }
}

// ============================================
// TESTS
// ============================================
