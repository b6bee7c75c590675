//! # Rendezvous Slot
//!
//! A single-slot, level-triggered wakeup carrying one payload value.
//!
//! ## Plain English
//!
//! Think of a doorbell with a note pinned next to it. A producer pins a
//! note (the payload) and rings. A sleeping consumer wakes up, reads the
//! note and un-rings the bell. If several producers ring before anyone
//! answers, only the latest note is still pinned there.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// How many waiters a signal wakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    One,
    All,
}

#[derive(Debug)]
struct SlotState<T> {
    ready: bool,
    payload: T,
}

/// Condition variable plus payload.
///
/// `wait` consumes exactly one pending signal; `signal` overwrites the
/// payload (last write wins) and never queues.
#[derive(Debug)]
pub struct RendezvousSlot<T> {
    state: Mutex<SlotState<T>>,
    cond: Condvar,
}

impl<T: Clone> RendezvousSlot<T> {
    /// Creates a slot holding `initial` with no pending signal.
    pub fn new(initial: T) -> Self {
        Self {
            state: Mutex::new(SlotState {
                ready: false,
                payload: initial,
            }),
            cond: Condvar::new(),
        }
    }

    /// Blocks until a signal is pending, consumes it and returns its payload.
    pub fn wait(&self) -> T {
        let mut state = self.state.lock();
        while !state.ready {
            self.cond.wait(&mut state);
        }
        state.ready = false;
        state.payload.clone()
    }

    /// `wait`, giving up after `timeout`.
    ///
    /// Returns `None` if no signal arrived in time; nothing is consumed then.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.wait());
        };

        let mut state = self.state.lock();
        while !state.ready {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        if !state.ready {
            return None;
        }
        state.ready = false;
        Some(state.payload.clone())
    }

    /// Stores `value`, marks the slot ready and wakes waiters.
    pub fn signal(&self, value: T, notify: Notify) {
        {
            let mut state = self.state.lock();
            state.payload = value;
            state.ready = true;
        }
        match notify {
            Notify::One => {
                self.cond.notify_one();
            }
            Notify::All => {
                self.cond.notify_all();
            }
        }
    }

    /// Last payload, without consuming a pending signal.
    pub fn peek(&self) -> T {
        self.state.lock().payload.clone()
    }

    /// Whether a signal is waiting to be consumed.
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }
}

impl<T: Clone + Default> Default for RendezvousSlot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_new_slot_is_not_ready() {
        let slot = RendezvousSlot::new(7);
        assert!(!slot.is_ready());
        assert_eq!(slot.peek(), 7);
    }

    #[test]
    fn test_last_write_wins() {
        let slot = RendezvousSlot::new(0);
        slot.signal(1, Notify::One);
        slot.signal(2, Notify::All);

        assert_eq!(slot.wait(), 2);
        assert!(!slot.is_ready());
    }

    #[test]
    fn test_wait_timeout() {
        let slot = RendezvousSlot::new(0);
        assert_eq!(slot.wait_timeout(Duration::from_millis(10)), None);

        slot.signal(3, Notify::One);
        assert_eq!(slot.wait_timeout(Duration::from_millis(10)), Some(3));
        assert!(!slot.is_ready());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let slot = RendezvousSlot::new(0);
        slot.signal(5, Notify::One);

        assert_eq!(slot.peek(), 5);
        assert!(slot.is_ready());
        assert_eq!(slot.wait(), 5);
    }

    #[test]
    fn test_wait_blocks_until_signal() {
        let slot = Arc::new(RendezvousSlot::new(0usize));
        let waiter = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.wait())
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        slot.signal(42, Notify::One);
        assert_eq!(waiter.join().unwrap(), 42);
    }

    #[test]
    fn test_ping_pong_stress() {
        // Two slots bounced between two threads; a missed wakeup hangs the test.
        const ROUNDS: usize = 10_000;
        let ping = Arc::new(RendezvousSlot::new(0usize));
        let pong = Arc::new(RendezvousSlot::new(0usize));

        let responder = {
            let ping = Arc::clone(&ping);
            let pong = Arc::clone(&pong);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let value = ping.wait();
                    pong.signal(value + 1, Notify::One);
                }
            })
        };

        for i in 0..ROUNDS {
            ping.signal(i, Notify::One);
            assert_eq!(pong.wait(), i + 1);
        }
        responder.join().unwrap();
    }

    #[test]
    fn test_many_signallers_wake_waiter() {
        const THREADS: usize = 8;
        const SIGNALS: usize = 500;
        let slot = Arc::new(RendezvousSlot::new(0usize));
        let wakes = Arc::new(AtomicUsize::new(0));

        let waiter = {
            let slot = Arc::clone(&slot);
            let wakes = Arc::clone(&wakes);
            thread::spawn(move || loop {
                let value = slot.wait();
                wakes.fetch_add(1, Ordering::SeqCst);
                if value == usize::MAX {
                    break;
                }
            })
        };

        let signallers: Vec<_> = (0..THREADS)
            .map(|t| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || {
                    for i in 0..SIGNALS {
                        slot.signal(t * SIGNALS + i, Notify::All);
                    }
                })
            })
            .collect();
        for s in signallers {
            s.join().unwrap();
        }

        slot.signal(usize::MAX, Notify::All);
        waiter.join().unwrap();
        assert!(wakes.load(Ordering::SeqCst) >= 1);
    }
}
