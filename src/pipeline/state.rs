//! Shared run state of one pipeline.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::sync::{Notify, RendezvousSlot};

/// Where a pipeline is in its life.
///
/// `Running` and `Paused` toggle freely; the two terminated states are
/// final. An error termination counts as a termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineStatus {
    Running = 0,
    Paused = 1,
    Terminated = 2,
    Failed = 3,
}

impl PipelineStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Paused,
            2 => Self::Terminated,
            _ => Self::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Terminated => "terminated",
            Self::Failed => "terminated (error)",
        };
        f.write_str(name)
    }
}

/// Status word shared by the producer and every consumer, plus the
/// wakeup slots to flush when the pipeline terminates.
#[derive(Debug)]
pub struct PipelineState {
    status: AtomicU8,
    slots: Mutex<Vec<Weak<RendezvousSlot<usize>>>>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(PipelineStatus::Running as u8),
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn is_paused(&self) -> bool {
        self.status() == PipelineStatus::Paused
    }

    pub fn is_terminated(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn is_error_terminated(&self) -> bool {
        self.status() == PipelineStatus::Failed
    }

    /// Running -> Paused. Returns whether the transition happened.
    pub fn pause(&self) -> bool {
        let changed = self.transition(PipelineStatus::Running, PipelineStatus::Paused);
        if changed {
            log::info!("Pipeline paused");
        }
        changed
    }

    /// Paused -> Running. Returns whether the transition happened.
    pub fn resume(&self) -> bool {
        let changed = self.transition(PipelineStatus::Paused, PipelineStatus::Running);
        if changed {
            log::info!("Pipeline resumed");
        }
        changed
    }

    /// Requests a normal stop. No effect once terminated.
    pub fn terminate(&self) -> bool {
        self.finish(PipelineStatus::Terminated)
    }

    /// Records a fatal error and stops. No effect once terminated.
    pub fn terminate_with_error(&self) -> bool {
        self.finish(PipelineStatus::Failed)
    }

    /// Registers a slot to be flushed on termination.
    ///
    /// A slot registered after termination is flushed at once.
    pub fn register_slot(&self, slot: &Arc<RendezvousSlot<usize>>) {
        {
            let mut slots = self.slots.lock();
            slots.retain(|s| s.strong_count() > 0);
            slots.push(Arc::downgrade(slot));
        }
        if self.is_terminated() {
            slot.signal(slot.peek(), Notify::All);
        }
    }

    fn transition(&self, from: PipelineStatus, to: PipelineStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn finish(&self, target: PipelineStatus) -> bool {
        let mut current = self.status.load(Ordering::SeqCst);
        loop {
            if PipelineStatus::from_u8(current).is_terminal() {
                return false;
            }
            match self.status.compare_exchange(
                current,
                target as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        match target {
            PipelineStatus::Failed => log::error!("Pipeline terminated with error"),
            _ => log::info!("Pipeline terminated"),
        }
        self.flush();
        true
    }

    /// Wakes every registered waiter so it can observe termination.
    fn flush(&self) {
        let slots: Vec<_> = self.slots.lock().iter().filter_map(Weak::upgrade).collect();
        for slot in slots {
            slot.signal(slot.peek(), Notify::All);
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_pause_resume_toggle() {
        let state = PipelineState::new();
        assert_eq!(state.status(), PipelineStatus::Running);

        assert!(state.pause());
        assert!(!state.pause());
        assert!(state.is_paused());

        assert!(state.resume());
        assert!(!state.resume());
        assert_eq!(state.status(), PipelineStatus::Running);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let state = PipelineState::new();
        assert!(state.terminate());

        assert!(!state.terminate_with_error());
        assert!(!state.resume());
        assert!(!state.pause());
        assert!(state.is_terminated());
        assert!(!state.is_error_terminated());
    }

    #[test]
    fn test_error_implies_terminated() {
        let state = PipelineState::new();
        state.pause();
        assert!(state.terminate_with_error());

        assert!(state.is_error_terminated());
        assert!(state.is_terminated());
        assert_eq!(state.status(), PipelineStatus::Failed);
    }

    #[test]
    fn test_terminate_wakes_waiter() {
        let state = Arc::new(PipelineState::new());
        let slot = Arc::new(RendezvousSlot::new(0usize));
        state.register_slot(&slot);

        let waiter = {
            let slot = Arc::clone(&slot);
            let state = Arc::clone(&state);
            thread::spawn(move || {
                while !state.is_terminated() {
                    slot.wait();
                }
            })
        };

        state.terminate();
        waiter.join().unwrap();
    }

    #[test]
    fn test_late_registration_is_flushed() {
        let state = PipelineState::new();
        state.terminate();

        let slot = Arc::new(RendezvousSlot::new(3usize));
        state.register_slot(&slot);
        assert!(slot.is_ready());
        assert_eq!(slot.wait(), 3);
    }

    #[test]
    fn test_dropped_slots_are_forgotten() {
        let state = PipelineState::new();
        {
            let slot = Arc::new(RendezvousSlot::new(0usize));
            state.register_slot(&slot);
        }
        let kept = Arc::new(RendezvousSlot::new(0usize));
        state.register_slot(&kept);

        assert_eq!(state.slots.lock().len(), 1);
    }
}
