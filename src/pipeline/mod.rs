//! # Frame Pipeline
//!
//! Producer → ring buffer → consumer plumbing with pause and terminate.
//!
//! ## Plain English
//!
//! One thread makes frames and drops them into a queue. Other threads
//! sleep until the queue rings its bell, then empty it. Everyone looks at
//! one shared status word to know whether to keep going:
//!
//! ```text
//!               pause()/resume()
//!            ┌────────────────────┐
//!            ▼                    │
//!       ┌─────────┐          ┌────┴────┐
//!       │ Running │─────────▶│ Paused  │
//!       └────┬────┘          └────┬────┘
//!            │ terminate[_with_error]()
//!            ▼                    ▼
//!       ┌──────────────────────────────┐
//!       │ Terminated / Failed (final)  │
//!       └──────────────────────────────┘
//! ```
//!
//! When the pipeline terminates every sleeping consumer is woken, and
//! each one empties its queue one last time before exiting.

mod consumer;
mod producer;
mod profiler;
mod queue;
mod state;

pub use consumer::{drain_loop, drain_loop_ticking, run_fanout, run_sink, spawn_sink};
pub use producer::{run_capture, Producer, PublishOutcome};
pub use profiler::{ProfileSnapshot, Profiler};
pub use queue::FrameQueue;
pub use state::{PipelineState, PipelineStatus};

use std::sync::Arc;

/// One pipeline run: the shared state and the input queue.
///
/// Handed to producer and consumer threads by `Arc`, so several
/// independent pipelines can live in one process.
pub struct Pipeline {
    state: Arc<PipelineState>,
    input: Arc<FrameQueue>,
}

impl Pipeline {
    /// Creates a running pipeline whose input queue holds `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        let state = Arc::new(PipelineState::new());
        let input = Arc::new(FrameQueue::linked("input", capacity, &state));
        Self { state, input }
    }

    /// A producer publishing into this pipeline's input queue.
    pub fn producer(&self, frame_capacity: usize, frame_limit: u64) -> Producer {
        Producer::new(
            Arc::clone(&self.input),
            Arc::clone(&self.state),
            frame_capacity,
            frame_limit,
        )
    }

    pub fn input(&self) -> &Arc<FrameQueue> {
        &self.input
    }

    pub fn state(&self) -> &Arc<PipelineState> {
        &self.state
    }

    pub fn status(&self) -> PipelineStatus {
        self.state.status()
    }

    pub fn pause(&self) -> bool {
        self.state.pause()
    }

    pub fn resume(&self) -> bool {
        self.state.resume()
    }

    pub fn terminate(&self) -> bool {
        self.state.terminate()
    }

    pub fn terminate_with_error(&self) -> bool {
        self.state.terminate_with_error()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }

    pub fn is_error_terminated(&self) -> bool {
        self.state.is_error_terminated()
    }
}

// ============================================
// TESTS
// ============================================
