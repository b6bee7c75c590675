//! The producer side: wraps raw source bytes into frames and publishes them.

use std::sync::Arc;

use crate::buffer::FrameBuffer;
use crate::capture::CaptureSource;
use crate::error::CaptureError;

use super::queue::FrameQueue;
use super::state::PipelineState;

/// What happened to one batch of source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Published as this many frame buffers
    Published(usize),
    /// Pulled while paused and thrown away
    DiscardedPaused,
    /// The pipeline already terminated
    Rejected,
    /// Zero bytes; nothing to publish
    Empty,
}

/// Publishes source data into the pipeline's input queue.
///
/// Owned by the capture thread. Input larger than `frame_capacity` is
/// split into several frames, each with its own sequence number.
pub struct Producer {
    queue: Arc<FrameQueue>,
    state: Arc<PipelineState>,
    frame_capacity: usize,

    /// Source frames after which to stop (0 = never)
    frame_limit: u64,

    frames_published: u64,
    frames_discarded: u64,
    next_sequence: u64,
}

impl Producer {
    pub fn new(
        queue: Arc<FrameQueue>,
        state: Arc<PipelineState>,
        frame_capacity: usize,
        frame_limit: u64,
    ) -> Self {
        Self {
            queue,
            state,
            frame_capacity: frame_capacity.max(1),
            frame_limit,
            frames_published: 0,
            frames_discarded: 0,
            next_sequence: 0,
        }
    }

    /// Wraps `bytes` into frame buffers and publishes them.
    ///
    /// While paused the bytes are dropped, so the source keeps flowing
    /// without anything reaching consumers. Reaching the frame limit
    /// terminates the pipeline normally.
    pub fn on_frame_available(&mut self, bytes: &[u8]) -> PublishOutcome {
        if self.state.is_terminated() {
            return PublishOutcome::Rejected;
        }
        if bytes.is_empty() {
            return PublishOutcome::Empty;
        }
        if self.state.is_paused() {
            self.frames_discarded += 1;
            return PublishOutcome::DiscardedPaused;
        }

        let mut published = 0;
        for chunk in bytes.chunks(self.frame_capacity) {
            let mut frame = FrameBuffer::create_from_slice(chunk);
            frame.set_sequence(self.next_sequence);
            self.next_sequence += 1;

            if !self.queue.publish(frame) {
                break;
            }
            published += 1;
        }

        if published == 0 {
            return PublishOutcome::Rejected;
        }

        self.frames_published += 1;
        if self.frame_limit > 0 && self.frames_published >= self.frame_limit {
            log::info!("Frame limit of {} reached", self.frame_limit);
            self.state.terminate();
        }

        PublishOutcome::Published(published)
    }

    /// Source frames published so far.
    pub fn frames_published(&self) -> u64 {
        self.frames_published
    }

    /// Source frames thrown away while paused.
    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded
    }

    pub fn state(&self) -> &Arc<PipelineState> {
        &self.state
    }
}

// ============================================
// CAPTURE LOOP
// ============================================

/// Pulls frames from `source` into `producer` until the pipeline stops.
///
/// End of stream terminates the pipeline normally; any source error
/// terminates it with an error and is returned. The source is closed on
/// every path. Returns the number of frames pulled.
pub fn run_capture(
    source: &mut dyn CaptureSource,
    producer: &mut Producer,
) -> Result<u64, CaptureError> {
    let state = Arc::clone(producer.state());

    if let Err(e) = source.open() {
        log::error!("Failed to open {} source: {}", source.source_name(), e);
        state.terminate_with_error();
        return Err(e);
    }

    let mut pulled = 0u64;
    let result = loop {
        if state.is_terminated() {
            break Ok(());
        }
        match source.next_frame() {
            Ok(Some(bytes)) => {
                pulled += 1;
                producer.on_frame_available(bytes);
            }
            Ok(None) => {
                log::info!("{} source reached end of stream", source.source_name());
                state.terminate();
                break Ok(());
            }
            Err(e) => {
                log::error!("{} source failed: {}", source.source_name(), e);
                state.terminate_with_error();
                break Err(e);
            }
        }
    };

    source.close();
    log::info!(
        "Capture finished: {} pulled, {} published, {} discarded while paused",
        pulled,
        producer.frames_published(),
        producer.frames_discarded()
    );
    result.map(|()| pulled)
}

// ============================================
// TESTS
// ============================================
