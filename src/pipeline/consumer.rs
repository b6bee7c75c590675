//! Consumer threads: the drain loop every stage shares, the fan-out
//! stage, and per-sink runners.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::buffer::FrameHandle;
use crate::sink::{FrameSink, SinkReport};

use super::queue::FrameQueue;

// ============================================
// DRAIN LOOP
// ============================================

/// Processes frames from `queue` until it closes, then drains it.
///
/// Sleeps on the queue's slot between batches. After the queue closes,
/// every frame still queued is processed once more before returning, so
/// nothing resident at shutdown is lost. Returns the number of frames
/// processed.
pub fn drain_loop<F>(queue: &FrameQueue, mut process: F) -> u64
where
    F: FnMut(FrameHandle),
{
    drain(queue, None, |item| {
        if let Some(frame) = item {
            process(frame);
        }
    })
}

/// [`drain_loop`] that also wakes at least once per `interval`.
///
/// `process` gets `None` after every wakeup, frames or not, so the
/// caller can act on time passing while the stream is stalled.
pub fn drain_loop_ticking<F>(queue: &FrameQueue, interval: Duration, process: F) -> u64
where
    F: FnMut(Option<FrameHandle>),
{
    drain(queue, Some(interval), process)
}

fn drain<F>(queue: &FrameQueue, interval: Option<Duration>, mut process: F) -> u64
where
    F: FnMut(Option<FrameHandle>),
{
    let mut processed = 0u64;

    while !queue.is_closed() {
        match interval {
            Some(interval) => {
                queue.wait_timeout(interval);
            }
            None => {
                queue.wait();
            }
        }
        while !queue.is_closed() {
            match queue.take() {
                Some(frame) => {
                    process(Some(frame));
                    processed += 1;
                }
                None => break,
            }
        }
        if interval.is_some() {
            process(None);
        }
    }

    // Final pass
    while let Some(frame) = queue.take() {
        process(Some(frame));
        processed += 1;
    }

    // Hand the wakeup on in case another thread waits on this queue
    queue.wake();
    processed
}

// ============================================
// FAN-OUT
// ============================================

/// Closes every queue it holds when dropped.
struct CloseOnDrop<'a>(&'a [Arc<FrameQueue>]);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        for queue in self.0 {
            queue.close();
        }
    }
}

/// Copies every frame from `input` into each of `outputs`.
///
/// The frame bytes are shared, not copied. The outputs are closed once
/// `input` is fully drained, which lets their consumers finish in turn.
pub fn run_fanout(input: &FrameQueue, outputs: &[Arc<FrameQueue>]) -> u64 {
    let _close = CloseOnDrop(outputs);

    let relayed = drain_loop(input, |frame| {
        for queue in outputs {
            queue.publish(frame.clone_handle());
        }
    });
    log::info!(
        "Fan-out relayed {} frame(s) to {} queue(s)",
        relayed,
        outputs.len()
    );
    relayed
}

// ============================================
// SINK RUNNERS
// ============================================

/// Feeds every frame from `queue` to `sink`, then finishes the sink.
///
/// Per-frame failures are logged and counted; they never stop the loop.
pub fn run_sink(queue: &FrameQueue, sink: &mut dyn FrameSink) -> SinkReport {
    let mut report = SinkReport::new(sink.name());

    drain_loop(queue, |frame| match sink.consume(&frame) {
        Ok(bytes) => report.record(bytes),
        Err(e) => {
            report.failures += 1;
            log::warn!("Sink '{}' dropped frame {}: {}", sink.name(), frame.sequence(), e);
        }
    });

    if let Err(e) = sink.finish() {
        report.failures += 1;
        log::warn!("Sink '{}' failed to finish: {}", sink.name(), e);
    }

    log::info!(
        "Sink '{}' done: {} frame(s), {} byte(s), {} failure(s)",
        report.name,
        report.frames,
        report.bytes,
        report.failures
    );
    report
}

/// Runs `sink` on its own named thread.
pub fn spawn_sink(
    queue: Arc<FrameQueue>,
    mut sink: Box<dyn FrameSink>,
) -> io::Result<JoinHandle<SinkReport>> {
    thread::Builder::new()
        .name(format!("sink-{}", sink.name()))
        .spawn(move || run_sink(&queue, sink.as_mut()))
}

// ============================================
// TESTS
// ============================================
