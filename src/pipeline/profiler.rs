//! # Pipeline Profiler
//!
//! A consumer that watches the frame stream instead of writing it.
//!
//! ## Plain English
//!
//! The profiler gets its own copy of every relayed frame, writes down
//! when it arrived and how big it was, and throws the frame away. Every
//! so often it looks at the most recent notes and reports throughput,
//! plus how many frames went missing upstream (visible as holes in the
//! sequence numbers).

use std::time::{Duration, Instant};

use crate::buffer::{FrameHandle, SharedRing};

use super::consumer::drain_loop_ticking;
use super::queue::FrameQueue;

/// Per-frame notes kept for the rate window.
const HISTORY_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
struct FrameStat {
    sequence: u64,
    bytes: usize,
    seen: Instant,
}

/// Throughput figures at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileSnapshot {
    /// Frames seen since start
    pub frames: u64,
    /// Payload bytes seen since start
    pub bytes: u64,
    /// Frames inside the rate window
    pub window_frames: usize,
    /// Frame rate over the window
    pub frames_per_sec: f64,
    /// Byte rate over the window
    pub bytes_per_sec: f64,
    /// Frames missing from the sequence (dropped upstream)
    pub sequence_gaps: u64,
    /// Sequence number of the newest frame
    pub latest_sequence: Option<u64>,
    /// Interval reports logged so far
    pub reports: u64,
}

impl std::fmt::Display for ProfileSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} bytes | {:.1} fps, {:.0} B/s over {} frames | {} gap(s)",
            self.frames,
            self.bytes,
            self.frames_per_sec,
            self.bytes_per_sec,
            self.window_frames,
            self.sequence_gaps
        )
    }
}

/// Records frame statistics and reports them at a fixed interval.
pub struct Profiler {
    interval: Duration,
    history: SharedRing<FrameStat>,
    frames: u64,
    bytes: u64,
    sequence_gaps: u64,
    last_sequence: Option<u64>,
    last_report: Instant,
    reports: u64,
}

impl Profiler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            history: SharedRing::new(HISTORY_CAPACITY),
            frames: 0,
            bytes: 0,
            sequence_gaps: 0,
            last_sequence: None,
            last_report: Instant::now(),
            reports: 0,
        }
    }

    /// Notes one frame.
    pub fn record(&mut self, frame: &FrameHandle) {
        let sequence = frame.sequence();
        if let Some(last) = self.last_sequence {
            if sequence > last + 1 {
                self.sequence_gaps += sequence - last - 1;
            }
        }
        self.last_sequence = Some(sequence);
        self.frames += 1;
        self.bytes += frame.valid_length() as u64;

        self.history.put(FrameStat {
            sequence,
            bytes: frame.valid_length(),
            seen: Instant::now(),
        });
    }

    /// Current figures; rates cover the most recent frames.
    pub fn snapshot(&self) -> ProfileSnapshot {
        // Newest first
        let window = self.history.get_latest(0);

        let (frames_per_sec, bytes_per_sec) = match (window.first(), window.last()) {
            (Some(newest), Some(oldest)) if window.len() > 1 => {
                let span = newest.seen.duration_since(oldest.seen).as_secs_f64();
                if span > 0.0 {
                    // The oldest frame opens the window
                    let bytes: usize = window[..window.len() - 1].iter().map(|s| s.bytes).sum();
                    ((window.len() - 1) as f64 / span, bytes as f64 / span)
                } else {
                    (0.0, 0.0)
                }
            }
            _ => (0.0, 0.0),
        };

        ProfileSnapshot {
            frames: self.frames,
            bytes: self.bytes,
            window_frames: window.len(),
            frames_per_sec,
            bytes_per_sec,
            sequence_gaps: self.sequence_gaps,
            latest_sequence: window.first().map(|s| s.sequence),
            reports: self.reports,
        }
    }

    /// Logs a snapshot if the interval has elapsed.
    fn maybe_report(&mut self) {
        if self.last_report.elapsed() >= self.interval {
            self.reports += 1;
            log::info!("Profile: {}", self.snapshot());
            self.last_report = Instant::now();
        }
    }

    /// Consumes `queue` until it closes; returns the final snapshot.
    ///
    /// Reports keep coming every interval while no frames arrive.
    pub fn run(mut self, queue: &FrameQueue) -> ProfileSnapshot {
        self.last_report = Instant::now();
        let interval = self.interval.max(Duration::from_millis(1));
        drain_loop_ticking(queue, interval, |frame| {
            if let Some(frame) = frame {
                self.record(&frame);
            }
            self.maybe_report();
        });

        let last = self.snapshot();
        log::info!("Profile (final): {}", last);
        last
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FrameBuffer;
    use std::sync::Arc;
    use std::thread;

    fn frame(sequence: u64, len: usize) -> FrameHandle {
        let mut frame = FrameBuffer::create_from_slice(&vec![0u8; len]);
        frame.set_sequence(sequence);
        frame
    }

    #[test]
    fn test_counts_and_gaps() {
        let mut profiler = Profiler::new(Duration::from_secs(60));
        for sequence in [0, 1, 2, 5, 6, 10] {
            profiler.record(&frame(sequence, 100));
        }

        let snapshot = profiler.snapshot();
        assert_eq!(snapshot.frames, 6);
        assert_eq!(snapshot.bytes, 600);
        assert_eq!(snapshot.sequence_gaps, 5);
        assert_eq!(snapshot.latest_sequence, Some(10));
        assert_eq!(snapshot.window_frames, 6);
    }

    #[test]
    fn test_rate_over_window() {
        let mut profiler = Profiler::new(Duration::from_secs(60));
        for sequence in 0..5 {
            profiler.record(&frame(sequence, 10));
            thread::sleep(Duration::from_millis(10));
        }

        let snapshot = profiler.snapshot();
        assert!(snapshot.frames_per_sec > 0.0);
        // Four intervals of at least 10 ms each
        assert!(snapshot.frames_per_sec <= 101.0);
        assert!((snapshot.bytes_per_sec / snapshot.frames_per_sec - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut profiler = Profiler::new(Duration::from_secs(60));
        for sequence in 0..(HISTORY_CAPACITY as u64 + 10) {
            profiler.record(&frame(sequence, 1));
        }
        assert_eq!(profiler.snapshot().window_frames, HISTORY_CAPACITY);
    }

    #[test]
    fn test_run_reports_final_snapshot() {
        let queue = FrameQueue::new("profile", 16);
        for sequence in 0..4 {
            queue.publish(frame(sequence, 8));
        }
        queue.close();

        let snapshot = Profiler::new(Duration::ZERO).run(&queue);
        assert_eq!(snapshot.frames, 4);
        assert_eq!(snapshot.bytes, 32);
        assert_eq!(snapshot.sequence_gaps, 0);
    }

    #[test]
    fn test_stalled_stream_still_reports() {
        let queue = Arc::new(FrameQueue::new("profile", 4));
        let closer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(80));
                queue.close();
            })
        };

        let snapshot = Profiler::new(Duration::from_millis(10)).run(&queue);
        closer.join().unwrap();

        assert_eq!(snapshot.frames, 0);
        assert!(snapshot.reports >= 2, "only {} report(s)", snapshot.reports);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Profiler::new(Duration::from_secs(1)).snapshot();
        assert_eq!(snapshot, ProfileSnapshot::default());
    }
}
