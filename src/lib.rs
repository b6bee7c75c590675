//! # Frame Relay
//!
//! Moves frames from a capture source to any number of outputs through
//! bounded, overwrite-on-full ring buffers.
//!
//! ## Architecture Overview
//!
//! The crate is structured into independent modules:
//!
//! - `sync`: Rendezvous slot used to wake sleeping consumers
//! - `buffer`: Ring buffers and reference-counted frame buffers
//! - `net`: Reliable send/receive, listen/accept/connect helpers
//! - `capture`: Frame sources (test pattern, TCP, V4L2)
//! - `pipeline`: Producer, consumers, fan-out, profiler, run state
//! - `sink`: Outputs (file, piped process, network, preview)
//! - `storage`: Output file naming
//! - `config`: Application configuration
//! - `error`: Error types
//!
//! ```text
//!  source ─▶ producer ─▶ [input ring] ─▶ fan-out ─┬▶ [ring] ─▶ file sink
//!                                                 ├▶ [ring] ─▶ network sink
//!                                                 └▶ [ring] ─▶ profiler
//! ```

// ============================================
// MODULE DECLARATIONS
// ============================================

pub mod buffer;
pub mod capture;
pub mod config;
pub mod error;
pub mod net;
pub mod pipeline;
pub mod sink;
pub mod storage;
pub mod sync;

// ============================================
// RE-EXPORTS
// ============================================

pub use buffer::{FrameBuffer, FrameHandle, RingBuffer, SharedRing};
pub use capture::CaptureSource;
pub use config::Config;
pub use error::{RelayError, RelayResult};
pub use pipeline::{Pipeline, PipelineStatus};
pub use sink::FrameSink;
pub use sync::RendezvousSlot;

// ============================================
// IMPORTS
// ============================================

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};

use buffer::RingStats;
use error::CaptureError;
use pipeline::{run_capture, run_fanout, spawn_sink, FrameQueue, ProfileSnapshot, Profiler};
use sink::{PreviewReceiver, PreviewSink, SinkReport};

// ============================================
// RELAY
// ============================================

/// One configured capture-to-sinks run.
///
/// ## Plain English
///
/// This is the "control center" that wires everything together:
/// - Opens the capture source and the outputs named in the config
/// - Starts one thread per role (capture, fan-out, each sink, profiler)
/// - Lets the caller pause, resume and stop the flow
/// - Collects what every thread did once the run is over
pub struct FrameRelay {
    config: Config,
    pipeline: Pipeline,

    /// Sinks attached in code, started alongside the configured ones
    extra_sinks: Vec<Box<dyn FrameSink>>,

    preview: Option<PreviewReceiver>,
    workers: Option<Workers>,
}

struct Workers {
    capture: JoinHandle<(Result<u64, CaptureError>, u64)>,
    fanout: JoinHandle<u64>,
    sinks: Vec<JoinHandle<SinkReport>>,
    profiler: Option<JoinHandle<ProfileSnapshot>>,
}

/// Output queues whose fan-out is not running yet.
///
/// Dropped before [`take`](Self::take), it closes every queue so sink
/// threads already spawned do not wait forever.
struct PendingOutputs(Vec<Arc<FrameQueue>>);

impl PendingOutputs {
    fn take(mut self) -> Vec<Arc<FrameQueue>> {
        std::mem::take(&mut self.0)
    }
}

impl Drop for PendingOutputs {
    fn drop(&mut self) {
        for queue in &self.0 {
            queue.close();
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RelayReport {
    /// Final pipeline status
    pub status: PipelineStatus,
    /// Source frames published into the pipeline
    pub frames_captured: u64,
    /// Frames the fan-out passed on to the sinks
    pub frames_relayed: u64,
    /// Input ring counters (drops show a slow fan-out)
    pub input: RingStats,
    pub sinks: Vec<SinkReport>,
    pub profile: Option<ProfileSnapshot>,
    /// Why the source stopped, if it failed
    pub capture_error: Option<String>,
}

impl RelayReport {
    /// True unless the run ended in an error termination.
    pub fn succeeded(&self) -> bool {
        self.status != PipelineStatus::Failed
    }
}

impl FrameRelay {
    /// Creates a relay with default configuration.
    pub fn new() -> RelayResult<Self> {
        Self::with_config(Config::default())
    }

    /// Creates a relay with custom configuration.
    ///
    /// ## Returns
    /// The relay, or the first configuration problem found
    pub fn with_config(config: Config) -> RelayResult<Self> {
        if let Some(problem) = config.validate().into_iter().next() {
            return Err(RelayError::Config(problem));
        }

        info!(
            "Initializing Frame Relay: {:?} source, input ring of {}",
            config.source, config.ring_capacity
        );

        Ok(Self {
            pipeline: Pipeline::new(config.ring_capacity),
            config,
            extra_sinks: Vec::new(),
            preview: None,
            workers: None,
        })
    }

    /// Attaches a sink in addition to those named in the config.
    ///
    /// Only sinks attached before [`start`](Self::start) receive frames.
    pub fn add_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.extra_sinks.push(sink);
    }

    /// Opens the source and outputs and starts all threads.
    ///
    /// On failure the pipeline is marked as error-terminated.
    pub fn start(&mut self) -> RelayResult<()> {
        if self.workers.is_some() || self.pipeline.is_terminated() {
            return Err(RelayError::Internal("relay already started".to_string()));
        }
        net::ignore_sigpipe();

        match self.spawn_workers() {
            Ok(workers) => {
                self.workers = Some(workers);
                Ok(())
            }
            Err(e) => {
                error!("Failed to start relay: {}", e);
                self.pipeline.terminate_with_error();
                Err(e)
            }
        }
    }

    fn spawn_workers(&mut self) -> RelayResult<Workers> {
        let mut source = capture::create_source(&self.config)?;

        let mut sinks = sink::build_sinks(&self.config)?;
        sinks.append(&mut self.extra_sinks);
        if self.config.preview_enabled {
            let (preview, receiver) = PreviewSink::new(self.config.preview_depth);
            sinks.push(Box::new(preview));
            self.preview = Some(receiver);
        }

        // One queue per downstream consumer
        let mut outputs = PendingOutputs(Vec::with_capacity(sinks.len() + 1));
        let mut sink_threads = Vec::with_capacity(sinks.len());
        for sink in sinks {
            let queue = Arc::new(FrameQueue::new(
                format!("sink:{}", sink.name()),
                self.config.sink_ring_capacity,
            ));
            outputs.0.push(Arc::clone(&queue));
            sink_threads.push(spawn_sink(queue, sink)?);
        }

        let profiler = if self.config.profiling_enabled {
            let queue = Arc::new(FrameQueue::new("profiler", self.config.sink_ring_capacity));
            outputs.0.push(Arc::clone(&queue));
            let profiler = Profiler::new(self.config.profile_interval());
            Some(
                thread::Builder::new()
                    .name("profiler".to_string())
                    .spawn(move || profiler.run(&queue))?,
            )
        } else {
            None
        };

        let sink_count = sink_threads.len();
        let input = Arc::clone(self.pipeline.input());
        let fanout = thread::Builder::new()
            .name("fanout".to_string())
            .spawn(move || run_fanout(&input, &outputs.take()))?;

        let mut producer = self
            .pipeline
            .producer(self.config.frame_capacity, self.config.frame_limit);
        let capture = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let result = run_capture(source.as_mut(), &mut producer);
                (result, producer.frames_published())
            })?;

        info!(
            "Relay started: {} sink(s), profiler {}",
            sink_count,
            if profiler.is_some() { "on" } else { "off" }
        );

        Ok(Workers {
            capture,
            fanout,
            sinks: sink_threads,
            profiler,
        })
    }

    /// Stops publishing; the source keeps being read.
    pub fn pause(&self) -> bool {
        self.pipeline.pause()
    }

    pub fn resume(&self) -> bool {
        self.pipeline.resume()
    }

    /// Requests a normal stop. Queued frames are still delivered.
    pub fn stop(&self) -> bool {
        self.pipeline.terminate()
    }

    pub fn is_terminated(&self) -> bool {
        self.pipeline.is_terminated()
    }

    pub fn is_error_terminated(&self) -> bool {
        self.pipeline.is_error_terminated()
    }

    pub fn status(&self) -> PipelineStatus {
        self.pipeline.status()
    }

    /// Takes the preview receiver, if preview is enabled and started.
    pub fn preview(&mut self) -> Option<PreviewReceiver> {
        self.preview.take()
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Blocks until every thread has finished and reports the run.
    ///
    /// Threads finish once the pipeline terminates: through
    /// [`stop`](Self::stop), the frame limit, end of stream or an error.
    pub fn wait(mut self) -> RelayResult<RelayReport> {
        let workers = self
            .workers
            .take()
            .ok_or_else(|| RelayError::Internal("relay was never started".to_string()))?;

        let (capture_result, frames_captured) = self
            .join(workers.capture, "capture")
            .unwrap_or((Ok(0), 0));
        let frames_relayed = self.join(workers.fanout, "fanout").unwrap_or(0);

        let mut sinks = Vec::with_capacity(workers.sinks.len());
        for handle in workers.sinks {
            if let Some(report) = self.join(handle, "sink") {
                sinks.push(report);
            }
        }
        let profile = workers
            .profiler
            .and_then(|handle| self.join(handle, "profiler"));

        let report = RelayReport {
            status: self.pipeline.status(),
            frames_captured,
            frames_relayed,
            input: self.pipeline.input().stats(),
            sinks,
            profile,
            capture_error: capture_result.err().map(|e| e.to_string()),
        };

        info!(
            "Relay finished ({}): {} captured, {} relayed, {} dropped at input",
            report.status, report.frames_captured, report.frames_relayed, report.input.dropped
        );
        Ok(report)
    }

    /// Joins a worker; a panicked worker fails the whole pipeline.
    fn join<T>(&self, handle: JoinHandle<T>, role: &str) -> Option<T> {
        match handle.join() {
            Ok(value) => Some(value),
            Err(_) => {
                error!("{} thread panicked", role);
                self.pipeline.terminate_with_error();
                None
            }
        }
    }
}

impl Drop for FrameRelay {
    fn drop(&mut self) {
        // Unjoined threads are left to wind down on their own
        if self.workers.is_some() && self.pipeline.terminate() {
            warn!("Relay dropped while running; stopping it");
        }
    }
}

// ============================================
// LOGGING
// ============================================

/// Initialize logging for the platform.
///
/// Honours `RUST_LOG`; defaults to `info`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

// ============================================
// TESTS
// ============================================
