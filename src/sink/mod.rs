//! # Output Sinks
//!
//! Where relayed frames end up.
//!
//! ## Plain English
//!
//! Each sink is the last stop for a copy of the frame stream: a file on
//! disk, the stdin of another program, a network peer, or a preview
//! window. Every sink gets its own thread and its own queue, so a slow
//! disk never holds up the network forwarder.
//!
//! A sink that fails on one frame just loses that frame; the next one is
//! tried as normal.

mod file;
mod network;
mod preview;
mod process;

pub use file::FileSink;
pub use network::NetworkSink;
pub use preview::{PreviewReceiver, PreviewSink};
pub use process::ProcessSink;

use crate::buffer::FrameHandle;
use crate::config::Config;
use crate::error::SinkError;

// ============================================
// COMMON INTERFACE
// ============================================

/// A frame consumer driven by one dedicated thread.
pub trait FrameSink: Send {
    /// Short name for logs and thread names.
    fn name(&self) -> &str;

    /// Handles one frame; returns the bytes written.
    fn consume(&mut self, frame: &FrameHandle) -> Result<usize, SinkError>;

    /// Flushes and releases the output after the last frame.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// What a sink did over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub name: String,
    /// Frames handled successfully
    pub frames: u64,
    /// Bytes written for those frames
    pub bytes: u64,
    /// Frames lost to errors (plus a failed finish)
    pub failures: u64,
}

impl SinkReport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, bytes: usize) {
        self.frames += 1;
        self.bytes += bytes as u64;
    }
}

// ============================================
// FACTORY FUNCTION
// ============================================

/// Opens the file, process and network sinks named in `config`.
///
/// The preview sink is not built here; it hands out a receiver and is
/// set up by the caller.
pub fn build_sinks(config: &Config) -> Result<Vec<Box<dyn FrameSink>>, SinkError> {
    let mut sinks: Vec<Box<dyn FrameSink>> = Vec::new();

    if let Some(path) = &config.output_file {
        sinks.push(Box::new(FileSink::create(path)?));
    }
    if let Some(command) = &config.output_command {
        sinks.push(Box::new(ProcessSink::spawn(command)?));
    }
    if let Some(address) = &config.forward_address {
        sinks.push(Box::new(NetworkSink::connect(
            address,
            config.retry_policy(),
        )?));
    }

    log::info!("Opened {} output sink(s)", sinks.len());
    Ok(sinks)
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_no_outputs_no_sinks() {
        let sinks = build_sinks(&Config::default()).unwrap();
        assert!(sinks.is_empty());
    }

    #[test]
    fn test_builds_file_sink() {
        let dir = tempdir().unwrap();
        let config = Config {
            output_file: Some(dir.path().join("out.raw")),
            ..Config::default()
        };

        let sinks = build_sinks(&config).unwrap();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].name(), "file");
    }

    #[test]
    fn test_unreachable_forward_fails() {
        let config = Config {
            forward_address: Some("not an address".to_string()),
            ..Config::default()
        };
        assert!(build_sinks(&config).is_err());
    }

    #[test]
    fn test_report_record() {
        let mut report = SinkReport::new("x");
        report.record(10);
        report.record(5);
        assert_eq!((report.frames, report.bytes), (2, 15));
    }
}
