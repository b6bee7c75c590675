//! # Error Types Module
//!
//! This module defines all the error types used throughout Frame Relay.
//!
//! ## Plain English Explanation
//!
//! When things go wrong, we need a way to describe WHAT went wrong and
//! WHERE. Each part of the relay has its own error enum:
//!
//! - `CaptureError`: the frame source broke (device, socket feed, ...)
//! - `SinkError`: one frame could not be written somewhere
//! - `NetError`: a socket operation failed or was misused
//! - `ConfigError`: a setting is out of range (lives in `config`)
//!
//! How bad an error is depends on who hits it. A capture error ends the
//! whole pipeline; a sink error only costs one frame.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::ConfigError;

// ============================================
// MAIN APPLICATION ERROR
// ============================================

/// The main error type for Frame Relay.
///
/// This is the "parent" error that can contain any type of error
/// from any part of the crate.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Something went wrong with the frame source
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Something went wrong writing frames to an output
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Socket setup or transfer failed
    #[error("Network error: {0}")]
    Net(#[from] NetError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O error (thread spawn, filesystem)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Something unexpected happened
    #[error("Internal error: {0}")]
    Internal(String),
}

// ============================================
// CAPTURE ERRORS
// ============================================

/// Errors raised by capture sources.
///
/// Any of these reaching the capture loop moves the pipeline to
/// `Terminated{Error}`.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device or feed could not be opened
    #[error("Failed to open {source_name}: {reason}")]
    OpenFailed { source_name: String, reason: String },

    /// Reading the next frame failed
    #[error("Failed to read frame: {0}")]
    ReadFailed(String),

    /// No data arrived within the readiness timeout
    #[error("No frame within {0} ms")]
    Timeout(u64),

    /// `next_frame` was called before `open`
    #[error("Capture source is not open")]
    NotOpen,

    /// The requested source kind is not available in this build
    #[error("Capture source '{0}' is not supported in this build")]
    Unsupported(String),

    /// Pixel format the source cannot deliver
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// Frame compression failed
    #[error("Frame compression failed: {0}")]
    CompressionFailed(String),

    /// The network feed failed
    #[error(transparent)]
    Net(#[from] NetError),
}

// ============================================
// SINK ERRORS
// ============================================

/// Errors raised while handing one frame to an output.
///
/// These are per-item soft failures: the consumer loop logs them and
/// moves on to the next frame.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The output could not be opened
    #[error("Failed to open sink '{name}': {source}")]
    OpenFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Writing a frame failed
    #[error("Write failed on sink '{name}': {source}")]
    WriteFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The piped process exited unsuccessfully
    #[error("Process '{command}' exited with {status}")]
    ProcessExit { command: String, status: String },

    /// The receiving side of a channel sink went away
    #[error("Sink '{0}' has no receiver")]
    Disconnected(String),

    /// Forwarding over the network failed
    #[error(transparent)]
    Net(#[from] NetError),
}

// ============================================
// NETWORK ERRORS
// ============================================

/// The step of listener setup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Socket,
    SocketOption,
    Bind,
    Listen,
}

impl std::fmt::Display for SetupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Socket => "socket",
            Self::SocketOption => "setsockopt",
            Self::Bind => "bind",
            Self::Listen => "listen",
        };
        f.write_str(name)
    }
}

/// Errors from the reliable socket helpers.
#[derive(Debug, Error)]
pub enum NetError {
    /// Every send attempt failed
    #[error("Send failed after {attempts} attempt(s): {source}")]
    SendFailed {
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// The peer stopped accepting bytes (write returned 0)
    #[error("Peer accepted no bytes after {sent} of {total} sent")]
    SendStalled { sent: usize, total: usize },

    /// A receive call failed
    #[error("Receive failed after {received} byte(s): {source}")]
    ReceiveFailed {
        received: usize,
        #[source]
        source: io::Error,
    },

    /// The receive length is below the minimum or larger than the buffer
    #[error("Invalid receive length {requested} (minimum {minimum}, buffer {available})")]
    InvalidLength {
        requested: usize,
        minimum: usize,
        available: usize,
    },

    /// Creating a listening socket failed at `step`
    #[error("Listen on {addr} failed at {step}: {source}")]
    Setup {
        addr: SocketAddr,
        step: SetupStep,
        #[source]
        source: io::Error,
    },

    /// Accept kept failing
    #[error("Accept failed after {attempts} attempt(s): {source}")]
    AcceptFailed {
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// Address could not be resolved
    #[error("Cannot resolve address '{0}'")]
    BadAddress(String),

    /// Connecting to the peer failed
    #[error("Connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },
}

// ============================================
// RESULT TYPE ALIAS
// ============================================

/// A Result type that uses RelayError
pub type RelayResult<T> = Result<T, RelayError>;

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelayError::Capture(CaptureError::Timeout(2000));
        let message = format!("{}", err);
        assert!(message.contains("Capture"));
        assert!(message.contains("2000"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: RelayError = io_err.into();

        match err {
            RelayError::Io(_) => {} // Expected
            _ => panic!("Expected Io error variant"),
        }
    }

    #[test]
    fn test_net_error_nests_in_capture() {
        let net = NetError::BadAddress("nowhere".to_string());
        let err: RelayError = CaptureError::from(net).into();
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_setup_step_names() {
        let err = NetError::Setup {
            addr: "127.0.0.1:9".parse().unwrap(),
            step: SetupStep::Bind,
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("bind"));
    }
}
