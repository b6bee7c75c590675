//! # Configuration Module
//!
//! This module handles all configurable settings for Frame Relay.
//!
//! ## Plain English Explanation
//!
//! The relay is read-once configured: everything here is looked at when
//! the pipeline starts and never again while it runs. Settings include:
//! - Which capture source to use and in what pixel format
//! - How big the ring buffers are
//! - When to stop (frame-count limit)
//! - Where frames go (file, piped process, network peer, preview)
//! - Whether to profile, and how often to report
//!
//! A config can be built in code, from a preset, or loaded from a JSON
//! document. Fields missing from the document keep their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::{PixelFormat, SourceKind};
use crate::net::{RetryPolicy, MAX_CHUNK_SIZE, MIN_RECEIVE_LENGTH};

/// Default socket chunk size shared by client and server.
pub const DEFAULT_NET_CHUNK_SIZE: usize = 64;

/// Default maximum size of one frame buffer (4 MiB).
pub const DEFAULT_FRAME_CAPACITY: usize = 4 * 1024 * 1024;

// ============================================
// MAIN CONFIGURATION
// ============================================

/// All configuration options for Frame Relay
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ----------------------------------------
    // SOURCE SETTINGS
    // "Where frames come from"
    // ----------------------------------------
    /// Which capture source to open
    pub source: SourceKind,

    /// Device path for V4L2 sources (e.g. `/dev/video0`)
    pub device: String,

    /// Address for TCP sources
    pub source_address: String,

    /// TCP source role: listen and accept one peer, or connect out
    pub source_listen: bool,

    /// Pixel/encoding format requested from the source
    pub pixel_format: PixelFormat,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Source pacing in frames per second (0 = as fast as possible)
    pub fps: u32,

    /// Readiness timeout for blocking source reads (0 = wait forever)
    pub source_timeout_ms: u64,

    // ----------------------------------------
    // PIPELINE SETTINGS
    // "How much to hold, when to stop"
    // ----------------------------------------
    /// Capacity of the capture (input) ring buffer
    pub ring_capacity: usize,

    /// Capacity of each per-sink ring buffer
    pub sink_ring_capacity: usize,

    /// Largest single frame buffer; bigger source frames are chunked
    pub frame_capacity: usize,

    /// Stop after this many source frames (0 = run until stopped)
    pub frame_limit: u64,

    // ----------------------------------------
    // OUTPUT SETTINGS
    // "Where frames go"
    // ----------------------------------------
    /// Raw output file (a directory gets a timestamped file name)
    pub output_file: Option<PathBuf>,

    /// Shell command that receives frames on stdin
    pub output_command: Option<String>,

    /// Peer address that receives frames over TCP
    pub forward_address: Option<String>,

    /// Offer frames on a preview channel for a UI
    pub preview_enabled: bool,

    /// How many frames the preview channel may hold
    pub preview_depth: usize,

    // ----------------------------------------
    // NETWORK SETTINGS
    // ----------------------------------------
    /// Bytes moved per socket receive
    pub net_chunk_size: usize,

    /// Attempts per send before giving up
    pub send_attempts: u32,

    /// Sleep between send attempts
    pub send_backoff_ms: u64,

    /// Failed accepts retried before giving up (`0` = a single attempt)
    pub accept_retries: u32,

    /// Listen backlog
    pub listen_backlog: i32,

    // ----------------------------------------
    // PROFILING SETTINGS
    // ----------------------------------------
    /// Run the profiler consumer
    pub profiling_enabled: bool,

    /// Interval between profile snapshots
    pub profile_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Source: synthetic frames, VGA-ish RGB at 30 FPS
            source: SourceKind::Test,
            device: "/dev/video0".to_string(),
            source_address: "127.0.0.1:5000".to_string(),
            source_listen: true,
            pixel_format: PixelFormat::Rgb24,
            width: 640,
            height: 480,
            fps: 30,
            source_timeout_ms: 5000,

            // Pipeline: a second of frames per queue, run until stopped
            ring_capacity: 32,
            sink_ring_capacity: 32,
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            frame_limit: 0,

            // Output: nothing until asked for
            output_file: None,
            output_command: None,
            forward_address: None,
            preview_enabled: false,
            preview_depth: 4,

            // Network: 64-byte chunks, 3 attempts 3 s apart
            net_chunk_size: DEFAULT_NET_CHUNK_SIZE,
            send_attempts: 3,
            send_backoff_ms: 3000,
            accept_retries: 3,
            listen_backlog: 10,

            // Profiling: off, one report per second when on
            profiling_enabled: false,
            profile_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Small queues and no pacing: frames are dropped rather than delayed.
    pub fn low_latency() -> Self {
        Self {
            ring_capacity: 4,
            sink_ring_capacity: 4,
            preview_depth: 1,
            ..Self::default()
        }
    }

    /// Receive chunks from a TCP peer and forward them to another.
    pub fn network_relay(listen: &str, forward: &str) -> Self {
        Self {
            source: SourceKind::Tcp,
            source_address: listen.to_string(),
            source_listen: true,
            source_timeout_ms: 0,
            forward_address: Some(forward.to_string()),
            net_chunk_size: MAX_CHUNK_SIZE,
            ..Self::default()
        }
    }

    /// Parses a JSON document; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validates the configuration and returns errors if invalid
    ///
    /// Returns a list of problems, or empty if all is well.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.ring_capacity == 0 {
            errors.push(ConfigError::ZeroCapacity("ring_capacity"));
        }
        if self.sink_ring_capacity == 0 {
            errors.push(ConfigError::ZeroCapacity("sink_ring_capacity"));
        }
        if self.frame_capacity == 0 {
            errors.push(ConfigError::ZeroCapacity("frame_capacity"));
        }
        if self.preview_enabled && self.preview_depth == 0 {
            errors.push(ConfigError::ZeroCapacity("preview_depth"));
        }

        if self.net_chunk_size < MIN_RECEIVE_LENGTH || self.net_chunk_size > MAX_CHUNK_SIZE {
            errors.push(ConfigError::ChunkSizeOutOfRange(self.net_chunk_size));
        }

        if self.send_attempts == 0 {
            errors.push(ConfigError::ZeroAttempts("send_attempts"));
        }

        if self.profiling_enabled && self.profile_interval_ms == 0 {
            errors.push(ConfigError::ZeroInterval);
        }

        if self.source == SourceKind::Test && (self.width == 0 || self.height == 0) {
            errors.push(ConfigError::InvalidDimensions(self.width, self.height));
        }

        errors
    }

    /// Retry policy for network sends.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.send_attempts, Duration::from_millis(self.send_backoff_ms))
    }

    /// Readiness timeout for source reads, if any.
    pub fn source_timeout(&self) -> Option<Duration> {
        (self.source_timeout_ms > 0).then(|| Duration::from_millis(self.source_timeout_ms))
    }

    /// Interval between profile snapshots.
    pub fn profile_interval(&self) -> Duration {
        Duration::from_millis(self.profile_interval_ms)
    }
}

// ============================================
// CONFIGURATION ERRORS
// ============================================

/// Errors that can occur with configuration values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A queue or buffer size is zero
    #[error("{0} must be at least 1")]
    ZeroCapacity(&'static str),

    /// Socket chunk size outside 1..=8192
    #[error("Chunk size {0} is outside valid range (1-8192)")]
    ChunkSizeOutOfRange(usize),

    /// A retry count is zero
    #[error("{0} must be at least 1")]
    ZeroAttempts(&'static str),

    /// Profiling enabled with a zero interval
    #[error("Profile interval must be greater than zero")]
    ZeroInterval,

    /// Test frames need a non-empty size
    #[error("Frame size {0}x{1} is invalid")]
    InvalidDimensions(u32, u32),

    /// The config file could not be read
    #[error("Cannot read config '{path}': {reason}")]
    Read { path: String, reason: String },

    /// The config document is malformed
    #[error("Cannot parse config: {0}")]
    Parse(String),
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.source, SourceKind::Test);
        assert_eq!(config.net_chunk_size, 64);
        assert_eq!(config.frame_limit, 0);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(Config::low_latency().validate().is_empty());
        let relay = Config::network_relay("0.0.0.0:5000", "127.0.0.1:6000");
        assert!(relay.validate().is_empty());
        assert_eq!(relay.net_chunk_size, 8192);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();

        config.ring_capacity = 0;
        assert_eq!(
            config.validate(),
            vec![ConfigError::ZeroCapacity("ring_capacity")]
        );

        config.ring_capacity = 8;
        config.net_chunk_size = 9000;
        assert_eq!(config.validate(), vec![ConfigError::ChunkSizeOutOfRange(9000)]);

        config.net_chunk_size = 0;
        assert!(!config.validate().is_empty());

        config.net_chunk_size = 64;
        config.profiling_enabled = true;
        config.profile_interval_ms = 0;
        assert_eq!(config.validate(), vec![ConfigError::ZeroInterval]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json_str(
            r#"{ "ring_capacity": 10, "frame_limit": 50, "pixel_format": "mjpeg" }"#,
        )
        .unwrap();

        assert_eq!(config.ring_capacity, 10);
        assert_eq!(config.frame_limit, 50);
        assert_eq!(config.pixel_format, PixelFormat::Mjpeg);
        assert_eq!(config.send_attempts, 3);
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let err = Config::from_json_str("{ ring_capacity: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "source": "tcp", "source_address": "127.0.0.1:7000" }}"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.source, SourceKind::Tcp);
        assert_eq!(config.source_address, "127.0.0.1:7000");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = Config::default();
        let policy = config.retry_policy();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.backoff, Duration::from_millis(3000));
        assert_eq!(config.source_timeout(), Some(Duration::from_millis(5000)));
    }
}
