//! # Frame Capture Module
//!
//! Pluggable frame sources feeding the pipeline's producer.
//!
//! ## Plain English
//!
//! Something has to make frames: a camera, a network peer, or a test
//! pattern generator. Each of those is a [`CaptureSource`]. The capture
//! loop only ever asks a source for "the next frame, please", so the
//! pipeline never needs to know which kind it is talking to.
//!
//! ```text
//!   ┌────────────┐   next_frame()   ┌────────────┐   push    ┌──────┐
//!   │  Source    │ ───────────────▶ │  Producer  │ ────────▶ │ Ring │
//!   │ (device)   │     &[u8]        │  (chunks)  │           └──────┘
//!   └────────────┘                  └────────────┘
//! ```

mod simulated;
mod tcp;
#[cfg(feature = "v4l2")]
mod v4l2;

pub use simulated::{CompressionError, FrameCompressor, TestSource};
pub use tcp::TcpSource;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Source;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::CaptureError;

// ============================================
// FORMATS AND KINDS
// ============================================

/// Pixel/encoding formats a source may deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed 8-bit RGB, 3 bytes per pixel
    Rgb24,
    /// Packed YUV 4:2:2, 2 bytes per pixel
    Yuyv,
    /// Motion JPEG, one JPEG image per frame
    Mjpeg,
}

impl PixelFormat {
    /// Uncompressed frame size, `None` for compressed formats.
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        let pixels = width as usize * height as usize;
        match self {
            Self::Rgb24 => Some(pixels * 3),
            Self::Yuyv => Some(pixels * 2),
            Self::Mjpeg => None,
        }
    }

    /// V4L2 FourCC code.
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Rgb24 => *b"RGB3",
            Self::Yuyv => *b"YUYV",
            Self::Mjpeg => *b"MJPG",
        }
    }
}

/// Which source to build at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Generated test pattern
    Test,
    /// Video4Linux2 device (cargo feature `v4l2`)
    V4l2,
    /// OpenCV capture; recognised but not built into this crate
    OpenCv,
    /// Byte stream from a TCP peer
    Tcp,
}

// ============================================
// COMMON INTERFACE
// ============================================

/// A producer of raw frames.
///
/// Sources run on the capture thread only; they are `Send` so they can be
/// moved there, never shared.
pub trait CaptureSource: Send {
    /// Acquires the device/connection. Called once before `next_frame`.
    fn open(&mut self) -> Result<(), CaptureError>;

    /// Blocks until the next frame is available.
    ///
    /// `Ok(None)` means the source is exhausted (end of stream). The
    /// returned bytes are only borrowed until the next call.
    fn next_frame(&mut self) -> Result<Option<&[u8]>, CaptureError>;

    /// Releases the device/connection.
    fn close(&mut self) {}

    /// The name of this capture source (for logging).
    fn source_name(&self) -> &'static str;
}

// ============================================
// FACTORY FUNCTION
// ============================================

/// Creates the capture source selected by `config.source`.
pub fn create_source(config: &Config) -> Result<Box<dyn CaptureSource>, CaptureError> {
    match config.source {
        SourceKind::Test => {
            log::info!(
                "Source: test pattern {}x{} {:?} @ {} FPS",
                config.width,
                config.height,
                config.pixel_format,
                config.fps
            );
            Ok(Box::new(TestSource::from_config(config)))
        }
        SourceKind::Tcp => {
            log::info!(
                "Source: TCP {} {}",
                if config.source_listen { "listen" } else { "connect" },
                config.source_address
            );
            Ok(Box::new(TcpSource::from_config(config)))
        }
        SourceKind::V4l2 => create_v4l2(config),
        SourceKind::OpenCv => Err(CaptureError::Unsupported("opencv".to_string())),
    }
}

#[cfg(feature = "v4l2")]
fn create_v4l2(config: &Config) -> Result<Box<dyn CaptureSource>, CaptureError> {
    log::info!("Source: V4L2 device {}", config.device);
    Ok(Box::new(V4l2Source::from_config(config)))
}

#[cfg(not(feature = "v4l2"))]
fn create_v4l2(_config: &Config) -> Result<Box<dyn CaptureSource>, CaptureError> {
    Err(CaptureError::Unsupported("v4l2".to_string()))
}

// ============================================
// TESTS
// ============================================
