//! # Simulated Frame Capture
//!
//! Generates test pattern frames for exercising the pipeline.
//! Used when no device is available, and by tests.

use std::thread;
use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

use super::{CaptureSource, PixelFormat};
use crate::config::Config;
use crate::error::CaptureError;

// ============================================
// TEST SOURCE
// ============================================

/// Test-pattern source.
///
/// Uncompressed frames carry their frame number in the first eight bytes
/// (little endian), so consumers can tell frames apart.
pub struct TestSource {
    format: PixelFormat,
    width: u32,
    height: u32,
    fps: u32,

    /// Stop after this many frames (`None` = endless)
    frame_count: Option<u64>,

    frame_number: u64,
    compressor: FrameCompressor,
    buffer: Vec<u8>,
    scratch: Vec<u8>,
    started: Option<Instant>,
}

impl TestSource {
    /// Creates an unpaced RGB source of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            format: PixelFormat::Rgb24,
            width,
            height,
            fps: 0,
            frame_count: None,
            frame_number: 0,
            compressor: FrameCompressor::default(),
            buffer: Vec::new(),
            scratch: Vec::new(),
            started: None,
        }
    }

    /// Takes format, size and pacing from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.width, config.height)
            .with_format(config.pixel_format)
            .with_fps(config.fps)
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Paces frames at `fps` (0 = as fast as possible).
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Ends the stream after `count` frames.
    pub fn with_frame_count(mut self, count: u64) -> Self {
        self.frame_count = Some(count);
        self
    }

    /// Frames produced so far.
    pub fn frames_generated(&self) -> u64 {
        self.frame_number
    }

    fn pace(&self) {
        let (Some(started), true) = (self.started, self.fps > 0) else {
            return;
        };
        let frame_duration = Duration::from_micros(1_000_000 / self.fps as u64);
        let expected = frame_duration * self.frame_number as u32;
        let elapsed = started.elapsed();
        if expected > elapsed {
            thread::sleep(expected - elapsed);
        }
    }

    fn render(&mut self) -> Result<(), CaptureError> {
        let n = self.frame_number;
        match self.format {
            PixelFormat::Rgb24 => {
                fill_rgb(&mut self.buffer, self.width, self.height, n);
                stamp(&mut self.buffer, n);
            }
            PixelFormat::Yuyv => {
                fill_yuyv(&mut self.buffer, self.width, self.height, n);
                stamp(&mut self.buffer, n);
            }
            PixelFormat::Mjpeg => {
                fill_rgb(&mut self.scratch, self.width, self.height, n);
                self.buffer = self
                    .compressor
                    .compress(&self.scratch, self.width, self.height)
                    .map_err(|e| CaptureError::CompressionFailed(e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl CaptureSource for TestSource {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::OpenFailed {
                source_name: self.source_name().to_string(),
                reason: format!("invalid frame size {}x{}", self.width, self.height),
            });
        }
        log::info!(
            "Test source started: {}x{} {:?} @ {} FPS",
            self.width,
            self.height,
            self.format,
            self.fps
        );
        self.started = Some(Instant::now());
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<&[u8]>, CaptureError> {
        if self.started.is_none() {
            return Err(CaptureError::NotOpen);
        }
        if self.frame_count.is_some_and(|count| self.frame_number >= count) {
            return Ok(None);
        }

        self.pace();
        self.render()?;
        self.frame_number += 1;

        // Log progress periodically
        if self.fps > 0 && self.frame_number % (self.fps as u64 * 5) == 0 {
            log::debug!("Test source: {} frames generated", self.frame_number);
        }

        Ok(Some(&self.buffer))
    }

    fn close(&mut self) {
        if self.started.take().is_some() {
            log::info!("Test source stopped after {} frames", self.frame_number);
        }
    }

    fn source_name(&self) -> &'static str {
        "Test"
    }
}

fn fill_rgb(buffer: &mut Vec<u8>, width: u32, height: u32, frame: u64) {
    buffer.resize(width as usize * height as usize * 3, 0);
    let shift = frame as usize;
    for y in 0..height as usize {
        for x in 0..width as usize {
            let idx = (y * width as usize + x) * 3;
            buffer[idx] = ((x + shift) % 256) as u8;
            buffer[idx + 1] = ((y + shift) % 256) as u8;
            buffer[idx + 2] = (shift % 256) as u8;
        }
    }
}

fn fill_yuyv(buffer: &mut Vec<u8>, width: u32, height: u32, frame: u64) {
    buffer.resize(width as usize * height as usize * 2, 0);
    let shift = frame as usize;
    for (i, pair) in buffer.chunks_exact_mut(4).enumerate() {
        let luma = ((i * 2 + shift) % 256) as u8;
        pair.copy_from_slice(&[luma, 128, luma.wrapping_add(1), 128]);
    }
}

fn stamp(buffer: &mut [u8], frame: u64) {
    if buffer.len() >= 8 {
        buffer[..8].copy_from_slice(&frame.to_le_bytes());
    }
}

// ============================================
// FRAME COMPRESSOR
// ============================================

/// Compresses raw RGB pixel data to JPEG.
pub struct FrameCompressor {
    /// JPEG quality (1-100)
    quality: u8,
}

impl FrameCompressor {
    /// Creates a new compressor.
    ///
    /// ## Quality Guidelines
    /// - 90-100: Visually lossless, larger files
    /// - 70-85: Good quality, reasonable size (80 recommended)
    /// - 50-70: Noticeable artifacts, small files
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Compresses packed RGB (3 bytes per pixel) to JPEG.
    pub fn compress(
        &self,
        raw_rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, CompressionError> {
        let expected = width as usize * height as usize * 3;
        if raw_rgb.len() != expected {
            return Err(CompressionError::InvalidSize {
                expected,
                got: raw_rgb.len(),
            });
        }

        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, self.quality)
            .encode(raw_rgb, width, height, ColorType::Rgb8)
            .map_err(|e| CompressionError::EncodingFailed(e.to_string()))?;
        Ok(output)
    }

    /// Returns the quality setting.
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for FrameCompressor {
    fn default() -> Self {
        Self::new(80)
    }
}

/// Errors during frame compression.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    /// Input data size doesn't match dimensions
    #[error("Invalid size: expected {expected} bytes, got {got}")]
    InvalidSize { expected: usize, got: usize },

    /// JPEG encoding failed
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_number(frame: &[u8]) -> u64 {
        u64::from_le_bytes(frame[..8].try_into().unwrap())
    }

    #[test]
    fn test_requires_open() {
        let mut source = TestSource::new(8, 8);
        assert!(matches!(source.next_frame(), Err(CaptureError::NotOpen)));
    }

    #[test]
    fn test_rgb_frames_are_numbered() {
        let mut source = TestSource::new(16, 4);
        source.open().unwrap();

        for expected in 0..3 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.len(), 16 * 4 * 3);
            assert_eq!(frame_number(frame), expected);
        }
        assert_eq!(source.frames_generated(), 3);
    }

    #[test]
    fn test_yuyv_size() {
        let mut source = TestSource::new(8, 2).with_format(PixelFormat::Yuyv);
        source.open().unwrap();
        assert_eq!(source.next_frame().unwrap().unwrap().len(), 32);
    }

    #[test]
    fn test_frame_count_ends_stream() {
        let mut source = TestSource::new(4, 4).with_frame_count(2);
        source.open().unwrap();

        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_mjpeg_frames_are_jpeg() {
        let mut source = TestSource::new(32, 32).with_format(PixelFormat::Mjpeg);
        source.open().unwrap();

        let frame = source.next_frame().unwrap().unwrap();
        // JPEG SOI marker
        assert_eq!(&frame[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_zero_size_fails_open() {
        let mut source = TestSource::new(0, 10);
        assert!(matches!(source.open(), Err(CaptureError::OpenFailed { .. })));
    }

    #[test]
    fn test_pacing_slows_frames() {
        let mut source = TestSource::new(4, 4).with_fps(100);
        source.open().unwrap();

        let start = Instant::now();
        for _ in 0..4 {
            source.next_frame().unwrap();
        }
        // Frames 1..3 are each due 10 ms after the previous one
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_compressor_quality() {
        assert_eq!(FrameCompressor::new(80).quality(), 80);
        assert_eq!(FrameCompressor::new(150).quality(), 100);
        assert_eq!(FrameCompressor::new(0).quality(), 1);
    }

    #[test]
    fn test_compression_invalid_size() {
        let compressor = FrameCompressor::new(80);
        let result = compressor.compress(&[0u8; 100], 100, 100);
        assert!(matches!(result, Err(CompressionError::InvalidSize { .. })));
    }
}
