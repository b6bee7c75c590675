//! Video4Linux2 capture through memory-mapped streaming buffers.

use std::io;
use std::time::Duration;

use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::{CaptureSource, PixelFormat};
use crate::config::Config;
use crate::error::CaptureError;

/// Driver buffers queued for streaming
const BUFFER_COUNT: u32 = 4;

pub struct V4l2Source {
    path: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    timeout: Option<Duration>,

    // Field order matters: the stream is dropped before the device
    stream: Option<MmapStream<'static>>,
    device: Option<Device>,
}

impl V4l2Source {
    pub fn from_config(config: &Config) -> Self {
        Self {
            path: config.device.clone(),
            width: config.width,
            height: config.height,
            format: config.pixel_format,
            timeout: config.source_timeout(),
            stream: None,
            device: None,
        }
    }

    fn open_failed(&self, reason: impl ToString) -> CaptureError {
        CaptureError::OpenFailed {
            source_name: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl CaptureSource for V4l2Source {
    fn open(&mut self) -> Result<(), CaptureError> {
        let device = Device::with_path(&self.path).map_err(|e| self.open_failed(e))?;

        let caps = device.query_caps().map_err(|e| self.open_failed(e))?;
        log::info!("Device: {} ({})", caps.card, caps.driver);
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(self.open_failed("device doesn't support video capture"));
        }

        let mut fmt = device.format().map_err(|e| self.open_failed(e))?;
        fmt.width = self.width;
        fmt.height = self.height;
        fmt.fourcc = FourCC::new(&self.format.fourcc());
        let actual = device.set_format(&fmt).map_err(|e| self.open_failed(e))?;

        if actual.fourcc.repr != self.format.fourcc() {
            return Err(CaptureError::UnsupportedFormat(format!("{:?}", self.format)));
        }
        if actual.width != self.width || actual.height != self.height {
            log::warn!(
                "Device adjusted size to {}x{} (asked {}x{})",
                actual.width,
                actual.height,
                self.width,
                self.height
            );
        }

        let mut stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| self.open_failed(e))?;
        if let Some(timeout) = self.timeout {
            stream.set_timeout(timeout);
        }

        self.stream = Some(stream);
        self.device = Some(device);
        log::info!("Capture stream started with {} buffers", BUFFER_COUNT);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<&[u8]>, CaptureError> {
        let timeout_ms = self.timeout.map(|t| t.as_millis() as u64).unwrap_or(0);
        let stream = self.stream.as_mut().ok_or(CaptureError::NotOpen)?;

        let (buf, meta) = stream.next().map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => CaptureError::Timeout(timeout_ms),
            _ => CaptureError::ReadFailed(e.to_string()),
        })?;

        let used = (meta.bytesused as usize).min(buf.len());
        Ok(Some(&buf[..used]))
    }

    fn close(&mut self) {
        self.stream = None;
        if self.device.take().is_some() {
            log::info!("Closed V4L2 device {}", self.path);
        }
    }

    fn source_name(&self) -> &'static str {
        "V4L2"
    }
}
