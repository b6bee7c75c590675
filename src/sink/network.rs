//! Frames forwarded to a TCP peer.

use std::net::{Shutdown, TcpStream};

use super::FrameSink;
use crate::buffer::FrameHandle;
use crate::error::SinkError;
use crate::net::{self, send_all, RetryPolicy};

/// Sends each frame's valid bytes to one peer, unframed.
///
/// Sends use the reliable-send retry policy. Once a send has failed for
/// good the connection is dropped and later frames fail fast.
pub struct NetworkSink {
    address: String,
    stream: Option<TcpStream>,
    policy: RetryPolicy,
}

impl NetworkSink {
    pub fn connect(address: &str, policy: RetryPolicy) -> Result<Self, SinkError> {
        let stream = net::connect(address)?;
        Ok(Self::from_stream(address, stream, policy))
    }

    /// Wraps an already-connected stream.
    pub fn from_stream(address: &str, stream: TcpStream, policy: RetryPolicy) -> Self {
        let _ = stream.set_nodelay(true);
        Self {
            address: address.to_string(),
            stream: Some(stream),
            policy,
        }
    }
}

impl FrameSink for NetworkSink {
    fn name(&self) -> &str {
        "network"
    }

    fn consume(&mut self, frame: &FrameHandle) -> Result<usize, SinkError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| SinkError::Disconnected(self.address.clone()))?;

        match send_all(stream, frame.data(), &self.policy) {
            Ok(sent) => Ok(sent),
            Err(e) => {
                log::error!("Forwarding to {} failed, dropping connection", self.address);
                self.stream = None;
                Err(e.into())
            }
        }
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Write);
            log::info!("Closed connection to {}", self.address);
        }
        Ok(())
    }
}

// ============================================
// TESTS
// ============================================
