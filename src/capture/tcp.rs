//! Byte-stream source: frames are fixed-size chunks read from a TCP peer.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use super::CaptureSource;
use crate::config::Config;
use crate::error::{CaptureError, NetError};
use crate::net::{self, receive_exact_or_eof};

/// Reads `chunk_size` bytes per frame from one TCP peer.
///
/// In listen mode the source binds `address` and accepts a single
/// connection; otherwise it connects out to `address`. A short final
/// chunk is delivered as-is, and a clean peer shutdown ends the stream.
pub struct TcpSource {
    address: String,
    listen: bool,
    backlog: i32,
    accept_retries: u32,
    chunk_size: usize,

    /// Read timeout; hitting it is fatal
    timeout: Option<Duration>,

    stream: Option<TcpStream>,
    buffer: Vec<u8>,
}

impl TcpSource {
    pub fn new(address: impl Into<String>, listen: bool) -> Self {
        Self {
            address: address.into(),
            listen,
            backlog: 10,
            accept_retries: 3,
            chunk_size: crate::config::DEFAULT_NET_CHUNK_SIZE,
            timeout: None,
            stream: None,
            buffer: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut source = Self::new(config.source_address.clone(), config.source_listen)
            .with_chunk_size(config.net_chunk_size);
        source.backlog = config.listen_backlog;
        source.accept_retries = config.accept_retries;
        source.timeout = config.source_timeout();
        source
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Address of the connected peer, once open.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    fn establish(&self) -> Result<TcpStream, NetError> {
        if !self.listen {
            return net::connect(&self.address);
        }
        let addr: SocketAddr = self
            .address
            .parse()
            .map_err(|_| NetError::BadAddress(self.address.clone()))?;
        let listener = net::listen(addr, self.backlog)?;
        let (stream, _peer) = net::accept_with_retry(&listener, self.accept_retries)?;
        Ok(stream)
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.map(|t| t.as_millis() as u64).unwrap_or(0)
    }
}

impl CaptureSource for TcpSource {
    fn open(&mut self) -> Result<(), CaptureError> {
        let stream = self.establish()?;
        stream
            .set_read_timeout(self.timeout)
            .map_err(|e| CaptureError::OpenFailed {
                source_name: self.source_name().to_string(),
                reason: e.to_string(),
            })?;

        self.buffer = vec![0u8; self.chunk_size];
        self.stream = Some(stream);
        log::info!(
            "TCP source open on {} ({}-byte chunks)",
            self.address,
            self.chunk_size
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<&[u8]>, CaptureError> {
        let timeout_ms = self.timeout_ms();
        let stream = self.stream.as_mut().ok_or(CaptureError::NotOpen)?;

        match receive_exact_or_eof(stream, &mut self.buffer, self.chunk_size) {
            Ok(0) => {
                log::info!("TCP peer closed the stream");
                Ok(None)
            }
            Ok(n) => Ok(Some(&self.buffer[..n])),
            Err(NetError::ReceiveFailed { source, .. })
                if matches!(
                    source.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Err(CaptureError::Timeout(timeout_ms))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            log::info!("TCP source closed");
        }
    }

    fn source_name(&self) -> &'static str {
        "TCP"
    }
}

// ============================================
// TESTS
// ============================================
