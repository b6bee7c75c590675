//! # Reliable Socket I/O
//!
//! Blocking send/receive helpers plus listener setup.
//!
//! ## Plain English
//!
//! Networks hiccup. `send_all` keeps trying for a bounded number of
//! attempts with a pause in between; `receive_exact_or_eof` keeps reading
//! until it has the number of bytes asked for or the peer hangs up.
//! Neither adds any framing: bytes in, bytes out.
//!
//! Both work on any `Write`/`Read`, so a `TcpStream`, a pipe or a test
//! double all behave the same.

mod socket;

pub use socket::{accept_with_retry, connect, listen};

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use crate::error::NetError;

/// Smallest receive request accepted.
pub const MIN_RECEIVE_LENGTH: usize = 1;

/// Largest chunk a client/server pair may agree on.
pub const MAX_CHUNK_SIZE: usize = 8192;

// ============================================
// RETRY POLICY
// ============================================

/// How often and how patiently to retry a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,

    /// Sleep between failed attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, three seconds apart.
    fn default() -> Self {
        Self::new(3, Duration::from_millis(3000))
    }
}

/// Errors worth another attempt; anything else means the peer is gone.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

// ============================================
// SEND / RECEIVE
// ============================================

/// Writes all of `buf`, retrying transient failures.
///
/// Each failed write call counts as one attempt; after
/// `policy.attempts` consecutive failures the last error is returned.
/// Progress (a successful partial write) resets the count. Hard errors
/// such as `BrokenPipe` fail immediately.
pub fn send_all<W: Write + ?Sized>(
    writer: &mut W,
    buf: &[u8],
    policy: &RetryPolicy,
) -> Result<usize, NetError> {
    let mut sent = 0;
    let mut failures = 0u32;

    while sent < buf.len() {
        match writer.write(&buf[sent..]) {
            Ok(0) => {
                return Err(NetError::SendStalled {
                    sent,
                    total: buf.len(),
                })
            }
            Ok(n) => {
                sent += n;
                failures = 0;
            }
            Err(e) => {
                failures += 1;
                if !is_transient(&e) || failures >= policy.attempts {
                    log::warn!("Send failed after {} attempt(s): {}", failures, e);
                    return Err(NetError::SendFailed {
                        attempts: failures,
                        source: e,
                    });
                }
                log::debug!(
                    "Send attempt {} failed ({}), retrying in {:?}",
                    failures,
                    e,
                    policy.backoff
                );
                if !policy.backoff.is_zero() {
                    thread::sleep(policy.backoff);
                }
            }
        }
    }

    Ok(sent)
}

/// Reads until `max_length` bytes are in `buf` or the peer closes.
///
/// Returns the byte count accumulated, `0` on immediate EOF. Fails fast
/// when `max_length` is below [`MIN_RECEIVE_LENGTH`] or larger than `buf`.
pub fn receive_exact_or_eof<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    max_length: usize,
) -> Result<usize, NetError> {
    if max_length < MIN_RECEIVE_LENGTH || max_length > buf.len() {
        return Err(NetError::InvalidLength {
            requested: max_length,
            minimum: MIN_RECEIVE_LENGTH,
            available: buf.len(),
        });
    }

    let mut received = 0;
    while received < max_length {
        match reader.read(&mut buf[received..max_length]) {
            Ok(0) => break,
            Ok(n) => received += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(NetError::ReceiveFailed { received, source: e }),
        }
    }

    Ok(received)
}

/// Makes writes to a closed socket or pipe fail with `BrokenPipe`
/// instead of killing the process.
pub fn ignore_sigpipe() {
    #[cfg(unix)]
    {
        // SAFETY: installing SIG_IGN has no preconditions.
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        }
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Writer that fails `failures` times with `kind`, then accepts up to
    /// `chunk` bytes per call.
    struct FlakyWriter {
        failures: u32,
        kind: io::ErrorKind,
        chunk: usize,
        calls: u32,
        written: Vec<u8>,
    }

    impl FlakyWriter {
        fn new(failures: u32, kind: io::ErrorKind, chunk: usize) -> Self {
            Self {
                failures,
                kind,
                chunk,
                calls: 0,
                written: Vec::new(),
            }
        }
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.failures > 0 {
                self.failures -= 1;
                return Err(io::Error::new(self.kind, "flaky"));
            }
            let n = buf.len().min(self.chunk);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Reader that hands out data in fixed-size pieces.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        piece: usize,
        reads: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            let n = buf.len().min(self.piece).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO)
    }

    #[test]
    fn test_send_succeeds_after_transient_failures() {
        for k in 0..3 {
            let mut writer = FlakyWriter::new(k, io::ErrorKind::WouldBlock, usize::MAX);
            let sent = send_all(&mut writer, b"payload", &quick(3)).unwrap();

            assert_eq!(sent, 7);
            assert_eq!(writer.calls, k + 1);
            assert_eq!(writer.written, b"payload");
        }
    }

    #[test]
    fn test_send_gives_up_after_retry_limit() {
        for k in [3, 5] {
            let mut writer = FlakyWriter::new(k, io::ErrorKind::TimedOut, usize::MAX);
            let err = send_all(&mut writer, b"payload", &quick(3)).unwrap_err();

            assert_eq!(writer.calls, 3);
            match err {
                NetError::SendFailed { attempts, .. } => assert_eq!(attempts, 3),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_send_hard_error_fails_immediately() {
        let mut writer = FlakyWriter::new(2, io::ErrorKind::BrokenPipe, usize::MAX);
        let err = send_all(&mut writer, b"x", &quick(3)).unwrap_err();

        assert_eq!(writer.calls, 1);
        assert!(matches!(err, NetError::SendFailed { attempts: 1, .. }));
    }

    #[test]
    fn test_send_handles_partial_writes() {
        let mut writer = FlakyWriter::new(0, io::ErrorKind::Other, 3);
        let sent = send_all(&mut writer, b"0123456789", &quick(1)).unwrap();

        assert_eq!(sent, 10);
        assert_eq!(writer.calls, 4);
        assert_eq!(writer.written, b"0123456789");
    }

    #[test]
    fn test_send_stalled_peer() {
        let mut full: &mut [u8] = &mut [];
        let err = send_all(&mut full, b"abc", &quick(3)).unwrap_err();
        assert!(matches!(err, NetError::SendStalled { sent: 0, total: 3 }));
    }

    #[test]
    fn test_receive_stops_at_eof() {
        let mut reader = Trickle {
            data: b"short".to_vec(),
            pos: 0,
            piece: 2,
            reads: 0,
        };
        let mut buf = [0u8; 64];

        let n = receive_exact_or_eof(&mut reader, &mut buf, 64).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf[..n], b"short");
    }

    #[test]
    fn test_receive_stops_at_max_length() {
        let mut reader = Trickle {
            data: vec![7u8; 100],
            pos: 0,
            piece: 3,
            reads: 0,
        };
        let mut buf = [0u8; 64];

        let n = receive_exact_or_eof(&mut reader, &mut buf, 10).unwrap();
        assert_eq!(n, 10);
        assert_eq!(reader.pos, 10);
        assert_eq!(reader.reads, 4);
    }

    #[test]
    fn test_receive_immediate_eof_is_zero() {
        let mut reader = Cursor::new(Vec::new());
        let mut buf = [0u8; 8];
        assert_eq!(receive_exact_or_eof(&mut reader, &mut buf, 8).unwrap(), 0);
    }

    #[test]
    fn test_receive_rejects_bad_lengths() {
        let mut reader = Cursor::new(vec![1u8; 8]);
        let mut buf = [0u8; 8];

        let zero = receive_exact_or_eof(&mut reader, &mut buf, 0).unwrap_err();
        assert!(matches!(zero, NetError::InvalidLength { requested: 0, .. }));

        let too_big = receive_exact_or_eof(&mut reader, &mut buf, 9).unwrap_err();
        assert!(matches!(too_big, NetError::InvalidLength { requested: 9, .. }));
    }

    #[test]
    fn test_receive_hard_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }

        let mut buf = [0u8; 4];
        let err = receive_exact_or_eof(&mut Broken, &mut buf, 4).unwrap_err();
        assert!(matches!(err, NetError::ReceiveFailed { received: 0, .. }));
    }
}
