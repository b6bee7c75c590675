//! # Frame Buffers
//!
//! One captured frame (or one socket read) as a fixed-capacity byte buffer.
//!
//! ## Plain English
//!
//! A frame buffer is a box of a fixed size with a line drawn on the
//! inside marking how full it is (the "valid length"). Whoever fills the
//! box is its only owner until it is sealed and handed over; after that
//! anyone can look inside, nobody can write.
//!
//! The only way to get a box is through one of the `create*` factories,
//! which hand back a [`FrameHandle`]. Sharing goes through
//! [`FrameHandle::clone_handle`]. Writes go through the handle and only
//! succeed while it is the sole handle, so a published frame cannot be
//! mutated.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================
// FRAME BUFFER
// ============================================

/// Fixed-capacity byte storage plus a valid-length marker.
pub struct FrameBuffer {
    /// Backing storage, `capacity` bytes long
    data: Box<[u8]>,

    /// Number of meaningful leading bytes
    valid_length: usize,

    /// Producer-assigned sequence number
    sequence: u64,

    /// Capture time in nanoseconds since the Unix epoch
    timestamp_ns: u64,
}

impl FrameBuffer {
    fn with_storage(data: Box<[u8]>, valid_length: usize) -> Self {
        Self {
            data,
            valid_length,
            sequence: 0,
            timestamp_ns: now_ns(),
        }
    }

    /// Allocates an empty buffer of `capacity` bytes.
    pub fn create(capacity: usize) -> FrameHandle {
        FrameHandle::new(Self::with_storage(vec![0u8; capacity].into_boxed_slice(), 0))
    }

    /// Deep copy of `existing`, metadata included.
    pub fn create_copy(existing: &FrameBuffer) -> FrameHandle {
        FrameHandle::new(Self {
            data: existing.data.clone(),
            valid_length: existing.valid_length,
            sequence: existing.sequence,
            timestamp_ns: existing.timestamp_ns,
        })
    }

    /// Copies externally owned bytes (a driver buffer, a socket scratch
    /// area) into a new buffer whose capacity and valid length are both
    /// `bytes.len()`.
    pub fn create_from_slice(bytes: &[u8]) -> FrameHandle {
        FrameHandle::new(Self::with_storage(bytes.into(), bytes.len()))
    }

    /// The valid bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.valid_length]
    }

    /// The whole storage, including bytes past the valid length.
    pub fn storage(&self) -> &[u8] {
        &self.data
    }

    pub fn valid_length(&self) -> usize {
        self.valid_length
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// An empty frame carries no data and must not be forwarded.
    pub fn is_empty(&self) -> bool {
        self.valid_length == 0
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("sequence", &self.sequence)
            .field("valid_length", &self.valid_length)
            .field("capacity", &self.capacity())
            .finish()
    }
}

// ============================================
// FRAME HANDLE
// ============================================

/// Reference-counted handle to a [`FrameBuffer`].
///
/// Cloning the handle never copies frame bytes.
#[derive(Clone, Debug)]
pub struct FrameHandle(Arc<FrameBuffer>);

impl FrameHandle {
    fn new(buffer: FrameBuffer) -> Self {
        Self(Arc::new(buffer))
    }

    /// Another handle to the same storage.
    pub fn clone_handle(&self) -> FrameHandle {
        Self(Arc::clone(&self.0))
    }

    /// Number of live handles to this buffer.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// True while this is the only handle, i.e. before publication.
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.0) == 1
    }

    /// Whether both handles point at the same buffer.
    pub fn same_buffer(&self, other: &FrameHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Writable storage; `None` once the buffer is shared.
    pub fn storage_mut(&mut self) -> Option<&mut [u8]> {
        Arc::get_mut(&mut self.0).map(|buffer| &mut buffer.data[..])
    }

    /// Records how many leading bytes are meaningful.
    ///
    /// Returns `false` and leaves the buffer unchanged when `n` exceeds
    /// the capacity or the buffer is already shared.
    pub fn set_valid_length(&mut self, n: usize) -> bool {
        match Arc::get_mut(&mut self.0) {
            Some(buffer) if n <= buffer.capacity() => {
                buffer.valid_length = n;
                true
            }
            _ => false,
        }
    }

    /// Stamps the producer sequence number; `false` once shared.
    pub fn set_sequence(&mut self, sequence: u64) -> bool {
        match Arc::get_mut(&mut self.0) {
            Some(buffer) => {
                buffer.sequence = sequence;
                true
            }
            None => false,
        }
    }
}

impl Deref for FrameHandle {
    type Target = FrameBuffer;

    fn deref(&self) -> &FrameBuffer {
        &self.0
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

// ============================================
// TESTS
// ============================================
