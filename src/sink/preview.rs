//! Frame handles offered to a UI over a bounded channel.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use super::FrameSink;
use crate::buffer::FrameHandle;
use crate::error::SinkError;

/// Receiving end handed to the UI.
pub type PreviewReceiver = Receiver<FrameHandle>;

/// Offers shared frame handles to a preview consumer.
///
/// Never blocks: when the channel is full the frame is skipped, so a
/// lagging UI only ever sees fewer frames.
pub struct PreviewSink {
    sender: Sender<FrameHandle>,
    skipped: u64,
}

impl PreviewSink {
    /// Creates the sink and the receiver for the UI side.
    pub fn new(depth: usize) -> (Self, PreviewReceiver) {
        let (sender, receiver) = channel::bounded(depth.max(1));
        (Self { sender, skipped: 0 }, receiver)
    }

    /// Frames skipped because the UI was behind.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl FrameSink for PreviewSink {
    fn name(&self) -> &str {
        "preview"
    }

    fn consume(&mut self, frame: &FrameHandle) -> Result<usize, SinkError> {
        match self.sender.try_send(frame.clone_handle()) {
            Ok(()) => Ok(frame.valid_length()),
            Err(TrySendError::Full(_)) => {
                self.skipped += 1;
                Ok(0)
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(SinkError::Disconnected(self.name().to_string()))
            }
        }
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if self.skipped > 0 {
            log::info!("Preview skipped {} frame(s) while the UI lagged", self.skipped);
        }
        Ok(())
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FrameBuffer;

    #[test]
    fn test_full_channel_skips() {
        let (mut sink, receiver) = PreviewSink::new(2);

        for payload in [&b"a"[..], b"b", b"c"] {
            sink.consume(&FrameBuffer::create_from_slice(payload)).unwrap();
        }
        assert_eq!(sink.skipped(), 1);

        let seen: Vec<_> = receiver.try_iter().map(|f| f.data().to_vec()).collect();
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_preview_shares_the_buffer() {
        let (mut sink, receiver) = PreviewSink::new(1);
        let frame = FrameBuffer::create_from_slice(b"shared");

        sink.consume(&frame).unwrap();
        assert!(receiver.recv().unwrap().same_buffer(&frame));
    }

    #[test]
    fn test_dropped_receiver_is_disconnected() {
        let (mut sink, receiver) = PreviewSink::new(1);
        drop(receiver);

        let err = sink
            .consume(&FrameBuffer::create_from_slice(b"x"))
            .unwrap_err();
        assert!(matches!(err, SinkError::Disconnected(_)));
    }
}
