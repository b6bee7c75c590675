//! Raw frame bytes appended to a file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::FrameSink;
use crate::buffer::FrameHandle;
use crate::error::SinkError;
use crate::storage;

/// Writes each frame's valid bytes, back to back, to one file.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl FileSink {
    /// Creates (or truncates) the output file.
    ///
    /// A directory gets a timestamped file name inside it.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let open_failed = |source| SinkError::OpenFailed {
            name: path.display().to_string(),
            source,
        };
        let path = storage::resolve_output_path(path).map_err(open_failed)?;
        let file = File::create(&path).map_err(open_failed)?;

        log::info!("Writing frames to {}", path.display());
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    /// The file actually being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_failed(&self, source: std::io::Error) -> SinkError {
        SinkError::WriteFailed {
            name: self.path.display().to_string(),
            source,
        }
    }
}

impl FrameSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn consume(&mut self, frame: &FrameHandle) -> Result<usize, SinkError> {
        let result = match self.writer.as_mut() {
            Some(writer) => writer.write_all(frame.data()),
            None => Err(std::io::ErrorKind::NotConnected.into()),
        };
        result.map_err(|e| self.write_failed(e))?;

        self.written += frame.valid_length() as u64;
        Ok(frame.valid_length())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| self.write_failed(e))?;
            log::info!(
                "Closed {} ({})",
                self.path.display(),
                storage::size_human(self.written)
            );
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
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_writes_valid_bytes_only() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::create(&dir.path().join("out.raw")).unwrap();

        let mut partial = FrameBuffer::create(8);
        partial.storage_mut().unwrap()[..3].copy_from_slice(b"abc");
        partial.set_valid_length(3);

        assert_eq!(sink.consume(&partial).unwrap(), 3);
        assert_eq!(
            sink.consume(&FrameBuffer::create_from_slice(b"defg")).unwrap(),
            4
        );
        sink.finish().unwrap();

        assert_eq!(fs::read(sink.path()).unwrap(), b"abcdefg");
    }

    #[test]
    fn test_directory_output_gets_generated_name() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::create(dir.path()).unwrap();
        sink.finish().unwrap();

        assert!(sink.path().starts_with(dir.path()));
        assert!(sink.path().exists());
    }

    #[test]
    fn test_consume_after_finish_fails() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::create(&dir.path().join("x.raw")).unwrap();
        sink.finish().unwrap();

        let err = sink
            .consume(&FrameBuffer::create_from_slice(b"late"))
            .unwrap_err();
        assert!(matches!(err, SinkError::WriteFailed { .. }));
    }

    #[test]
    fn test_unwritable_path_fails_open() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();

        // A regular file cannot be a parent directory
        let err = FileSink::create(&blocker.join("out.raw")).err().unwrap();
        assert!(matches!(err, SinkError::OpenFailed { .. }));
    }
}
