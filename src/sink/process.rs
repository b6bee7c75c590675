//! Frames piped into the stdin of a child process.

use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};

use super::FrameSink;
use crate::buffer::FrameHandle;
use crate::error::SinkError;

/// Runs a shell command and writes frame bytes to its stdin.
///
/// On finish, stdin is closed so the child sees end of input, and the
/// child is waited for. A non-zero exit is reported as an error.
pub struct ProcessSink {
    command: String,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl ProcessSink {
    pub fn spawn(command: &str) -> Result<Self, SinkError> {
        let open_failed = |source| SinkError::OpenFailed {
            name: command.to_string(),
            source,
        };

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(open_failed)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| open_failed(std::io::ErrorKind::BrokenPipe.into()))?;

        log::info!("Piping frames into `{}` (pid {})", command, child.id());
        Ok(Self {
            command: command.to_string(),
            child,
            stdin: Some(stdin),
        })
    }
}

impl FrameSink for ProcessSink {
    fn name(&self) -> &str {
        "process"
    }

    fn consume(&mut self, frame: &FrameHandle) -> Result<usize, SinkError> {
        let result = match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(frame.data()),
            None => Err(std::io::ErrorKind::BrokenPipe.into()),
        };
        result.map_err(|source| SinkError::WriteFailed {
            name: self.command.clone(),
            source,
        })?;
        Ok(frame.valid_length())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        // Closing stdin lets the child run to completion
        drop(self.stdin.take());

        let status = self.child.wait().map_err(|source| SinkError::WriteFailed {
            name: self.command.clone(),
            source,
        })?;
        if !status.success() {
            return Err(SinkError::ProcessExit {
                command: self.command.clone(),
                status: status.to_string(),
            });
        }
        log::info!("`{}` exited cleanly", self.command);
        Ok(())
    }
}

// ============================================
// TESTS
// ============================================
