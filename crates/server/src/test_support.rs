//! Scripted channel stub for exercising the command protocol without a
//! network.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::channel::Channel;
use crate::error::{Result, ServerError};

/// A [`Channel`] that records everything sent and replays scripted replies.
///
/// With no reply queued, `recv_text` reports a timeout, which is what a
/// silent agent looks like to the real channel.
#[derive(Default)]
pub(crate) struct MockChannel {
    /// Command lines sent to the "agent", in order.
    pub sent: Vec<String>,
    /// Scripted replies for `recv_text`, popped front to back.
    pub replies: VecDeque<String>,
    /// Bytes every `recv_file` call writes to its target path.
    pub file_bytes: Vec<u8>,
    /// Paths written by `recv_file`.
    pub received_files: Vec<PathBuf>,
    /// Paths read by `send_file`.
    pub sent_files: Vec<PathBuf>,
    /// Completed rekey count.
    pub rekeys: u32,
    /// Shutdown call count.
    pub shutdowns: u32,
    /// When set, `send_text` fails with a connection error.
    pub fail_send: bool,
}

impl MockChannel {
    pub fn queue_text(&mut self, reply: &str) {
        self.replies.push_back(reply.to_string());
    }
}

impl Channel for MockChannel {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        if self.fail_send {
            return Err(ServerError::Connection("mock: send failed".to_string()));
        }
        self.sent.push(text.to_string());
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String> {
        self.replies.pop_front().ok_or(ServerError::Timeout)
    }

    async fn recv_file(&mut self, path: &Path) -> Result<u64> {
        std::fs::write(path, &self.file_bytes)?;
        self.received_files.push(path.to_path_buf());
        Ok(self.file_bytes.len() as u64)
    }

    async fn send_file(&mut self, path: &Path) -> Result<u64> {
        let data = std::fs::read(path)?;
        self.sent_files.push(path.to_path_buf());
        Ok(data.len() as u64)
    }

    async fn rekey(&mut self) -> Result<()> {
        self.rekeys += 1;
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.shutdowns += 1;
    }
}
