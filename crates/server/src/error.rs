//! Operator-facing error taxonomy.

use std::io;
use std::path::PathBuf;

use protocol::ProtocolError;
use thiserror::Error;

/// Everything that can go wrong while validating operator input or driving a
/// command against an agent.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The operator named a session id that is malformed or unknown.
    #[error("invalid client id: {0}")]
    InvalidClientId(String),

    /// The operator typed a verb outside the command vocabulary.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A per-session command was issued with no session selected.
    #[error("no client selected")]
    NoClientSelected,

    /// A download target already exists locally.
    #[error("file already exists: {}", .0.display())]
    FileAlreadyExists(PathBuf),

    /// An upload source is missing locally.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The transport failed, the frame was malformed, or the agent is gone.
    #[error("connection error: {0}")]
    Connection(String),

    /// The agent did not answer within the response timeout.
    #[error("timed out waiting for response")]
    Timeout,

    /// Local filesystem failure while servicing a transfer.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ServerError {
    /// True for failures fatal to the session: the transport is considered
    /// dead, the session is removed from the registry and the console
    /// selection cleared. File and validation errors are not fatal.
    pub fn severs_session(&self) -> bool {
        matches!(self, ServerError::Connection(_) | ServerError::Timeout)
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        ServerError::Connection(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ServerError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ServerError::Timeout
    }
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
