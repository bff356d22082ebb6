//! Encrypted channel over one agent's TCP connection.
//!
//! [`SecureChannel`] owns the raw stream. It runs the responder side of the
//! Noise handshake when a connection is accepted, carries command lines and
//! text responses as encrypted frames, and exchanges raw byte streams for
//! file transfers. Re-keying swaps the transport state in place without
//! dropping the connection.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use protocol::{framing, Handshake, Identity, Transport};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Result, ServerError};

/// Chunk size for raw file streams.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Capability surface a session needs from its channel: encrypted text
/// frames, raw byte streams, re-keying, shutdown. Sessions compose this
/// rather than knowing about sockets or Noise state.
#[allow(async_fn_in_trait)]
pub trait Channel: Send {
    /// Sends one line of text as an authenticated-encrypted frame.
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Receives one authenticated-encrypted frame of UTF-8 text, bounded by
    /// the response timeout.
    async fn recv_text(&mut self) -> Result<String>;

    /// Receives one raw byte stream and writes it to `path`. Returns the
    /// byte count.
    async fn recv_file(&mut self, path: &Path) -> Result<u64>;

    /// Sends the file at `path` as one raw byte stream. Returns the byte
    /// count.
    async fn send_file(&mut self, path: &Path) -> Result<u64>;

    /// Runs a fresh key exchange on the raw transport, replacing the key
    /// material for all subsequent frames.
    async fn rekey(&mut self) -> Result<()>;

    /// Closes the underlying transport. Best effort; errors are ignored.
    async fn shutdown(&mut self);
}

/// The production [`Channel`]: Noise-encrypted frames over a [`TcpStream`].
pub struct SecureChannel {
    stream: TcpStream,
    transport: Transport,
    identity: Arc<Identity>,
    read_timeout: Duration,
}

impl SecureChannel {
    /// Runs the responder handshake on a freshly accepted connection.
    ///
    /// `handshake_timeout` bounds each read during this initial exchange so
    /// a stalled client cannot wedge the accept loop; once established, all
    /// reads are bounded by `read_timeout` instead.
    pub async fn accept(
        mut stream: TcpStream,
        identity: Arc<Identity>,
        read_timeout: Duration,
        handshake_timeout: Duration,
    ) -> Result<Self> {
        let transport = respond_handshake(&mut stream, &identity, handshake_timeout).await?;
        Ok(Self {
            stream,
            transport,
            identity,
            read_timeout,
        })
    }
}

impl Channel for SecureChannel {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        let ciphertext = self.transport.encrypt(text.as_bytes())?;
        write_frame(&mut self.stream, &ciphertext).await
    }

    async fn recv_text(&mut self) -> Result<String> {
        let ciphertext = read_frame(&mut self.stream, self.read_timeout).await?;
        let plaintext = self.transport.decrypt(&ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|_| ServerError::Connection("response is not valid UTF-8".to_string()))
    }

    async fn recv_file(&mut self, path: &Path) -> Result<u64> {
        let mut len_buf = [0u8; 8];
        read_exact(&mut self.stream, &mut len_buf, self.read_timeout).await?;
        let total = u64::from_be_bytes(len_buf);

        let mut file = File::create(path).await?;
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        let mut received = 0u64;
        while received < total {
            let want = usize::try_from(total - received)
                .unwrap_or(STREAM_CHUNK_SIZE)
                .min(STREAM_CHUNK_SIZE);
            read_exact(&mut self.stream, &mut buf[..want], self.read_timeout).await?;
            file.write_all(&buf[..want]).await?;
            received += want as u64;
        }
        file.flush().await?;
        Ok(total)
    }

    async fn send_file(&mut self, path: &Path) -> Result<u64> {
        let mut file = File::open(path).await?;
        let total = file.metadata().await?.len();

        self.stream
            .write_all(&total.to_be_bytes())
            .await
            .map_err(wire)?;

        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        let mut sent = 0u64;
        while sent < total {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Err(ServerError::Connection(
                    "file truncated while sending".to_string(),
                ));
            }
            self.stream.write_all(&buf[..n]).await.map_err(wire)?;
            sent += n as u64;
        }
        Ok(total)
    }

    async fn rekey(&mut self) -> Result<()> {
        // Rekey handshake messages are responses to an in-flight command, so
        // they fall under the response timeout, not the accept-time one.
        self.transport =
            respond_handshake(&mut self.stream, &self.identity, self.read_timeout).await?;
        Ok(())
    }

    async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// Runs the responder side of the Noise XX handshake over framed messages.
async fn respond_handshake(
    stream: &mut TcpStream,
    identity: &Identity,
    per_read: Duration,
) -> Result<Transport> {
    let mut handshake = Handshake::responder(identity)?;

    // -> e
    let msg = read_frame(stream, per_read).await?;
    handshake.read_message(&msg)?;

    // <- e, ee, s, es
    let reply = handshake.write_message()?;
    write_frame(stream, &reply).await?;

    // -> s, se
    let msg = read_frame(stream, per_read).await?;
    handshake.read_message(&msg)?;

    Ok(handshake.into_transport()?)
}

/// Maps a wire-level IO failure into the session error taxonomy.
fn wire(err: std::io::Error) -> ServerError {
    match err.kind() {
        std::io::ErrorKind::TimedOut => ServerError::Timeout,
        _ => ServerError::Connection(err.to_string()),
    }
}

async fn write_frame(stream: &mut TcpStream, payload: &[u8]) -> Result<()> {
    let frame = framing::encode(payload)?;
    stream.write_all(&frame).await.map_err(wire)
}

async fn read_frame(stream: &mut TcpStream, per_read: Duration) -> Result<Vec<u8>> {
    let mut header = [0u8; framing::FRAME_HEADER_SIZE];
    read_exact(stream, &mut header, per_read).await?;

    let len = framing::decode_header(&header)?;
    let mut payload = vec![0u8; len];
    read_exact(stream, &mut payload, per_read).await?;
    Ok(payload)
}

async fn read_exact(stream: &mut TcpStream, buf: &mut [u8], per_read: Duration) -> Result<()> {
    match timeout(per_read, stream.read_exact(buf)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(err)) => Err(wire(err)),
        Err(_) => Err(ServerError::Timeout),
    }
}
