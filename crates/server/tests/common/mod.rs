//! Shared fixtures for the integration tests: a server instance on an
//! ephemeral port and a scripted agent speaking the real wire protocol.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use protocol::{framing, Handshake, Identity, Transport};
use server::config::Config;
use server::listener;
use server::registry::Registry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Starts a listener on an ephemeral port and returns its address and
/// registry.
pub async fn start_server() -> (SocketAddr, Arc<Registry>) {
    let config = Config::default();
    let identity = Arc::new(Identity::generate().unwrap());
    let registry = Arc::new(Registry::new());

    let listener = listener::bind(0).unwrap();
    let addr = listener.local_addr().unwrap();
    listener::spawn(listener, Arc::clone(&registry), identity, &config);

    (addr, registry)
}

/// Polls until the registry holds `count` sessions.
pub async fn wait_for_sessions(registry: &Registry, count: usize) {
    for _ in 0..100 {
        if registry.len().await == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server never registered {count} session(s)");
}

/// A scripted agent driving the initiator side of the wire protocol.
pub struct StubAgent {
    stream: TcpStream,
    transport: Transport,
}

impl StubAgent {
    /// Connects to the server and completes the Noise handshake with a
    /// throwaway identity.
    pub async fn connect(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let transport = Self::run_handshake(&mut stream).await;
        Self { stream, transport }
    }

    async fn run_handshake(stream: &mut TcpStream) -> Transport {
        let identity = Identity::generate().unwrap();
        let mut handshake = Handshake::initiator(&identity).unwrap();

        // -> e
        write_frame(stream, &handshake.write_message().unwrap()).await;
        // <- e, ee, s, es
        handshake
            .read_message(&read_frame(stream).await)
            .unwrap();
        // -> s, se
        write_frame(stream, &handshake.write_message().unwrap()).await;

        handshake.into_transport().unwrap()
    }

    /// The agent-side socket address, which the server sees as the peer.
    pub fn local_addr(&self) -> SocketAddr {
        self.stream.local_addr().unwrap()
    }

    /// Receives and decrypts one command line.
    pub async fn recv_command(&mut self) -> String {
        let ciphertext = read_frame(&mut self.stream).await;
        let plaintext = self.transport.decrypt(&ciphertext).unwrap();
        String::from_utf8(plaintext).unwrap()
    }

    /// Encrypts and sends one text response.
    pub async fn send_text(&mut self, text: &str) {
        let ciphertext = self.transport.encrypt(text.as_bytes()).unwrap();
        write_frame(&mut self.stream, &ciphertext).await;
    }

    /// Sends one raw file stream: length prefix, then the bytes.
    pub async fn send_stream(&mut self, bytes: &[u8]) {
        self.stream
            .write_all(&(bytes.len() as u64).to_be_bytes())
            .await
            .unwrap();
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Receives one raw file stream.
    pub async fn recv_stream(&mut self) -> Vec<u8> {
        let mut len_buf = [0u8; 8];
        self.stream.read_exact(&mut len_buf).await.unwrap();
        let mut bytes = vec![0u8; u64::from_be_bytes(len_buf) as usize];
        self.stream.read_exact(&mut bytes).await.unwrap();
        bytes
    }

    /// Runs a fresh initiator handshake, replacing the transport, as a real
    /// agent does after receiving `rekey`.
    pub async fn rekey(&mut self) {
        self.transport = Self::run_handshake(&mut self.stream).await;
    }
}

async fn write_frame(stream: &mut TcpStream, payload: &[u8]) {
    let frame = framing::encode(payload).unwrap();
    stream.write_all(&frame).await.unwrap();
}

async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; framing::FRAME_HEADER_SIZE];
    stream.read_exact(&mut header).await.unwrap();
    let len = framing::decode_header(&header).unwrap();
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();
    payload
}
