//! TCP listener: bind and the background accept loop.
//!
//! The accept loop runs for the process lifetime. Each accepted connection
//! completes the responder handshake, then a session is built and inserted
//! into the registry under the next id. There is no upper bound on
//! concurrent sessions.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use protocol::Identity;
use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::channel::SecureChannel;
use crate::config::Config;
use crate::registry::Registry;
use crate::session::Session;

/// Listen backlog, sized for a trickle of inbound agents.
const BACKLOG: u32 = 5;

/// Binds the listening socket on all interfaces.
///
/// Failure here is fatal to the process; callers bail before the console
/// loop starts. Port 0 binds an ephemeral port, which the tests rely on.
pub fn bind(port: u16) -> std::io::Result<TcpListener> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::V4(SocketAddrV4::new(
        Ipv4Addr::UNSPECIFIED,
        port,
    )))?;
    socket.listen(BACKLOG)
}

/// Spawns the accept loop as a background task.
///
/// A failed handshake drops that connection and keeps accepting; one broken
/// or stalled client must not take the listener down with it.
pub fn spawn(
    listener: TcpListener,
    registry: Arc<Registry>,
    identity: Arc<Identity>,
    config: &Config,
) -> JoinHandle<()> {
    let read_timeout = config.session.response_timeout();
    let handshake_timeout = config.session.handshake_timeout();

    tokio::spawn(async move {
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(%err, "accept failed");
                    continue;
                }
            };

            let channel = match SecureChannel::accept(
                stream,
                Arc::clone(&identity),
                read_timeout,
                handshake_timeout,
            )
            .await
            {
                Ok(channel) => channel,
                Err(err) => {
                    warn!(%addr, %err, "handshake failed, dropping connection");
                    continue;
                }
            };

            let (id, _) = registry
                .insert_with(|id| Session::new(id, addr, channel))
                .await;
            info!(id, %addr, "client connected");
        }
    })
}
