//! UDP transport to the simulation server.
//!
//! The server listens for `init` on its public port but answers every
//! agent from a freshly allocated port; that first reply pins the
//! dedicated per-agent channel, so `recv` re-targets the peer address
//! whenever a datagram arrives from somewhere new.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::UdpSocket;
use tracing::debug;

const RECV_BUFFER_SIZE: usize = 8192;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not resolve server address {0}")]
    BadAddress(String),
}

/// A cloneable handle to one agent's socket. The receive task is the only
/// caller of `recv`; `send` may be called from the think task.
#[derive(Debug, Clone)]
pub struct Connection {
    socket: Arc<UdpSocket>,
    peer: Arc<Mutex<SocketAddr>>,
}

impl Connection {
    /// Bind an ephemeral local port and target the server's public port.
    pub async fn open(host: &str, port: u16) -> Result<Self, ConnectionError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let peer = tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| ConnectionError::BadAddress(format!("{host}:{port}")))?;
        Ok(Self {
            socket: Arc::new(socket),
            peer: Arc::new(Mutex::new(peer)),
        })
    }

    /// The address commands are currently sent to.
    pub fn peer(&self) -> SocketAddr {
        *self.peer.lock().unwrap()
    }

    /// Send one command datagram to the current peer.
    pub async fn send(&self, text: &str) -> Result<(), ConnectionError> {
        let peer = self.peer();
        self.socket.send_to(text.as_bytes(), peer).await?;
        Ok(())
    }

    /// Block until one message datagram arrives.
    ///
    /// Adopts the sender as the new peer when it differs, which is how the
    /// server hands the agent its dedicated channel after init.
    pub async fn recv(&self) -> Result<String, ConnectionError> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        {
            let mut peer = self.peer.lock().unwrap();
            if *peer != from {
                debug!(%from, "server reassigned the agent channel");
                *peer = from;
            }
        }
        Ok(String::from_utf8_lossy(&buf[..len])
            .trim_end_matches(['\0', '\n'])
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reaches_initial_peer() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let conn = Connection::open("127.0.0.1", port).await.unwrap();

        conn.send("(init testers (version 15))").await.unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"(init testers (version 15))");
    }

    #[tokio::test]
    async fn test_recv_adopts_new_peer_port() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let conn = Connection::open("127.0.0.1", port).await.unwrap();

        // learn the agent's address
        conn.send("(init testers (version 15))").await.unwrap();
        let mut buf = [0u8; 256];
        let (_, agent_addr) = server.recv_from(&mut buf).await.unwrap();

        // reply from a different socket, as the server does after init
        let channel = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        channel
            .send_to(b"(init l 1 before_kick_off)\0", agent_addr)
            .await
            .unwrap();

        let msg = conn.recv().await.unwrap();
        assert_eq!(msg, "(init l 1 before_kick_off)");
        assert_eq!(conn.peer(), channel.local_addr().unwrap());

        // subsequent commands go to the dedicated channel
        conn.send("(dash 50)").await.unwrap();
        let (len, _) = channel.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"(dash 50)");
    }
}
