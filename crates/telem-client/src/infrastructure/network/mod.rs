//! Network infrastructure for the client.
//!
//! A single outbound TCP connection to the collector.  Frames are written
//! whole, one after another; nothing is ever read back.  There is no
//! handshake and no reconnection: a failed connect or write is final.

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::application::emit_telemetry::{FrameSink, SendError};

/// Errors that can occur while opening the connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The server address is not a literal IP address.
    #[error("invalid server address {0:?}")]
    InvalidAddress(String),

    /// TCP connection to the collector failed.
    #[error("failed to connect to collector at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Write side of the connection to the collector.
///
/// Generic over the writer so tests can substitute an in-memory mock.
#[derive(Debug)]
pub struct ServerConnection<W = TcpStream> {
    writer: Option<W>,
    peer: String,
}

impl ServerConnection<TcpStream> {
    /// Connects to `host:port`.  `host` must be an IPv4 or IPv6 literal.
    ///
    /// # Errors
    ///
    /// [`ConnectError::InvalidAddress`] or [`ConnectError::ConnectFailed`].
    pub async fn connect(host: &str, port: u16) -> Result<Self, ConnectError> {
        let ip: IpAddr = host
            .parse()
            .map_err(|_| ConnectError::InvalidAddress(host.to_string()))?;
        let addr = SocketAddr::new(ip, port);

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ConnectError::ConnectFailed { addr, source })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY: {e}");
        }

        info!(%addr, "connected to collector");
        Ok(Self::from_writer(stream, addr.to_string()))
    }
}

impl<W> ServerConnection<W> {
    /// Wraps an already-open writer.
    pub fn from_writer(writer: W, peer: impl Into<String>) -> Self {
        Self {
            writer: Some(writer),
            peer: peer.into(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }
}

#[async_trait]
impl<W> FrameSink for ServerConnection<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), SendError> {
        let writer = self.writer.as_mut().ok_or(SendError::NotConnected)?;
        writer.write_all(frame).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };
        match writer.shutdown().await {
            Ok(()) => info!(peer = %self.peer, "connection closed"),
            Err(e) => debug!(peer = %self.peer, "shutdown on close failed: {e}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
