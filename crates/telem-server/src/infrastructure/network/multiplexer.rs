//! Multiplexer: the collector's single-task accept-and-read loop.
//!
//! One task owns the listener, every accepted [`Connection`], and the
//! [`IngestionTally`].  Each iteration waits for one of:
//!
//! 1. shutdown requested through the [`CancellationToken`],
//! 2. a pending connection on the listener,
//! 3. any device socket becoming readable,
//! 4. a connection whose buffer already holds a complete frame.
//!
//! and then sweeps every connection once, decoding at most one frame from
//! each.  A connection that errors is closed and forgotten without
//! affecting the others.  A failed `accept` ends the loop.
//!
//! Because nothing else touches the tally, no locking is needed.

use std::io;
use std::net::SocketAddr;

use futures_util::future::select_all;
use telem_core::Frame;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::data_pack::DataPack;
use crate::application::tally::IngestionTally;
use crate::infrastructure::network::connection::{Connection, ConnectionError};
use crate::infrastructure::storage::config::{ConfigError, NetworkConfig};

/// Errors that stop the collector.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listener configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create listening socket: {0}")]
    Socket(#[source] io::Error),

    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("listen failed on {addr}: {source}")]
    ListenFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),
}

/// Notifications for observers of the loop (tests, future front-ends).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    ConnectionAccepted { peer: SocketAddr },
    FrameIngested { pack: DataPack, count: u64 },
    ConnectionClosed { peer: SocketAddr, reason: String },
}

/// What woke the loop.  Handled after the `select!` has released its borrows.
enum Wake {
    Shutdown,
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Readable,
    Backlog,
}

/// Owns the listener and every live device connection.
#[derive(Debug)]
pub struct Multiplexer {
    listener: TcpListener,
    connections: Vec<Connection>,
    tally: IngestionTally,
    read_chunk: usize,
    event_tx: Option<mpsc::UnboundedSender<ServerEvent>>,
}

impl Multiplexer {
    /// Creates the listening socket: address reuse on, bound, listening.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Any failure of the socket / bind / listen sequence, or a
    /// `bind_address` that is not an IP address.
    pub fn bind(config: &NetworkConfig) -> Result<Self, ServerError> {
        let addr = config.listen_addr()?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ServerError::Socket)?;
        socket.set_reuseaddr(true).map_err(ServerError::Socket)?;
        socket
            .bind(addr)
            .map_err(|source| ServerError::BindFailed { addr, source })?;
        let listener = socket
            .listen(config.backlog)
            .map_err(|source| ServerError::ListenFailed { addr, source })?;

        Ok(Self {
            listener,
            connections: Vec::new(),
            tally: IngestionTally::new(),
            read_chunk: config.read_chunk_size,
            event_tx: None,
        })
    }

    /// Address actually bound.  Useful when the configured port was 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn tally(&self) -> &IngestionTally {
        &self.tally
    }

    /// Returns a receiver for loop events.  A second call replaces the first
    /// subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        rx
    }

    /// Runs until `shutdown` is cancelled, then closes every connection and
    /// hands back the tally.
    ///
    /// # Errors
    ///
    /// [`ServerError::AcceptFailed`] if the listener reports an error.  All
    /// connections are closed before returning it.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<IngestionTally, ServerError> {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, "accepting device connections");
        }

        loop {
            let backlog = self.connections.iter().any(Connection::has_buffered_frame);
            let wake = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Wake::Shutdown,
                accepted = self.listener.accept() => Wake::Accepted(accepted),
                _ = any_readable(&self.connections) => Wake::Readable,
                _ = tokio::task::yield_now(), if backlog => Wake::Backlog,
            };

            match wake {
                Wake::Shutdown => break,
                Wake::Accepted(Ok((stream, peer))) => self.admit(stream, peer),
                Wake::Accepted(Err(e)) => {
                    error!(error = %e, "accept failed; stopping");
                    self.close_all("accept failed");
                    return Err(ServerError::AcceptFailed(e));
                }
                Wake::Readable | Wake::Backlog => {}
            }

            self.sweep();
        }

        info!(devices = self.tally.len(), frames = self.tally.total(), "shutting down");
        self.close_all("server shutting down");
        Ok(self.tally)
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        info!(%peer, "device connected");
        self.connections.push(Connection::new(stream, peer, self.read_chunk));
        self.emit(ServerEvent::ConnectionAccepted { peer });
    }

    /// Polls every connection once, dropping those that fail.
    fn sweep(&mut self) {
        let tally = &mut self.tally;
        let event_tx = &self.event_tx;

        self.connections.retain_mut(|conn| match conn.poll_frame() {
            Ok(Some(frame)) => {
                ingest(tally, event_tx, frame);
                true
            }
            Ok(None) => true,
            Err(e) => {
                let peer = conn.peer();
                log_teardown(peer, &e);
                send(event_tx, ServerEvent::ConnectionClosed {
                    peer,
                    reason: e.to_string(),
                });
                false
            }
        });
    }

    fn close_all(&mut self, reason: &str) {
        for conn in self.connections.drain(..) {
            debug!(peer = %conn.peer(), reason, "closing connection");
            send(&self.event_tx, ServerEvent::ConnectionClosed {
                peer: conn.peer(),
                reason: reason.to_string(),
            });
        }
    }

    fn emit(&self, event: ServerEvent) {
        send(&self.event_tx, event);
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn ingest(tally: &mut IngestionTally, event_tx: &Option<mpsc::UnboundedSender<ServerEvent>>, frame: Frame) {
    let pack = DataPack::new(frame);
    let count = tally.record(&pack.device_id);
    info!(
        device = %pack.device_id,
        device_type = %pack.device_type,
        data = %pack.data_lossy(),
        timestamp = pack.timestamp,
        count,
        "frame received"
    );
    send(event_tx, ServerEvent::FrameIngested { pack, count });
}

fn log_teardown(peer: SocketAddr, e: &ConnectionError) {
    if e.is_disconnect() {
        info!(%peer, reason = %e, "device disconnected");
    } else {
        warn!(%peer, error = %e, "dropping misbehaving connection");
    }
}

fn send(event_tx: &Option<mpsc::UnboundedSender<ServerEvent>>, event: ServerEvent) {
    if let Some(tx) = event_tx {
        // A dropped receiver just means nobody is listening.
        let _ = tx.send(event);
    }
}

/// Resolves once any connection is readable; never resolves when there are none.
async fn any_readable(connections: &[Connection]) {
    if connections.is_empty() {
        return std::future::pending().await;
    }
    let waits = connections.iter().map(|c| Box::pin(c.stream().readable()));
    // Readiness errors resurface from the next read in `sweep`.
    let _ = select_all(waits).await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
