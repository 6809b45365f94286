//! Connection: one accepted device socket plus its receive buffer.
//!
//! Bytes are read without blocking and accumulated until a whole frame is
//! present, so a peer that stalls half-way through a frame never holds up the
//! other connections.  The buffer keeps whatever follows a decoded frame for
//! the next call.

use std::io;
use std::net::SocketAddr;

use telem_core::{frame_ready, try_decode_frame, Decoded, Frame, ProtocolError};
use thiserror::Error;
use tokio::net::TcpStream;

/// Why a connection has to be torn down.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The byte stream violated the frame format, or ended mid-frame.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The socket reported a read failure.
    #[error("socket read failed: {0}")]
    Io(#[from] io::Error),
}

impl ConnectionError {
    /// True when the peer simply went away.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ConnectionError::Protocol(e) => e.is_disconnect(),
            ConnectionError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
            ),
        }
    }
}

/// An accepted device connection.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: Vec<u8>,
    read_chunk: usize,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, read_chunk: usize) -> Self {
        Self {
            stream,
            peer,
            buffer: Vec::with_capacity(read_chunk),
            read_chunk: read_chunk.max(1),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Bytes received but not yet consumed by a decoded frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// True when the buffer alone is enough to make progress: either a whole
    /// frame or a prefix that is already known to be invalid.
    ///
    /// Checked on every loop iteration, so it only walks the length prefixes.
    pub fn has_buffered_frame(&self) -> bool {
        !matches!(frame_ready(&self.buffer), Ok(false))
    }

    /// Returns at most one frame.
    ///
    /// A frame already sitting in the buffer is returned without touching the
    /// socket.  Otherwise one non-blocking read is attempted and the buffer is
    /// decoded again.  `Ok(None)` means "nothing complete yet".
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::ConnectionClosed`] on EOF with an empty buffer.
    /// - [`ProtocolError::ShortRead`] on EOF part-way through a frame.
    /// - [`ProtocolError::InvalidMagic`] on a malformed stream.
    /// - [`ConnectionError::Io`] when the socket read fails.
    pub fn poll_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        if let Some(frame) = self.take_buffered_frame()? {
            return Ok(Some(frame));
        }

        self.buffer.reserve(self.read_chunk);
        match self.stream.try_read_buf(&mut self.buffer) {
            Ok(0) => Err(self.eof_error().into()),
            Ok(_) => self.take_buffered_frame(),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(ConnectionError::Io(e)),
        }
    }

    fn take_buffered_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        match try_decode_frame(&self.buffer)? {
            Decoded::Frame { frame, consumed } => {
                self.buffer.drain(..consumed);
                Ok(Some(frame))
            }
            Decoded::Incomplete { .. } => Ok(None),
        }
    }

    fn eof_error(&self) -> ProtocolError {
        if self.buffer.is_empty() {
            return ProtocolError::ConnectionClosed;
        }
        let needed = match try_decode_frame(&self.buffer) {
            Ok(Decoded::Incomplete { needed }) => needed,
            _ => self.buffer.len(),
        };
        ProtocolError::ShortRead {
            needed,
            available: self.buffer.len(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use telem_core::{encode_frame, DeviceType};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Returns the server-side `Connection` and the client-side stream.
    async fn connected_pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, peer) = listener.accept().await.unwrap();
        (Connection::new(server, peer, 64), client)
    }

    /// Waits for readiness, then polls until a frame, an error, or a bounded
    /// number of empty polls.
    async fn poll_until_done(conn: &mut Connection) -> Result<Option<Frame>, ConnectionError> {
        for _ in 0..100 {
            conn.stream().readable().await.unwrap();
            match conn.poll_frame() {
                Ok(None) => continue,
                other => return other,
            }
        }
        Ok(None)
    }

    #[tokio::test]
    async fn test_whole_frame_is_decoded() {
        // Arrange
        let (mut conn, mut client) = connected_pair().await;
        let frame = Frame::new(DeviceType::TempMonitor, "sensor-1", "21.5");

        // Act
        client.write_all(&encode_frame(&frame)).await.unwrap();
        let got = poll_until_done(&mut conn).await.unwrap();

        // Assert
        assert_eq!(got, Some(frame));
        assert_eq!(conn.buffered_len(), 0);
    }

    #[tokio::test]
    async fn test_frame_split_across_writes_is_reassembled() {
        let (mut conn, mut client) = connected_pair().await;
        let frame = Frame::new(DeviceType::UptimeMonitor, "node", "3000");
        let bytes = encode_frame(&frame);
        let (head, tail) = bytes.split_at(7);

        client.write_all(head).await.unwrap();
        conn.stream().readable().await.unwrap();
        assert!(conn.poll_frame().unwrap().is_none());
        assert_eq!(conn.buffered_len(), 7);

        client.write_all(tail).await.unwrap();
        assert_eq!(poll_until_done(&mut conn).await.unwrap(), Some(frame));
    }

    #[tokio::test]
    async fn test_two_frames_in_one_write_are_returned_one_at_a_time() {
        let (mut conn, mut client) = connected_pair().await;
        let a = Frame::new(DeviceType::TempMonitor, "a", "1");
        let b = Frame::new(DeviceType::TempMonitor, "b", "2");
        let mut bytes = encode_frame(&a);
        bytes.extend(encode_frame(&b));

        client.write_all(&bytes).await.unwrap();

        // Read until the whole write has landed in the buffer.
        let first = poll_until_done(&mut conn).await.unwrap();
        assert_eq!(first, Some(a));
        let second = if conn.has_buffered_frame() {
            conn.poll_frame().unwrap()
        } else {
            poll_until_done(&mut conn).await.unwrap()
        };
        assert_eq!(second, Some(b));
    }

    #[tokio::test]
    async fn test_eof_on_empty_buffer_is_connection_closed() {
        let (mut conn, client) = connected_pair().await;
        drop(client);

        let err = poll_until_done(&mut conn).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Protocol(ProtocolError::ConnectionClosed)));
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn test_eof_mid_frame_is_short_read() {
        let (mut conn, mut client) = connected_pair().await;
        let bytes = encode_frame(&Frame::new(DeviceType::TempMonitor, "sensor-1", "21.5"));

        client.write_all(&bytes[..10]).await.unwrap();
        drop(client);

        let err = loop {
            conn.stream().readable().await.unwrap();
            match conn.poll_frame() {
                Ok(None) => continue,
                Ok(Some(f)) => panic!("unexpected frame {f:?}"),
                Err(e) => break e,
            }
        };
        assert!(matches!(
            err,
            ConnectionError::Protocol(ProtocolError::ShortRead { available: 10, .. })
        ));
    }

    #[tokio::test]
    async fn test_bad_magic_is_rejected() {
        let (mut conn, mut client) = connected_pair().await;
        let mut bytes = encode_frame(&Frame::new(DeviceType::TempMonitor, "x", "1"));
        bytes[0] = 0x00;

        client.write_all(&bytes).await.unwrap();
        let err = poll_until_done(&mut conn).await.unwrap_err();

        assert!(matches!(err, ConnectionError::Protocol(ProtocolError::InvalidMagic { .. })));
        assert!(!err.is_disconnect());
    }

    #[tokio::test]
    async fn test_has_buffered_frame_follows_buffer_contents() {
        // Arrange
        let (mut conn, mut client) = connected_pair().await;
        let a = Frame::new(DeviceType::UptimeMonitor, "a", "1000");
        let b = Frame::new(DeviceType::UptimeMonitor, "b", "2000");
        let mut bytes = encode_frame(&a);
        bytes.extend(encode_frame(&b));
        let total = bytes.len();

        // Act: fill the buffer with both frames before decoding either.
        client.write_all(&bytes).await.unwrap();
        while conn.buffered_len() < total {
            conn.stream().readable().await.unwrap();
            conn.buffer.reserve(total);
            match conn.stream.try_read_buf(&mut conn.buffer) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => panic!("read failed: {e}"),
            }
        }

        // Assert
        assert!(conn.has_buffered_frame());
        assert_eq!(conn.poll_frame().unwrap(), Some(a));
        assert!(conn.has_buffered_frame());
        assert_eq!(conn.poll_frame().unwrap(), Some(b));
        assert!(!conn.has_buffered_frame());
    }

    #[tokio::test]
    async fn test_has_buffered_frame_true_for_bad_magic() {
        let (mut conn, _client) = connected_pair().await;
        conn.buffer.extend_from_slice(&[0x00, 0x11, 0x22, 0x33]);
        assert!(conn.has_buffered_frame());
    }

    #[tokio::test]
    async fn test_has_buffered_frame_false_when_empty() {
        let (conn, _client) = connected_pair().await;
        assert!(!conn.has_buffered_frame());
        assert_eq!(conn.peer(), conn.stream().peer_addr().unwrap());
    }
}
