//! Binary codec for telemetry frames.
//!
//! Wire format:
//! ```text
//! [magic:4][device_type:4][id_len:4][id:id_len][data_len:4][data:data_len]
//! ```
//! All integers are big-endian `u32`.  There is no checksum and no overall
//! frame length; the two length prefixes alone delimit the frame.
//!
//! Two decoding styles are provided:
//!
//! - **Stream decoding** ([`decode_u32`], [`decode_string`], [`decode_frame`])
//!   pulls exact-size reads from any [`std::io::Read`].  On a blocking socket
//!   each call blocks until its bytes arrive, so a slow peer stalls the caller.
//! - **Buffer decoding** ([`try_decode_frame`]) inspects bytes already
//!   received and reports either a complete frame or how many bytes are still
//!   needed.  The collector uses this with a per-connection buffer so that one
//!   slow peer never holds up the others.  [`frame_ready`] answers the same
//!   question without copying the frame out.
//!
//! The device type ordinal is carried through as a [`FrameType`]; an ordinal
//! outside [`DeviceType`](crate::protocol::frame::DeviceType) is not an error.

use std::io::{self, Read};

use thiserror::Error;

use crate::protocol::frame::{Frame, FrameType, HEADER_PREFIX_SIZE, LENGTH_PREFIX_SIZE, MAGIC};

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The first four bytes are not `DE AD BE EF`.  There is no resynchronisation.
    #[error("invalid magic sequence: {found:02X?}")]
    InvalidMagic { found: [u8; 4] },

    /// The source ran dry part-way through a field.
    #[error("short read: need {needed} bytes, got {available}")]
    ShortRead { needed: usize, available: usize },

    /// The source ended cleanly before the first byte of a frame.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Any other read failure reported by the source.
    #[error("I/O error while reading frame: {message}")]
    Io { kind: io::ErrorKind, message: String },
}

impl ProtocolError {
    /// True when the error means the peer went away rather than misbehaved.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ProtocolError::ConnectionClosed | ProtocolError::ShortRead { .. })
    }
}

impl From<io::Error> for ProtocolError {
    fn from(e: io::Error) -> Self {
        ProtocolError::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Outcome of [`try_decode_frame`] on a partially filled buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A whole frame was present; `consumed` bytes should be dropped from the buffer.
    Frame { frame: Frame, consumed: usize },
    /// The buffer must grow to at least `needed` bytes before decoding can progress.
    ///
    /// This is a lower bound: once those bytes arrive a later length prefix
    /// may ask for more.
    Incomplete { needed: usize },
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes a `u32` in network byte order.
pub fn encode_value(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Appends a `u32` in network byte order to `buf`.
pub fn encode_value_into(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&encode_value(value));
}

/// Encodes a byte-length prefix followed by the raw bytes of `s`.
///
/// The length counts bytes, not characters: `"°C"` has a prefix of 3.
pub fn encode_string(s: impl AsRef<[u8]>) -> Vec<u8> {
    let bytes = s.as_ref();
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + bytes.len());
    encode_string_into(&mut buf, bytes);
    buf
}

/// Appends a length-prefixed string to `buf`.
///
/// Inputs longer than `u32::MAX` bytes are clamped so the prefix always
/// matches what was written.
pub fn encode_string_into(buf: &mut Vec<u8>, bytes: &[u8]) {
    let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    encode_value_into(buf, len);
    buf.extend_from_slice(&bytes[..len as usize]);
}

/// Encodes the frame header: magic, device type, and length-prefixed identifier.
///
/// Exactly one header starts every frame; the payload string follows it.
pub fn encode_header(device_type: impl Into<FrameType>, identifier: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_PREFIX_SIZE + identifier.len());
    buf.extend_from_slice(&MAGIC);
    encode_value_into(&mut buf, device_type.into().0);
    encode_string_into(&mut buf, identifier.as_bytes());
    buf
}

/// Encodes a whole [`Frame`].
///
/// # Examples
///
/// ```rust
/// use telem_core::protocol::{decode_frame, encode_frame, DeviceType, Frame};
///
/// let frame = Frame::new(DeviceType::UptimeMonitor, "host-7", "3000");
/// let bytes = encode_frame(&frame);
/// let decoded = decode_frame(&mut bytes.as_slice()).unwrap();
/// assert_eq!(decoded, frame);
/// ```
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut buf = encode_header(frame.device_type, &frame.identifier);
    buf.reserve(LENGTH_PREFIX_SIZE + frame.payload.len());
    encode_string_into(&mut buf, &frame.payload);
    buf
}

// ── Stream decoding ───────────────────────────────────────────────────────────

/// Reads exactly four bytes and converts them from big-endian.
///
/// # Errors
///
/// [`ProtocolError::ShortRead`] if the source ends first.
pub fn decode_u32<R: Read>(source: &mut R) -> Result<u32, ProtocolError> {
    let mut bytes = [0u8; 4];
    read_exact_field(source, &mut bytes)?;
    Ok(u32::from_be_bytes(bytes))
}

/// Reads exactly `length` bytes.
///
/// The buffer grows with the bytes actually received, so a huge declared
/// length does not allocate up front.
///
/// # Errors
///
/// [`ProtocolError::ShortRead`] if the source ends first.
pub fn decode_string<R: Read>(source: &mut R, length: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    (&mut *source).take(length as u64).read_to_end(&mut buf)?;
    if buf.len() < length {
        return Err(ProtocolError::ShortRead {
            needed: length,
            available: buf.len(),
        });
    }
    Ok(buf)
}

/// Reads one complete frame from `source`.
///
/// # Errors
///
/// - [`ProtocolError::ConnectionClosed`] if the source is already at EOF.
/// - [`ProtocolError::InvalidMagic`] if the first four bytes do not match.
/// - [`ProtocolError::ShortRead`] if any later field is truncated.
pub fn decode_frame<R: Read>(source: &mut R) -> Result<Frame, ProtocolError> {
    let mut magic = [0u8; 4];
    match read_exact_field(source, &mut magic) {
        Err(ProtocolError::ShortRead { available: 0, .. }) => {
            return Err(ProtocolError::ConnectionClosed)
        }
        other => other?,
    }
    if magic != MAGIC {
        return Err(ProtocolError::InvalidMagic { found: magic });
    }

    let device_type = FrameType(decode_u32(source)?);

    let id_len = decode_u32(source)? as usize;
    let identifier = decode_string(source, id_len)?;

    let data_len = decode_u32(source)? as usize;
    let payload = decode_string(source, data_len)?;

    Ok(Frame {
        device_type,
        identifier: String::from_utf8_lossy(&identifier).into_owned(),
        payload,
    })
}

// ── Buffer decoding ───────────────────────────────────────────────────────────

/// Decodes one frame from the start of `bytes` without blocking.
///
/// Returns [`Decoded::Incomplete`] until every field is present.  The magic is
/// validated as soon as its bytes arrive, so a bad stream is rejected without
/// waiting for the rest of the frame.
///
/// # Errors
///
/// [`ProtocolError::InvalidMagic`].
pub fn try_decode_frame(bytes: &[u8]) -> Result<Decoded, ProtocolError> {
    let layout = match scan_frame(bytes)? {
        Scan::Complete(layout) => layout,
        Scan::Incomplete { needed } => return Ok(Decoded::Incomplete { needed }),
    };

    let frame = Frame {
        device_type: layout.device_type,
        identifier: String::from_utf8_lossy(&bytes[layout.id_start..layout.id_end]).into_owned(),
        payload: bytes[layout.data_start..layout.data_end].to_vec(),
    };
    Ok(Decoded::Frame {
        frame,
        consumed: layout.data_end,
    })
}

/// True once `bytes` starts with a whole frame.
///
/// Only the magic and the length prefixes are read; nothing is allocated.
///
/// # Errors
///
/// [`ProtocolError::InvalidMagic`], exactly as [`try_decode_frame`] would report it.
pub fn frame_ready(bytes: &[u8]) -> Result<bool, ProtocolError> {
    Ok(matches!(scan_frame(bytes)?, Scan::Complete(_)))
}

/// Field offsets of a frame that is wholly present in a buffer.
struct Layout {
    device_type: FrameType,
    id_start: usize,
    id_end: usize,
    data_start: usize,
    data_end: usize,
}

enum Scan {
    Complete(Layout),
    Incomplete { needed: usize },
}

fn scan_frame(bytes: &[u8]) -> Result<Scan, ProtocolError> {
    let Some(magic) = bytes.get(..MAGIC.len()) else {
        return Ok(Scan::Incomplete { needed: MAGIC.len() });
    };
    if magic != MAGIC {
        let mut found = [0u8; 4];
        found.copy_from_slice(magic);
        return Err(ProtocolError::InvalidMagic { found });
    }

    let type_offset = MAGIC.len();
    let Some(raw_type) = read_u32_at(bytes, type_offset) else {
        return Ok(Scan::Incomplete { needed: type_offset + LENGTH_PREFIX_SIZE });
    };

    let id_len_offset = type_offset + LENGTH_PREFIX_SIZE;
    let Some(id_len) = read_u32_at(bytes, id_len_offset) else {
        return Ok(Scan::Incomplete { needed: HEADER_PREFIX_SIZE });
    };
    let id_start = HEADER_PREFIX_SIZE;
    let id_end = id_start.saturating_add(id_len as usize);

    let data_start = id_end.saturating_add(LENGTH_PREFIX_SIZE);
    let Some(data_len) = read_u32_at(bytes, id_end) else {
        return Ok(Scan::Incomplete { needed: data_start });
    };
    let data_end = data_start.saturating_add(data_len as usize);
    if bytes.len() < data_end {
        return Ok(Scan::Incomplete { needed: data_end });
    }

    Ok(Scan::Complete(Layout {
        device_type: FrameType(raw_type),
        id_start,
        id_end,
        data_start,
        data_end,
    }))
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Fills `buf` completely, retrying on `Interrupted`.
fn read_exact_field<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<(), ProtocolError> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(ProtocolError::ShortRead {
                    needed: buf.len(),
                    available: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn read_u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(LENGTH_PREFIX_SIZE)?;
    let field = bytes.get(offset..end)?;
    Some(u32::from_be_bytes([field[0], field[1], field[2], field[3]]))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
