//! DataPack: a decoded frame stamped with its receipt time.
//!
//! A pack is created for every frame the multiplexer decodes, recorded in the
//! [`IngestionTally`](crate::application::tally::IngestionTally), logged, and
//! then dropped.  Nothing keeps packs around.

use std::time::{SystemTime, UNIX_EPOCH};

use telem_core::{Frame, FrameType};

/// A received frame plus the wall-clock second it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPack {
    pub device_id: String,
    /// Ordinal as received; it may name a type this build does not know.
    pub device_type: FrameType,
    pub data: Vec<u8>,
    /// Seconds since the Unix epoch at receipt.
    pub timestamp: u64,
}

impl DataPack {
    /// Stamps `frame` with the current time.
    pub fn new(frame: Frame) -> Self {
        Self::with_timestamp(frame, current_timestamp_secs())
    }

    pub fn with_timestamp(frame: Frame, timestamp: u64) -> Self {
        Self {
            device_id: frame.identifier,
            device_type: frame.device_type,
            data: frame.payload,
            timestamp,
        }
    }

    /// Payload as text for logging.  Devices send decimal strings.
    pub fn data_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

fn current_timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
