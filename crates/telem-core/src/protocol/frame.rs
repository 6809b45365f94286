//! Frame layout, wire constants, and the device type enumeration.
//!
//! Every frame is a chain of big-endian fields with no overall length and no
//! terminator.  The receiver finds the end of a frame purely by following the
//! two length prefixes.
//!
//! ```text
//! [magic:4 = DE AD BE EF][device_type:4][id_len:4][id:id_len][data_len:4][data:data_len]
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Fixed sequence marking the start of every frame.
pub const MAGIC: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Size of one length prefix or integer field on the wire.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Magic + device type + identifier length prefix.
pub const HEADER_PREFIX_SIZE: usize = MAGIC.len() + 2 * LENGTH_PREFIX_SIZE;

// ── Device types ──────────────────────────────────────────────────────────────

/// Closed set of device kinds.  The wire carries the ordinal as a `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u32)]
pub enum DeviceType {
    TempMonitor = 0,
    UptimeMonitor = 1,
}

/// Returned when a configuration name is not in the device type table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown device type name: {0}")]
pub struct UnknownDeviceName(pub String);

impl DeviceType {
    /// Every device type, in ordinal order.  Drives usage listings.
    pub const ALL: [DeviceType; 2] = [DeviceType::TempMonitor, DeviceType::UptimeMonitor];

    /// Wire ordinal.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Configuration name used on the client command line.
    pub fn name(self) -> &'static str {
        match self {
            DeviceType::TempMonitor => "temp-monitor",
            DeviceType::UptimeMonitor => "uptime-monitor",
        }
    }
}

impl TryFrom<u32> for DeviceType {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, u32> {
        match value {
            0 => Ok(DeviceType::TempMonitor),
            1 => Ok(DeviceType::UptimeMonitor),
            other => Err(other),
        }
    }
}

impl FromStr for DeviceType {
    type Err = UnknownDeviceName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| UnknownDeviceName(s.to_string()))
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The device type field exactly as it appeared on the wire.
///
/// Decoding never rejects an ordinal: a frame naming a type this build does
/// not know is still counted under its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameType(pub u32);

impl FrameType {
    /// The matching [`DeviceType`], if the ordinal is one of ours.
    pub fn known(self) -> Option<DeviceType> {
        DeviceType::try_from(self.0).ok()
    }
}

impl From<DeviceType> for FrameType {
    fn from(t: DeviceType) -> Self {
        FrameType(t.as_u32())
    }
}

impl From<u32> for FrameType {
    fn from(raw: u32) -> Self {
        FrameType(raw)
    }
}

impl PartialEq<DeviceType> for FrameType {
    fn eq(&self, other: &DeviceType) -> bool {
        self.0 == other.as_u32()
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known() {
            Some(t) => f.write_str(t.name()),
            None => write!(f, "unknown({})", self.0),
        }
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// One decoded protocol message.
///
/// The identifier is whatever the peer asserted; nothing authenticates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub device_type: FrameType,
    pub identifier: String,
    /// Opaque payload.  Devices send a decimal string, but nothing here relies on it.
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(
        device_type: impl Into<FrameType>,
        identifier: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            device_type: device_type.into(),
            identifier: identifier.into(),
            payload: payload.into(),
        }
    }

    /// Number of bytes this frame occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_PREFIX_SIZE + self.identifier.len() + LENGTH_PREFIX_SIZE + self.payload.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
