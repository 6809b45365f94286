//! The device capability contract.
//!
//! A device is identified by an immutable string, has an immutable
//! [`DeviceType`], and keeps some mutable numeric state.  The client loop
//! calls [`Device::refresh_state`] on every device and then
//! [`Device::to_frame`] to get the bytes to send.

use std::time::Duration;

use crate::protocol::codec::{encode_header, encode_string_into};
use crate::protocol::frame::DeviceType;

/// A telemetry-producing device.
///
/// Implementors only supply their identity, a poll delay, a way to refresh
/// their state, and the current value as a string.  Framing is shared.
pub trait Device: Send + Sync {
    /// Identifier, unique among the devices attached to one client.
    fn identifier(&self) -> &str;

    fn device_type(&self) -> DeviceType;

    /// How often the device would naturally produce a new reading.
    ///
    /// Advisory only: the client loop ticks on its own period.
    fn poll_delay(&self) -> Duration;

    /// Moves the internal state to the latest reading.
    fn refresh_state(&mut self);

    /// Current reading in its wire representation.
    fn payload(&self) -> String;

    /// Encodes the current reading as a complete frame.
    ///
    /// Call after [`Device::refresh_state`] to send fresh data.
    fn to_frame(&self) -> Vec<u8> {
        let mut buf = encode_header(self.device_type(), self.identifier());
        encode_string_into(&mut buf, self.payload().as_bytes());
        buf
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
