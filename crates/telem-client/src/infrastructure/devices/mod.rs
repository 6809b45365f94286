//! Concrete device variants and construction from command-line pairs.
//!
//! Adding a kind means a new module here, a new [`DeviceType`] variant, and
//! one arm in [`build_device`].  The codec and the client loop stay as they
//! are.

pub mod temp_monitor;
pub mod uptime_monitor;

use telem_core::protocol::UnknownDeviceName;
use telem_core::{Device, DeviceType};
use thiserror::Error;

pub use temp_monitor::TempMonitor;
pub use uptime_monitor::UptimeMonitor;

/// Error type for turning `DEVICE_TYPE DEVICE_ID` arguments into devices.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceSpecError {
    /// An odd number of trailing arguments; the last type has no identifier.
    #[error("device type {0:?} is missing its identifier")]
    Unpaired(String),

    #[error("unknown device type {name:?} (expected one of: {expected})")]
    UnknownType { name: String, expected: String },
}

/// Builds a fresh device of the given kind.
pub fn build_device(device_type: DeviceType, identifier: impl Into<String>) -> Box<dyn Device> {
    match device_type {
        DeviceType::TempMonitor => Box::new(TempMonitor::new(identifier)),
        DeviceType::UptimeMonitor => Box::new(UptimeMonitor::new(identifier)),
    }
}

/// Splits `[TYPE, ID, TYPE, ID, ...]` into `(DeviceType, identifier)` pairs.
///
/// # Errors
///
/// [`DeviceSpecError::UnknownType`] for a name not in the device table, and
/// [`DeviceSpecError::Unpaired`] when the list has odd length.
pub fn parse_device_specs(args: &[String]) -> Result<Vec<(DeviceType, String)>, DeviceSpecError> {
    args.chunks(2)
        .map(|pair| match pair {
            [name, id] => {
                let device_type = name.parse::<DeviceType>().map_err(|UnknownDeviceName(name)| {
                    DeviceSpecError::UnknownType {
                        name,
                        expected: supported_type_names(),
                    }
                })?;
                Ok((device_type, id.clone()))
            }
            [name] => Err(DeviceSpecError::Unpaired(name.clone())),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Comma-separated list of every device type name.
pub fn supported_type_names() -> String {
    DeviceType::ALL
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
