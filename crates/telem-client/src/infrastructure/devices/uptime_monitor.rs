//! Emulated uptime counter.
//!
//! Starts at zero and advances by one poll delay's worth of milliseconds on
//! every refresh.

use std::time::Duration;

use telem_core::{Device, DeviceType};

const POLL_DELAY: Duration = Duration::from_millis(1000);

/// A device reporting milliseconds of emulated uptime.
#[derive(Debug, Clone)]
pub struct UptimeMonitor {
    identifier: String,
    uptime_ms: u64,
}

impl UptimeMonitor {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            uptime_ms: 0,
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        self.uptime_ms
    }
}

impl Device for UptimeMonitor {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::UptimeMonitor
    }

    fn poll_delay(&self) -> Duration {
        POLL_DELAY
    }

    fn refresh_state(&mut self) {
        self.uptime_ms = self.uptime_ms.saturating_add(POLL_DELAY.as_millis() as u64);
    }

    fn payload(&self) -> String {
        self.uptime_ms.to_string()
    }
}
