//! Emulated temperature sensor.
//!
//! Every refresh draws a new reading uniformly from `[0.0, 100.0)`.  The
//! reading goes on the wire with six decimal places.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use telem_core::{Device, DeviceType};

const POLL_DELAY: Duration = Duration::from_millis(1000);
const MAX_TEMPERATURE: f64 = 100.0;

/// A device reporting a random temperature on every refresh.
#[derive(Debug, Clone)]
pub struct TempMonitor {
    identifier: String,
    temperature: f64,
    rng: SmallRng,
}

impl TempMonitor {
    /// Creates a sensor seeded from OS entropy, already holding a first reading.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self::with_rng(identifier, SmallRng::from_entropy())
    }

    /// Deterministic variant for tests.
    pub fn with_seed(identifier: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(identifier, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(identifier: impl Into<String>, rng: SmallRng) -> Self {
        let mut monitor = Self {
            identifier: identifier.into(),
            temperature: 0.0,
            rng,
        };
        monitor.refresh_state();
        monitor
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

impl Device for TempMonitor {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::TempMonitor
    }

    fn poll_delay(&self) -> Duration {
        POLL_DELAY
    }

    fn refresh_state(&mut self) {
        self.temperature = self.rng.gen_range(0.0..MAX_TEMPERATURE);
    }

    fn payload(&self) -> String {
        format!("{:.6}", self.temperature)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
