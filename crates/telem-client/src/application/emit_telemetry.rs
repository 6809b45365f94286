//! EmitTelemetryUseCase: refreshes every attached device and sends its frame.
//!
//! One iteration ("tick") is:
//!
//! ```text
//! refresh_state() on every device, in attachment order
//! to_frame() + send_frame() on every device, in attachment order
//! ```
//!
//! followed by a fixed sleep.  A device's own poll delay does not affect the
//! tick.  Any send failure ends the loop; there is no reconnection.

use std::time::Duration;

use async_trait::async_trait;
use telem_core::Device;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Error type for frame transmission.
#[derive(Debug, Error)]
pub enum SendError {
    /// The sink was closed, or never connected.
    #[error("not connected to the collector")]
    NotConnected,

    /// The underlying write failed.
    #[error("failed to send frame: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for encoded frames.
///
/// Implemented by the TCP connection in the infrastructure layer and by mocks
/// in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSink: Send {
    /// Writes one complete frame.  Returns only once every byte is written.
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), SendError>;

    /// Closes the sink.  Calling it again must be harmless.
    async fn close(&mut self);
}

/// Default pause between ticks.
pub const DEFAULT_SEND_PERIOD: Duration = Duration::from_secs(1);

/// The client loop.
pub struct EmitTelemetryUseCase<S: FrameSink> {
    sink: S,
    devices: Vec<Box<dyn Device>>,
    send_period: Duration,
    closed: bool,
}

impl<S: FrameSink> EmitTelemetryUseCase<S> {
    pub fn new(sink: S, send_period: Duration) -> Self {
        Self {
            sink,
            devices: Vec::new(),
            send_period,
            closed: false,
        }
    }

    /// Adds a device.  Devices are refreshed and sent in the order attached.
    pub fn attach_device(&mut self, device: Box<dyn Device>) {
        info!(
            device = device.identifier(),
            device_type = %device.device_type(),
            "device attached"
        );
        self.devices.push(device);
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Refreshes every device's state.
    pub fn refresh_all(&mut self) {
        for device in &mut self.devices {
            device.refresh_state();
        }
    }

    /// Sends the current frame of every device, one after another.
    ///
    /// Returns the number of frames written.
    ///
    /// # Errors
    ///
    /// The first [`SendError`] from the sink; later devices are not sent.
    pub async fn send_all(&mut self) -> Result<usize, SendError> {
        if self.closed {
            return Err(SendError::NotConnected);
        }
        for device in &self.devices {
            let frame = device.to_frame();
            self.sink.send_frame(&frame).await?;
            debug!(
                device = device.identifier(),
                bytes = frame.len(),
                "frame sent"
            );
        }
        Ok(self.devices.len())
    }

    /// One refresh-then-send iteration.
    ///
    /// # Errors
    ///
    /// See [`EmitTelemetryUseCase::send_all`].
    pub async fn tick(&mut self) -> Result<usize, SendError> {
        self.refresh_all();
        self.send_all().await
    }

    /// Ticks until `shutdown` is cancelled.
    ///
    /// The token is checked once per iteration, before the tick; a
    /// cancellation during the sleep ends it early.  Returns the number of
    /// completed ticks.
    ///
    /// # Errors
    ///
    /// The first [`SendError`]; the sink is left for [`shutdown`](Self::shutdown).
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<u64, SendError> {
        let mut ticks = 0u64;
        while !shutdown.is_cancelled() {
            self.tick().await?;
            ticks += 1;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.send_period) => {}
            }
        }
        info!(ticks, "telemetry loop stopped");
        Ok(ticks)
    }

    /// Closes the sink.  Idempotent.
    pub async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.sink.close().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
