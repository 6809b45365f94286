//! Application layer use cases for the client.
//!
//! - **`emit_telemetry`** – the refresh-then-send loop.  It talks to the
//!   network only through the [`FrameSink`](emit_telemetry::FrameSink)
//!   trait, so tests drive it with mocks.

pub mod emit_telemetry;
