//! telem-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! The client emulates a handful of devices.  Once per tick it refreshes
//! every attached device, then writes one frame per device to the collector,
//! in attachment order, over a single TCP connection.

/// Application layer: the telemetry emission loop and its sink abstraction.
pub mod application;

/// Infrastructure layer: device variants, the server connection, and config.
pub mod infrastructure;
