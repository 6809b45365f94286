//! telem-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! The collector owns one listening socket and any number of accepted device
//! connections, and services all of them from a single task: it waits for
//! the reactor to report readiness, then decodes at most one frame per
//! connection per loop iteration and tallies it by device identifier.

pub mod application;
pub mod infrastructure;
