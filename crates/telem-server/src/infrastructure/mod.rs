//! Infrastructure layer for the collector.
//!
//! Contains the OS-facing pieces: the listening socket and connection
//! multiplexer, and TOML configuration loading.
//!
//! **Dependency rule**: this layer may depend on `application` and `telem_core`,
//! but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
