//! Infrastructure layer for the client.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `telem_core`, but MUST NOT be imported by the `application` layer.
//!
//! - **`devices`** – concrete [`Device`](telem_core::Device) variants and the
//!   factory that builds them from command-line pairs.
//! - **`network`** – the TCP connection to the collector, a `FrameSink`.
//! - **`storage`** – optional TOML configuration.

pub mod devices;
pub mod network;
pub mod storage;
