//! Network infrastructure for the collector.
//!
//! # Sub-modules
//!
//! - **`connection`** – one accepted device socket plus its receive buffer.
//!   Reads whatever the kernel has without blocking and decodes at most one
//!   frame per call.
//!
//! - **`multiplexer`** – owns the listener and every `Connection`, runs the
//!   accept / read / tear-down loop until cancelled, and keeps the tally.

pub mod connection;
pub mod multiplexer;

pub use connection::{Connection, ConnectionError};
pub use multiplexer::{Multiplexer, ServerError, ServerEvent};
