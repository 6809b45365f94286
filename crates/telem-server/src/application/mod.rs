//! Application layer for the collector.
//!
//! Pure bookkeeping with no socket access:
//!
//! - **`data_pack`** – a decoded frame stamped with its receipt time.
//! - **`tally`**     – per-identifier count of received frames, printed at
//!   shutdown.

pub mod data_pack;
pub mod tally;
