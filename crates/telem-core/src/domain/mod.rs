//! Domain entities shared by the emulator and the collector.
//!
//! Nothing here touches sockets or clocks; devices produce bytes on demand
//! and the outer layers decide when and where to send them.

/// The capability contract every emulated device implements.
pub mod device;
