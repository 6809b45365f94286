//! # telem-core
//!
//! Shared library for the telemetry emulator: the binary frame codec, the
//! device type enumeration, and the contract every emulated device fulfils.
//!
//! Both the client (which encodes frames) and the server (which decodes them)
//! depend on this crate.  It has no dependency on sockets or async runtimes.
//!
//! - **`protocol`** – how a frame is laid out on the wire and how to encode
//!   and decode it, either from a blocking reader or from a partially filled
//!   receive buffer.
//! - **`domain`** – the [`Device`] trait.  Concrete devices live with the
//!   client; new kinds are added by implementing the trait, never by touching
//!   the codec.

pub mod domain;
pub mod protocol;

pub use domain::device::Device;
pub use protocol::codec::{
    decode_frame, encode_frame, frame_ready, try_decode_frame, Decoded, ProtocolError,
};
pub use protocol::frame::{DeviceType, Frame, FrameType};
