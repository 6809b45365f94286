//! Wire protocol: frame layout, device types, and the binary codec.

pub mod codec;
pub mod frame;

pub use codec::{
    decode_frame, decode_string, decode_u32, encode_frame, encode_header, encode_string,
    encode_string_into, encode_value, encode_value_into, frame_ready, try_decode_frame, Decoded,
    ProtocolError,
};
pub use frame::{DeviceType, Frame, FrameType, UnknownDeviceName, MAGIC};
