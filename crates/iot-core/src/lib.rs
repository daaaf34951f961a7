//! iotclient core
//!
//! Wire-level primitives shared by every device build:
//! - Protocol command bytes ([`cmd`])
//! - The [`Frame`] model and identify reply body
//! - Framing strategies and the stream codec ([`FramingStrategy`], [`FrameCodec`])

pub mod codec;
pub mod error;
pub mod frame;

pub use codec::{Decoded, FrameCodec, FramingStrategy};
pub use error::{Error, Result};
pub use frame::{Frame, IdentifyBody};

/// Command bytes understood by every device
pub mod cmd {
    /// Server asks the device to identify itself
    pub const IDENTIFY: u8 = 0x01;
    /// Liveness check, answered with an empty heartbeat frame
    pub const HEARTBEAT: u8 = 0x02;
    /// Server ends the session
    pub const END_SESSION: u8 = 0x03;
    /// End-of-frame marker in delimited mode, never valid inside a frame
    pub const SENTINEL: u8 = 0xFF;
}

/// Separator between the fields of an identify reply
pub const IDENTIFY_SEPARATOR: &str = "##";

/// Default server port
pub const DEFAULT_PORT: u16 = 8595;

/// Default upper bound for one frame body (command byte + payload)
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024;

/// Size of the length header in length-prefixed mode
pub const LENGTH_HEADER_SIZE: usize = 2;
