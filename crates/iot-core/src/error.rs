//! Error types for frame handling

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Framing errors. Every variant means the offending frame is dropped while
/// the session stays up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No end of frame within the allowed length, or a length header above it
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// Length header promises more bytes than were received
    #[error("truncated frame: header declares {declared} bytes, {available} available")]
    Truncated { declared: usize, available: usize },

    /// Frame with no command byte
    #[error("empty frame")]
    EmptyFrame,

    /// Sentinel byte inside a delimited frame body
    #[error("sentinel byte 0xff at body offset {position}")]
    SentinelInPayload { position: usize },

    /// Outgoing payload exceeds the configured maximum
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },
}
