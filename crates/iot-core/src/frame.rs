//! Protocol frames
//!
//! A frame body is always a command byte followed by payload bytes:
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Byte 0:     Command                                         │
//! │             0x01 identify, 0x02 heartbeat, 0x03 end session │
//! │             anything else: device family tag                │
//! │ Byte 1..:   Payload (device frames: action index + args)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//! How the body is delimited on the wire depends on the active
//! [`FramingStrategy`](crate::FramingStrategy).

use crate::{cmd, IDENTIFY_SEPARATOR};
use bytes::Bytes;

/// One protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame from a command byte and payload
    pub fn new(command: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    /// Frame carrying only a command byte
    pub fn command_only(command: u8) -> Self {
        Self {
            command,
            payload: Bytes::new(),
        }
    }

    /// Heartbeat reply, empty payload
    pub fn heartbeat() -> Self {
        Self::command_only(cmd::HEARTBEAT)
    }

    /// Identify reply carrying the device description
    pub fn identify(body: &IdentifyBody) -> Self {
        Self::new(cmd::IDENTIFY, body.to_bytes())
    }

    /// Split a frame body (`[command][payload..]`) into a frame
    pub fn from_body(body: &[u8]) -> Option<Self> {
        let (&command, payload) = body.split_first()?;
        Some(Self::new(command, Bytes::copy_from_slice(payload)))
    }

    /// Command byte plus payload length
    pub fn body_len(&self) -> usize {
        1 + self.payload.len()
    }

    pub fn is_heartbeat(&self) -> bool {
        self.command == cmd::HEARTBEAT
    }
}

/// Identify reply body: `uuid##type##payload`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyBody {
    pub uuid: String,
    pub device_type: String,
    pub payload: String,
}

impl IdentifyBody {
    pub fn new(
        uuid: impl Into<String>,
        device_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            device_type: device_type.into(),
            payload: payload.into(),
        }
    }

    /// Render as the wire text
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(
            self.uuid.len() + self.device_type.len() + self.payload.len() + 4,
        );
        text.push_str(&self.uuid);
        text.push_str(IDENTIFY_SEPARATOR);
        text.push_str(&self.device_type);
        text.push_str(IDENTIFY_SEPARATOR);
        text.push_str(&self.payload);
        text
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_text())
    }

    /// Parse wire text. The payload may itself contain the separator.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.splitn(3, IDENTIFY_SEPARATOR);
        let uuid = parts.next()?;
        let device_type = parts.next()?;
        let payload = parts.next()?;
        Some(Self::new(uuid, device_type, payload))
    }
}
