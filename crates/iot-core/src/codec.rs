//! Stream codec
//!
//! Two framings are in use by deployed servers:
//!
//! ```text
//! Delimited:        [command][payload ...][0xFF]
//! Length-prefixed:  [len_hi][len_lo][command][payload ...]   len = 1 + payload length
//! ```
//!
//! The strategy is picked once at startup. [`FrameCodec::decode`] pulls at
//! most one frame off the front of a receive buffer and removes the bytes it
//! consumed, including the bytes of a rejected frame. The codec remembers
//! how much of a rejected frame is still in flight and drops it as it
//! arrives, so a frame body is never parsed as a header.

use crate::{cmd, Error, Frame, Result, DEFAULT_MAX_FRAME_LEN, LENGTH_HEADER_SIZE};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// How frame boundaries are marked on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingStrategy {
    /// Body terminated by the 0xFF sentinel
    #[default]
    Delimited,
    /// Body preceded by a big-endian u16 length
    LengthPrefixed,
}

impl FramingStrategy {
    /// Bytes the framing adds around a body
    pub fn overhead(&self) -> usize {
        match self {
            FramingStrategy::Delimited => 1,
            FramingStrategy::LengthPrefixed => LENGTH_HEADER_SIZE,
        }
    }
}

/// Result of a decode attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Frame(Frame),
    NeedMoreData,
}

/// Frame encoder/decoder for one strategy
#[derive(Debug, Clone)]
pub struct FrameCodec {
    strategy: FramingStrategy,
    max_frame_len: usize,
    /// Delimited mode: skipping the tail of an oversize frame
    discarding: bool,
    /// Length-prefixed mode: bytes of a rejected frame still to arrive
    skip_remaining: usize,
}

impl FrameCodec {
    /// Create a codec. `max_frame_len` bounds the body (command + payload);
    /// length-prefixed framing caps it at `u16::MAX`.
    pub fn new(strategy: FramingStrategy, max_frame_len: usize) -> Self {
        let max_frame_len = match strategy {
            FramingStrategy::Delimited => max_frame_len.max(1),
            FramingStrategy::LengthPrefixed => max_frame_len.clamp(1, u16::MAX as usize),
        };
        Self {
            strategy,
            max_frame_len,
            discarding: false,
            skip_remaining: 0,
        }
    }

    pub fn delimited() -> Self {
        Self::new(FramingStrategy::Delimited, DEFAULT_MAX_FRAME_LEN)
    }

    pub fn length_prefixed() -> Self {
        Self::new(FramingStrategy::LengthPrefixed, DEFAULT_MAX_FRAME_LEN)
    }

    pub fn strategy(&self) -> FramingStrategy {
        self.strategy
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Largest wire size of one frame, useful for sizing receive buffers
    pub fn max_wire_len(&self) -> usize {
        self.max_frame_len + self.strategy.overhead()
    }

    /// Decode one frame from the front of `buf`.
    ///
    /// On error the rejected bytes are already removed from `buf`.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Decoded> {
        match self.strategy {
            FramingStrategy::Delimited => self.decode_delimited(buf),
            FramingStrategy::LengthPrefixed => self.decode_length_prefixed(buf),
        }
    }

    fn decode_delimited(&mut self, buf: &mut BytesMut) -> Result<Decoded> {
        if self.discarding {
            match buf.iter().position(|&b| b == cmd::SENTINEL) {
                Some(end) => {
                    buf.advance(end + 1);
                    self.discarding = false;
                }
                None => {
                    buf.clear();
                    return Ok(Decoded::NeedMoreData);
                }
            }
        }

        let scan = buf.len().min(self.max_frame_len + 1);
        match buf[..scan].iter().position(|&b| b == cmd::SENTINEL) {
            Some(0) => {
                buf.advance(1);
                Err(Error::EmptyFrame)
            }
            Some(end) => {
                let mut body = buf.split_to(end);
                buf.advance(1);
                let command = body.get_u8();
                Ok(Decoded::Frame(Frame::new(command, body.freeze())))
            }
            None if buf.len() > self.max_frame_len => {
                let len = buf.len();
                buf.clear();
                self.discarding = true;
                Err(Error::FrameTooLarge {
                    len,
                    max: self.max_frame_len,
                })
            }
            None => Ok(Decoded::NeedMoreData),
        }
    }

    fn decode_length_prefixed(&mut self, buf: &mut BytesMut) -> Result<Decoded> {
        if self.skip_remaining > 0 {
            let skip = self.skip_remaining.min(buf.len());
            buf.advance(skip);
            self.skip_remaining -= skip;
            if self.skip_remaining > 0 {
                return Ok(Decoded::NeedMoreData);
            }
        }

        if buf.len() < LENGTH_HEADER_SIZE {
            return Ok(Decoded::NeedMoreData);
        }

        let declared = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        if declared == 0 {
            buf.advance(LENGTH_HEADER_SIZE);
            return Err(Error::EmptyFrame);
        }

        let available = buf.len() - LENGTH_HEADER_SIZE;
        if declared > self.max_frame_len {
            self.reject(buf, declared);
            return Err(Error::FrameTooLarge {
                len: declared,
                max: self.max_frame_len,
            });
        }
        if available < declared {
            // A short body is a protocol error, not a partial read
            self.reject(buf, declared);
            return Err(Error::Truncated {
                declared,
                available,
            });
        }

        buf.advance(LENGTH_HEADER_SIZE);
        let mut body = buf.split_to(declared);
        let command = body.get_u8();
        Ok(Decoded::Frame(Frame::new(command, body.freeze())))
    }

    /// Drop a rejected length-prefixed frame, including the part of its body
    /// that has not arrived yet
    fn reject(&mut self, buf: &mut BytesMut, declared: usize) {
        let frame_len = LENGTH_HEADER_SIZE + declared;
        if buf.len() >= frame_len {
            buf.advance(frame_len);
        } else {
            self.skip_remaining = frame_len - buf.len();
            buf.clear();
        }
    }

    /// Whether `buf` holds enough for [`decode`](Self::decode) to return a
    /// frame or an error without waiting for more input
    pub fn is_frame_ready(&self, buf: &[u8]) -> bool {
        match self.strategy {
            FramingStrategy::Delimited => {
                buf.len() > self.max_frame_len || buf.contains(&cmd::SENTINEL)
            }
            FramingStrategy::LengthPrefixed => {
                let Some(buf) = buf.get(self.skip_remaining..) else {
                    return false;
                };
                if buf.len() < LENGTH_HEADER_SIZE {
                    return false;
                }
                let declared = u16::from_be_bytes([buf[0], buf[1]]) as usize;
                declared == 0
                    || declared > self.max_frame_len
                    || buf.len() - LENGTH_HEADER_SIZE >= declared
            }
        }
    }

    /// Encode a command byte and payload with this codec's framing
    pub fn encode(&self, command: u8, payload: &[u8]) -> Result<Bytes> {
        let body_len = 1 + payload.len();
        if body_len > self.max_frame_len {
            return Err(Error::PayloadTooLarge {
                len: body_len,
                max: self.max_frame_len,
            });
        }

        let mut buf = BytesMut::with_capacity(body_len + self.strategy.overhead());
        match self.strategy {
            FramingStrategy::Delimited => {
                if command == cmd::SENTINEL {
                    return Err(Error::SentinelInPayload { position: 0 });
                }
                if let Some(i) = payload.iter().position(|&b| b == cmd::SENTINEL) {
                    return Err(Error::SentinelInPayload { position: i + 1 });
                }
                buf.put_u8(command);
                buf.extend_from_slice(payload);
                buf.put_u8(cmd::SENTINEL);
            }
            FramingStrategy::LengthPrefixed => {
                buf.put_u16(body_len as u16);
                buf.put_u8(command);
                buf.extend_from_slice(payload);
            }
        }
        Ok(buf.freeze())
    }

    /// Encode a [`Frame`]
    pub fn encode_frame(&self, frame: &Frame) -> Result<Bytes> {
        self.encode(frame.command, &frame.payload)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::delimited()
    }
}
