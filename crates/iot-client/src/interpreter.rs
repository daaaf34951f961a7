//! Command interpreter
//!
//! Classifies one decoded frame:
//!
//! | Command byte        | Handling                                   |
//! |---------------------|--------------------------------------------|
//! | `0x01` identify     | reply `uuid##type##payload`                |
//! | `0x02` heartbeat    | reply empty heartbeat                      |
//! | `0x03` end session  | device cleanup, session is torn down       |
//! | device family tag   | bounds-checked action dispatch, no reply   |
//! | anything else       | ignored                                    |
//!
//! The interpreter never touches the socket. It returns an [`Outcome`] and
//! the poll loop does the writing.

use iot_core::{cmd, Frame, IdentifyBody};
use tracing::{debug, trace, warn};

use crate::device::{ActionArgs, Device};
use crate::error::DeviceError;

/// Why a device frame was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Family tag without an action byte
    MissingAction,
    /// Action index past the end of the command table
    InvalidAction { action: u8, count: usize },
    /// The behaviour ran and failed
    ActionFailed(DeviceError),
}

/// What the poll loop should do with a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send this frame back
    Reply(Frame),
    /// Close the session
    EndSession,
    /// Device action ran
    Executed { action: u8 },
    /// Unknown command byte, dropped for forward compatibility
    Ignored { command: u8 },
    /// Device frame dropped as a protocol error
    Rejected(Rejection),
}

/// Protocol counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolStats {
    pub frames: u64,
    pub replies: u64,
    pub executed: u64,
    pub framing_errors: u64,
    pub invalid_actions: u64,
    pub failed_actions: u64,
    pub ignored: u64,
}

/// Command interpreter
#[derive(Debug, Default)]
pub struct Interpreter {
    stats: ProtocolStats,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &ProtocolStats {
        &self.stats
    }

    /// Count a frame the codec rejected
    pub fn record_framing_error(&mut self) {
        self.stats.framing_errors += 1;
    }

    /// Interpret one frame against `device`
    pub fn interpret<D: Device + ?Sized>(
        &mut self,
        frame: &Frame,
        identity: &IdentifyBody,
        device: &mut D,
    ) -> Outcome {
        self.stats.frames += 1;
        trace!(
            "Frame: command=0x{:02X} payload={:02X?}",
            frame.command,
            frame.payload.as_ref()
        );

        let outcome = match frame.command {
            cmd::IDENTIFY => {
                debug!("Identify requested");
                Outcome::Reply(Frame::identify(identity))
            }
            cmd::HEARTBEAT => {
                trace!("Heartbeat");
                Outcome::Reply(Frame::heartbeat())
            }
            cmd::END_SESSION => {
                debug!("Server ended the session");
                device.end_session();
                Outcome::EndSession
            }
            tag if tag == device.family_tag() => self.dispatch(&frame.payload, device),
            other => {
                debug!("Ignoring unknown command 0x{:02X}", other);
                Outcome::Ignored { command: other }
            }
        };

        match &outcome {
            Outcome::Reply(_) => self.stats.replies += 1,
            Outcome::Executed { .. } => self.stats.executed += 1,
            Outcome::Ignored { .. } => self.stats.ignored += 1,
            Outcome::Rejected(Rejection::ActionFailed(_)) => self.stats.failed_actions += 1,
            Outcome::Rejected(_) => self.stats.invalid_actions += 1,
            Outcome::EndSession => {}
        }
        outcome
    }

    fn dispatch<D: Device + ?Sized>(&mut self, payload: &[u8], device: &mut D) -> Outcome {
        let Some((&action, args)) = payload.split_first() else {
            warn!("Device frame without an action index");
            return Outcome::Rejected(Rejection::MissingAction);
        };

        let count = device.action_count();
        if action as usize >= count {
            warn!("Action {} out of range ({} actions)", action, count);
            return Outcome::Rejected(Rejection::InvalidAction { action, count });
        }

        debug!("Running device action {}", action);
        match device.handle(action, ActionArgs::new(args)) {
            Ok(()) => Outcome::Executed { action },
            Err(e) => {
                warn!("Device action {} failed: {}", action, e);
                Outcome::Rejected(Rejection::ActionFailed(e))
            }
        }
    }
}
