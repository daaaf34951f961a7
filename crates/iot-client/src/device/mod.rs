//! Device capability and command tables
//!
//! A device-specific frame is `[family tag][action index][args...]`. The core
//! checks the tag and the index bounds; everything past the index belongs to
//! the device. Each variant owns a [`CommandTable`] built and validated at
//! construction.

pub mod light;
pub mod lock;

use std::fmt;
use std::str::FromStr;

use crate::error::DeviceError;
use light::LightDevice;
use lock::LockDevice;

/// Family tag shared by the shipped device variants
pub const DEVICE_FAMILY_TAG: u8 = 0x64;

/// What the command interpreter needs from a device
pub trait Device: Send {
    /// Type string sent on identify
    fn device_type(&self) -> &'static str;

    /// Command byte that marks frames for this device
    fn family_tag(&self) -> u8 {
        DEVICE_FAMILY_TAG
    }

    /// Number of entries in the command table
    fn action_count(&self) -> usize;

    /// Run action `action` with the bytes that followed it on the wire
    fn handle(&mut self, action: u8, args: ActionArgs<'_>) -> Result<(), DeviceError>;

    /// Session-end cleanup
    fn end_session(&mut self) {}

    /// Network link came up (`true`) or provisioning failed (`false`)
    fn on_link_change(&mut self, _up: bool) {}
}

/// Bounded reader over an action's argument bytes
#[derive(Debug, Clone)]
pub struct ActionArgs<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ActionArgs<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Next byte, or `MissingArgument` when the frame ended early
    pub fn next_u8(&mut self, name: &'static str) -> Result<u8, DeviceError> {
        let byte = self
            .bytes
            .get(self.pos)
            .copied()
            .ok_or(DeviceError::MissingArgument {
                name,
                offset: self.pos,
                available: self.bytes.len(),
            })?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Behaviour bound to an action index
pub type Action<D> = fn(&mut D, &mut ActionArgs<'_>) -> Result<(), DeviceError>;

/// Ordered action table of one device variant
pub struct CommandTable<D> {
    entries: Vec<(&'static str, Action<D>)>,
}

impl<D> CommandTable<D> {
    /// Build from `(index, name, behaviour)` entries. Indices must be
    /// contiguous from 0 in any order, with no duplicates.
    pub fn new(entries: &[(u8, &'static str, Action<D>)]) -> Result<Self, DeviceError> {
        if entries.is_empty() {
            return Err(DeviceError::InvalidTable("table is empty".into()));
        }
        if entries.len() > u8::MAX as usize + 1 {
            return Err(DeviceError::InvalidTable(format!(
                "{} entries do not fit a one-byte index",
                entries.len()
            )));
        }

        let mut slots: Vec<Option<(&'static str, Action<D>)>> = vec![None; entries.len()];
        for &(index, name, action) in entries {
            let slot = slots.get_mut(index as usize).ok_or_else(|| {
                DeviceError::InvalidTable(format!(
                    "index {index} ({name}) leaves a gap in {} entries",
                    entries.len()
                ))
            })?;
            if slot.is_some() {
                return Err(DeviceError::InvalidTable(format!(
                    "index {index} ({name}) registered twice"
                )));
            }
            *slot = Some((name, action));
        }

        Ok(Self {
            entries: slots.into_iter().flatten().collect(),
        })
    }

    /// Behaviour for `action`, bounds-checked
    pub fn lookup(&self, action: u8) -> Result<Action<D>, DeviceError> {
        self.entries
            .get(action as usize)
            .map(|&(_, behaviour)| behaviour)
            .ok_or(DeviceError::UnknownAction {
                action,
                count: self.entries.len(),
            })
    }

    pub fn name(&self, action: u8) -> Option<&'static str> {
        self.entries.get(action as usize).map(|&(name, _)| name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<D> fmt::Debug for CommandTable<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Device variants this build knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Lock,
    RgbLight,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Lock => "lock",
            DeviceKind::RgbLight => "rgb_light",
        }
    }
}

impl FromStr for DeviceKind {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lock" => Ok(DeviceKind::Lock),
            "rgb_light" | "light" => Ok(DeviceKind::RgbLight),
            other => Err(DeviceError::UnknownDeviceType(other.to_string())),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged union of the shipped devices
pub enum AnyDevice {
    Lock(LockDevice),
    Light(LightDevice),
}

impl AnyDevice {
    pub fn kind(&self) -> DeviceKind {
        match self {
            AnyDevice::Lock(_) => DeviceKind::Lock,
            AnyDevice::Light(_) => DeviceKind::RgbLight,
        }
    }

    fn inner(&self) -> &dyn Device {
        match self {
            AnyDevice::Lock(d) => d,
            AnyDevice::Light(d) => d,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Device {
        match self {
            AnyDevice::Lock(d) => d,
            AnyDevice::Light(d) => d,
        }
    }
}

impl Device for AnyDevice {
    fn device_type(&self) -> &'static str {
        self.inner().device_type()
    }

    fn family_tag(&self) -> u8 {
        self.inner().family_tag()
    }

    fn action_count(&self) -> usize {
        self.inner().action_count()
    }

    fn handle(&mut self, action: u8, args: ActionArgs<'_>) -> Result<(), DeviceError> {
        self.inner_mut().handle(action, args)
    }

    fn end_session(&mut self) {
        self.inner_mut().end_session()
    }

    fn on_link_change(&mut self, up: bool) {
        self.inner_mut().on_link_change(up)
    }
}

impl From<LockDevice> for AnyDevice {
    fn from(device: LockDevice) -> Self {
        AnyDevice::Lock(device)
    }
}

impl From<LightDevice> for AnyDevice {
    fn from(device: LightDevice) -> Self {
        AnyDevice::Light(device)
    }
}
