//! Lock actuator device
//!
//! | Index | Action    |
//! |-------|-----------|
//! | 0     | `release` |
//! | 1     | `engage`  |
//!
//! Neither action takes arguments; trailing bytes are ignored.

use tracing::info;

use super::{Action, ActionArgs, CommandTable, Device};
use crate::error::DeviceError;

/// Drives the physical bolt
pub trait LockActuator: Send {
    fn set_engaged(&mut self, engaged: bool);
}

/// Lock device
pub struct LockDevice {
    actuator: Box<dyn LockActuator>,
    table: CommandTable<LockDevice>,
    engaged: Option<bool>,
}

impl LockDevice {
    pub fn new(actuator: Box<dyn LockActuator>) -> Result<Self, DeviceError> {
        let entries: [(u8, &'static str, Action<LockDevice>); 2] =
            [(0, "release", Self::release), (1, "engage", Self::engage)];
        Ok(Self {
            actuator,
            table: CommandTable::new(&entries)?,
            engaged: None,
        })
    }

    /// Last commanded position, `None` before the first command
    pub fn engaged(&self) -> Option<bool> {
        self.engaged
    }

    fn release(&mut self, _args: &mut ActionArgs<'_>) -> Result<(), DeviceError> {
        self.set(false);
        Ok(())
    }

    fn engage(&mut self, _args: &mut ActionArgs<'_>) -> Result<(), DeviceError> {
        self.set(true);
        Ok(())
    }

    fn set(&mut self, engaged: bool) {
        info!("Lock {}", if engaged { "engaged" } else { "released" });
        self.actuator.set_engaged(engaged);
        self.engaged = Some(engaged);
    }
}

impl Device for LockDevice {
    fn device_type(&self) -> &'static str {
        "lock"
    }

    fn action_count(&self) -> usize {
        self.table.len()
    }

    fn handle(&mut self, action: u8, mut args: ActionArgs<'_>) -> Result<(), DeviceError> {
        let behaviour = self.table.lookup(action)?;
        behaviour(self, &mut args)
    }
}
