//! Host stand-ins for device hardware
//!
//! There is no bolt or LED strip on a workstation, so actuation is logged.

use iot_client::device::light::{Effect, LightDevice, LightOutput, LightState};
use iot_client::device::lock::{LockActuator, LockDevice};
use iot_client::{AnyDevice, DeviceError, DeviceKind};
use tracing::info;

/// LEDs on the reference strip
const NUM_LEDS: usize = 15;

pub struct LoggedLock;

impl LockActuator for LoggedLock {
    fn set_engaged(&mut self, engaged: bool) {
        info!("[lock] bolt {}", if engaged { "engaged" } else { "retracted" });
    }
}

pub struct LoggedStrip {
    leds: usize,
}

impl LightOutput for LoggedStrip {
    fn render(&mut self, state: &LightState) {
        match state.effect {
            Effect::Off => info!("[strip] {} leds off", self.leds),
            effect => info!(
                "[strip] {} leds {:?} #{:06X}/#{:06X} brightness {} speed {}",
                self.leds,
                effect,
                state.primary.to_u32(),
                state.secondary.to_u32(),
                state.brightness,
                state.speed
            ),
        }
    }
}

/// Build the device variant for `kind` with logging actuators
pub fn build_device(kind: DeviceKind) -> Result<AnyDevice, DeviceError> {
    Ok(match kind {
        DeviceKind::Lock => AnyDevice::Lock(LockDevice::new(Box::new(LoggedLock))?),
        DeviceKind::RgbLight => {
            AnyDevice::Light(LightDevice::new(Box::new(LoggedStrip { leds: NUM_LEDS }))?)
        }
    })
}
