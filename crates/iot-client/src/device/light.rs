//! RGB light strip device
//!
//! Argument layout after the action index:
//!
//! ```text
//! [speed][brightness][r][g][b][r2][g2][b2]
//! ```
//!
//! | Index | Action      | Reads                              |
//! |-------|-------------|------------------------------------|
//! | 0     | `solid`     | speed (unused), brightness, primary |
//! | 1     | `pulse`     | speed, brightness, primary          |
//! | 2     | `alternate` | all eight bytes                     |
//! | 3     | `off`       | nothing                             |
//!
//! Arguments are positional, so `solid` still consumes the speed slot. A
//! frame shorter than what an action reads fails that action without
//! touching the current state.

use tracing::{debug, info};

use super::{Action, ActionArgs, CommandTable, Device};
use crate::error::DeviceError;

/// 24-bit colour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `0x00RRGGBB`
    pub fn to_u32(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    fn read(args: &mut ActionArgs<'_>, names: &[&'static str; 3]) -> Result<Self, DeviceError> {
        Ok(Self {
            r: args.next_u8(names[0])?,
            g: args.next_u8(names[1])?,
            b: args.next_u8(names[2])?,
        })
    }
}

const PRIMARY: [&str; 3] = ["primary red", "primary green", "primary blue"];
const SECONDARY: [&str; 3] = ["secondary red", "secondary green", "secondary blue"];

/// Effect currently shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Effect {
    Solid,
    Pulse,
    Alternate,
    #[default]
    Off,
}

/// Everything the renderer needs to draw the strip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightState {
    pub effect: Effect,
    pub speed: u8,
    pub brightness: u8,
    pub primary: Rgb,
    pub secondary: Rgb,
}

impl LightState {
    /// Full-brightness solid colour
    pub fn solid(color: Rgb) -> Self {
        Self {
            effect: Effect::Solid,
            speed: 0,
            brightness: u8::MAX,
            primary: color,
            secondary: Rgb::BLACK,
        }
    }
}

/// Pushes a state out to the LEDs
pub trait LightOutput: Send {
    fn render(&mut self, state: &LightState);
}

/// Light strip device
pub struct LightDevice {
    output: Box<dyn LightOutput>,
    table: CommandTable<LightDevice>,
    state: LightState,
}

impl LightDevice {
    pub fn new(output: Box<dyn LightOutput>) -> Result<Self, DeviceError> {
        let entries: [(u8, &'static str, Action<LightDevice>); 4] = [
            (0, "solid", Self::solid),
            (1, "pulse", Self::pulse),
            (2, "alternate", Self::alternate),
            (3, "off", Self::off),
        ];
        Ok(Self {
            output,
            table: CommandTable::new(&entries)?,
            state: LightState::default(),
        })
    }

    pub fn state(&self) -> &LightState {
        &self.state
    }

    fn solid(&mut self, args: &mut ActionArgs<'_>) -> Result<(), DeviceError> {
        let _speed = args.next_u8("speed")?;
        let brightness = args.next_u8("brightness")?;
        let primary = Rgb::read(args, &PRIMARY)?;
        self.show(LightState {
            effect: Effect::Solid,
            speed: 0,
            brightness,
            primary,
            secondary: Rgb::BLACK,
        });
        Ok(())
    }

    fn pulse(&mut self, args: &mut ActionArgs<'_>) -> Result<(), DeviceError> {
        let speed = args.next_u8("speed")?;
        let brightness = args.next_u8("brightness")?;
        let primary = Rgb::read(args, &PRIMARY)?;
        self.show(LightState {
            effect: Effect::Pulse,
            speed,
            brightness,
            primary,
            secondary: Rgb::BLACK,
        });
        Ok(())
    }

    fn alternate(&mut self, args: &mut ActionArgs<'_>) -> Result<(), DeviceError> {
        let speed = args.next_u8("speed")?;
        let brightness = args.next_u8("brightness")?;
        let primary = Rgb::read(args, &PRIMARY)?;
        let secondary = Rgb::read(args, &SECONDARY)?;
        self.show(LightState {
            effect: Effect::Alternate,
            speed,
            brightness,
            primary,
            secondary,
        });
        Ok(())
    }

    fn off(&mut self, _args: &mut ActionArgs<'_>) -> Result<(), DeviceError> {
        self.show(LightState::default());
        Ok(())
    }

    fn show(&mut self, state: LightState) {
        debug!(
            "Light {:?} speed={} brightness={} primary=#{:06X} secondary=#{:06X}",
            state.effect,
            state.speed,
            state.brightness,
            state.primary.to_u32(),
            state.secondary.to_u32()
        );
        self.state = state;
        self.output.render(&self.state);
    }
}

impl Device for LightDevice {
    fn device_type(&self) -> &'static str {
        "rgb_light"
    }

    fn action_count(&self) -> usize {
        self.table.len()
    }

    fn handle(&mut self, action: u8, mut args: ActionArgs<'_>) -> Result<(), DeviceError> {
        let behaviour = self.table.lookup(action)?;
        behaviour(self, &mut args)
    }

    fn on_link_change(&mut self, up: bool) {
        info!("Network link {}", if up { "up" } else { "failed" });
        self.show(LightState::solid(if up { Rgb::GREEN } else { Rgb::RED }));
    }
}
