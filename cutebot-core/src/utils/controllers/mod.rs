//! Module Exports
//!
//! This file exports the actuator controllers of the Cutebot.
//!
//! - `protocol`: frame layout and unit selectors of the expansion board.
//! - `i2c`: motors, headlights and servos over the shared I2C bus.
//! - `leds`: the two directly driven neopixels.
//! - `buzzer`: blocking tone output.

pub mod buzzer;
/// Module for managing I2C-connected actuators.
pub mod i2c;
pub mod leds;
pub mod protocol;

use embedded_hal::{delay::DelayNs, digital::InputPin};
use serde::{Deserialize, Serialize};
use smart_leds_trait::{SmartLedsWrite, RGB8};

pub use buzzer::{Buzzer, ToneError, TonePwm};
pub use i2c::{with_retries, BusError, BusSession, CommandError, Exhausted, I2CDevices};
pub use leds::PixelStrip;
pub use protocol::{LightTarget, ServoTarget};

use crate::utils::sensors::{AnalogInput, ExpansionPorts, RangeFinder, SensorSnapshot, Sensors};

/// High-level command accepted by [`Cutebot::execute_command`].
///
/// Serialized as JSON with tag `"cc"`. Light (`w` 0..=3) and servo
/// (`w` 1..=3) selectors stay raw so that bad input is reported instead of
/// failing deserialization.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "cc", rename_all = "snake_case")] // cc = cutebot command
pub enum CutebotCommand {
    /// Drive motors, signed velocities in `[-100, 100]`.
    M { l: f32, r: f32 },
    /// Stop both motors.
    Stop,
    /// Headlight color.
    H { w: u8, r: i32, g: i32, b: i32 },
    /// Neopixel color.
    P { w: u8, r: i32, g: i32, b: i32 },
    /// Headlights and neopixels off.
    LightsOff,
    /// Servo angle in degrees.
    S { w: u8, a: f32 },
    /// Both servos to mid travel.
    CenterServos,
    /// Tone of `f` Hz for `d` seconds.
    T { f: u32, d: f32 },
    /// Sample every sensor.
    ReadSensors,
}

/// The whole robot: I2C actuators, neopixels, buzzer and sensors.
pub struct Cutebot<'a, S, D, Px, P, L, R, U, A> {
    pub devices: I2CDevices<'a, S, D>,
    pub pixels: PixelStrip<Px>,
    pub buzzer: Buzzer<P, D>,
    pub sensors: Sensors<L, R, U, D>,
    pub ports: ExpansionPorts<A>,
}

impl<'a, S, D, Px, P, L, R, U, A> Cutebot<'a, S, D, Px, P, L, R, U, A>
where
    S: BusSession,
    D: DelayNs,
    Px: SmartLedsWrite<Color = RGB8>,
    Px::Error: core::fmt::Debug,
    P: TonePwm,
    L: InputPin,
    R: InputPin<Error = L::Error>,
    U: RangeFinder,
    A: AnalogInput,
{
    /// Assemble the robot and bring it to a known state: motors stopped,
    /// every light off. Failures are logged; the handle is returned anyway.
    pub fn new(
        devices: I2CDevices<'a, S, D>,
        pixels: PixelStrip<Px>,
        buzzer: Buzzer<P, D>,
        sensors: Sensors<L, R, U, D>,
        ports: ExpansionPorts<A>,
    ) -> Self {
        let mut bot = Cutebot {
            devices,
            pixels,
            buzzer,
            sensors,
            ports,
        };
        if bot.reset().is_err() {
            tracing::error!("Cutebot reset failed, check the expansion board connection");
        }
        bot
    }

    /// Stop the motors and turn every light off.
    pub fn reset(&mut self) -> Result<(), CommandError<BusError<S>>> {
        let motors = self.devices.stop_motors();
        let lights = self.lights_off();
        motors.and(lights)
    }

    /// Headlights off, then neopixels off. Both are attempted even if the
    /// first fails; the first error is returned.
    pub fn lights_off(&mut self) -> Result<(), CommandError<BusError<S>>> {
        let headlights = self.devices.set_headlights(LightTarget::None, protocol::BLACK);
        let pixels = self.set_neopixels(LightTarget::None, protocol::BLACK);
        headlights.and(pixels)
    }

    pub fn set_neopixels(
        &mut self,
        target: LightTarget,
        color: RGB8,
    ) -> Result<(), CommandError<BusError<S>>> {
        self.pixels.set_neopixels(target, color).map_err(|e| {
            tracing::warn!("neopixels: {:?}", e);
            CommandError::Pixels
        })
    }

    pub fn play_tone(
        &mut self,
        frequency_hz: u32,
        duration_s: f32,
    ) -> Result<(), CommandError<BusError<S>>> {
        self.buzzer
            .play_tone(frequency_hz, duration_s)
            .map_err(|e| {
                tracing::warn!("buzzer: {:?}", e);
                CommandError::Tone
            })
    }

    pub fn read_sensors(&mut self) -> Result<SensorSnapshot, CommandError<BusError<S>>> {
        self.sensors.snapshot(Some(&mut self.ports)).map_err(|e| {
            tracing::warn!("tracking pins: {:?}", e);
            CommandError::Sensor
        })
    }

    /// Execute a [`CutebotCommand`].
    ///
    /// Returns sensor data for `ReadSensors` and `None` for everything else.
    /// Unknown selectors are logged and nothing is sent.
    pub fn execute_command(
        &mut self,
        command: CutebotCommand,
    ) -> Result<Option<SensorSnapshot>, CommandError<BusError<S>>> {
        match command {
            CutebotCommand::M { l, r } => self.devices.set_motors(l, r)?,
            CutebotCommand::Stop => self.devices.stop_motors()?,
            CutebotCommand::H { w, r, g, b } => {
                let target = light_target(w)?;
                self.devices
                    .set_headlights(target, protocol::color(r, g, b))?
            }
            CutebotCommand::P { w, r, g, b } => {
                let target = light_target(w)?;
                self.set_neopixels(target, protocol::color(r, g, b))?
            }
            CutebotCommand::LightsOff => self.lights_off()?,
            CutebotCommand::S { w, a } => {
                let target = ServoTarget::try_from(w).map_err(|e| {
                    tracing::warn!("servos: {}, expected 1, 2 or 3", e);
                    CommandError::InvalidTarget(e.0)
                })?;
                self.devices.set_servos(target, a)?
            }
            CutebotCommand::CenterServos => self.devices.center_servos()?,
            CutebotCommand::T { f, d } => self.play_tone(f, d)?,
            CutebotCommand::ReadSensors => return self.read_sensors().map(Some),
        }
        Ok(None)
    }
}

fn light_target<E>(raw: u8) -> Result<LightTarget, CommandError<E>> {
    LightTarget::try_from(raw).map_err(|e| {
        tracing::warn!("lights: {}, expected 0, 1, 2 or 3", e);
        CommandError::InvalidTarget(e.0)
    })
}
