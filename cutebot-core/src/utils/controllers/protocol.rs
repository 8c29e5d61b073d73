//! Cutebot I2C command protocol.
//!
//! Every actuator on the Cutebot expansion board is driven by a fixed 4-byte
//! frame written to the board's I2C address:
//!
//! ```text
//! [unit selector, param1, param2, param3]
//! ```
//!
//! Unused trailing bytes are always zero. This module only encodes frames; the
//! bus session and retry policy live in [`super::i2c`].

use serde::{Deserialize, Serialize};
use smart_leds_trait::RGB8;

/// Default 7-bit I2C address of the Cutebot expansion board.
pub const CUTEBOT_ADDRESS: u8 = 0x10;

/// Largest motor magnitude accepted by the firmware.
pub const MAX_SPEED: u8 = 100;

/// Default servo travel in degrees.
pub const SERVO_MAX_ANGLE: u8 = 180;

/// One command frame as sent on the wire.
pub type Frame = [u8; 4];

/// Addressable units behind the Cutebot's I2C address (frame byte 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Unit {
    LeftMotor = 0x01,
    RightMotor = 0x02,
    RightHeadlight = 0x04,
    ServoS1 = 0x05,
    ServoS2 = 0x06,
    LeftHeadlight = 0x08,
}

impl Unit {
    pub const fn selector(self) -> u8 {
        self as u8
    }
}

/// Motor direction byte (frame byte 1 of a motor frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Backward = 0x01,
    Forward = 0x02,
}

/// Which drive motor a [`MotorCommand`] addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const fn unit(self) -> Unit {
        match self {
            Side::Left => Unit::LeftMotor,
            Side::Right => Unit::RightMotor,
        }
    }
}

/// Error returned when a raw selector does not name a known target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTarget(pub u8);

impl core::fmt::Display for InvalidTarget {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        write!(f, "invalid target selector {}", self.0)
    }
}

/// Headlight / neopixel selector.
///
/// The raw values (0..=3) are the ones used by the robot's user-facing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LightTarget {
    /// Both lights off, whatever color is supplied.
    None = 0,
    Left = 1,
    Right = 2,
    Both = 3,
}

impl TryFrom<u8> for LightTarget {
    type Error = InvalidTarget;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LightTarget::None),
            1 => Ok(LightTarget::Left),
            2 => Ok(LightTarget::Right),
            3 => Ok(LightTarget::Both),
            other => Err(InvalidTarget(other)),
        }
    }
}

/// Servo selector. Raw values are 1 (S1), 2 (S2) and 3 (both).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServoTarget {
    S1 = 1,
    S2 = 2,
    Both = 3,
}

impl TryFrom<u8> for ServoTarget {
    type Error = InvalidTarget;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ServoTarget::S1),
            2 => Ok(ServoTarget::S2),
            3 => Ok(ServoTarget::Both),
            other => Err(InvalidTarget(other)),
        }
    }
}

/// Clamp an arbitrary integer into a color channel.
pub fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Build a color from unbounded channel values, clamping each into `0..=255`.
pub fn color(
    r: i32,
    g: i32,
    b: i32,
) -> RGB8 {
    RGB8 {
        r: clamp_channel(r),
        g: clamp_channel(g),
        b: clamp_channel(b),
    }
}

pub const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// A single motor frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorCommand {
    pub side: Side,
    pub direction: Direction,
    pub magnitude: u8,
}

impl MotorCommand {
    /// Encode a signed velocity in `[-100, 100]`.
    ///
    /// Out-of-range values saturate, fractions truncate toward zero and NaN
    /// reads as zero. Only strictly positive velocities drive forward; zero
    /// encodes as backward with magnitude 0.
    pub fn from_velocity(
        side: Side,
        velocity: f32,
    ) -> Self {
        let v = clamp_velocity(velocity);
        let direction = if v > 0 {
            Direction::Forward
        } else {
            Direction::Backward
        };
        MotorCommand {
            side,
            direction,
            magnitude: v.unsigned_abs() as u8,
        }
    }

    /// The firmware's stop idiom: forward with magnitude 0.
    pub const fn stop(side: Side) -> Self {
        MotorCommand {
            side,
            direction: Direction::Forward,
            magnitude: 0,
        }
    }

    pub const fn frame(&self) -> Frame {
        [
            self.side.unit().selector(),
            self.direction as u8,
            self.magnitude,
            0,
        ]
    }
}

/// Clamp a velocity to `[-100, 100]` and truncate it to an integer.
pub fn clamp_velocity(velocity: f32) -> i16 {
    // `as` saturates and maps NaN to 0
    let max = MAX_SPEED as f32;
    velocity.clamp(-max, max) as i16
}

/// Encode the frame pair for `setMotors(left, right)`.
///
/// Two zero velocities produce the explicit stop pair; anything else encodes
/// each side independently.
pub fn motor_frames(
    left: f32,
    right: f32,
) -> [MotorCommand; 2] {
    if clamp_velocity(left) == 0 && clamp_velocity(right) == 0 {
        return [MotorCommand::stop(Side::Left), MotorCommand::stop(Side::Right)];
    }
    [
        MotorCommand::from_velocity(Side::Left, left),
        MotorCommand::from_velocity(Side::Right, right),
    ]
}

/// A headlight write for one or two units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightCommand {
    pub target: LightTarget,
    pub color: RGB8,
}

impl LightCommand {
    pub const fn new(
        target: LightTarget,
        color: RGB8,
    ) -> Self {
        LightCommand { target, color }
    }

    /// Units addressed by this command, left before right.
    pub const fn units(&self) -> &'static [Unit] {
        match self.target {
            LightTarget::None | LightTarget::Both => {
                &[Unit::LeftHeadlight, Unit::RightHeadlight]
            }
            LightTarget::Left => &[Unit::LeftHeadlight],
            LightTarget::Right => &[Unit::RightHeadlight],
        }
    }

    /// Color actually sent; `None` always sends black.
    pub const fn effective_color(&self) -> RGB8 {
        match self.target {
            LightTarget::None => BLACK,
            _ => self.color,
        }
    }

    pub fn frame(
        &self,
        unit: Unit,
    ) -> Frame {
        let c = self.effective_color();
        [unit.selector(), c.r, c.g, c.b]
    }
}

/// A servo write for one or both servos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoCommand {
    pub target: ServoTarget,
    pub angle: u8,
}

impl ServoCommand {
    /// Clamp `degrees` into `[0, max_angle]`, truncating fractions.
    pub fn from_degrees(
        target: ServoTarget,
        degrees: f32,
        max_angle: u8,
    ) -> Self {
        let angle = degrees.clamp(0.0, max_angle as f32) as u8;
        ServoCommand { target, angle }
    }

    pub const fn units(&self) -> &'static [Unit] {
        match self.target {
            ServoTarget::S1 => &[Unit::ServoS1],
            ServoTarget::S2 => &[Unit::ServoS2],
            ServoTarget::Both => &[Unit::ServoS1, Unit::ServoS2],
        }
    }

    pub const fn frame(
        &self,
        unit: Unit,
    ) -> Frame {
        [unit.selector(), self.angle, 0, 0]
    }
}

/// Tone request for the buzzer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCommand {
    pub frequency_hz: u32,
    pub duration_s: f32,
}
