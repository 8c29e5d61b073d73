//! I2C actuator control for the Cutebot.
//!
//! Motors, headlights and servos all sit behind the expansion board's single
//! I2C address. Each logical command is a sequence of one or two frames sent
//! back-to-back inside one exclusive [`BusSession`], followed by a fixed
//! settle delay before the bus is used again.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};
use embedded_hal::{delay::DelayNs, i2c::I2c};
use smart_leds_trait::RGB8;

use crate::utils::config::CutebotConfig;
use crate::utils::controllers::protocol::{
    motor_frames, Frame, LightCommand, LightTarget, ServoCommand, ServoTarget, Unit,
};

/// Exclusive access to a shared I2C bus.
///
/// The bus is held for the duration of the closure and released when it
/// returns, on every path. Other drivers on the same bus (e.g. a sensor hub)
/// take the same session by reference.
pub trait BusSession {
    type Bus: I2c;

    fn with_bus<R>(
        &self,
        f: impl FnOnce(&mut Self::Bus) -> R,
    ) -> R;
}

impl<I2C: I2c> BusSession for RefCell<I2C> {
    type Bus = I2C;

    fn with_bus<R>(
        &self,
        f: impl FnOnce(&mut Self::Bus) -> R,
    ) -> R {
        f(&mut self.borrow_mut())
    }
}

impl<M: RawMutex, I2C: I2c> BusSession for Mutex<M, RefCell<I2C>> {
    type Bus = I2C;

    fn with_bus<R>(
        &self,
        f: impl FnOnce(&mut Self::Bus) -> R,
    ) -> R {
        self.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

/// Bounded retries ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` once, then up to `retries` more times while it fails.
///
/// There is no backoff between attempts.
pub fn with_retries<T, E>(
    retries: u16,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, Exhausted<E>> {
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(last_error) if attempts > u32::from(retries) => {
                return Err(Exhausted {
                    attempts,
                    last_error,
                })
            }
            Err(_) => continue,
        }
    }
}

/// Failures of a high-level Cutebot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError<E> {
    /// The command's retry budget ran out on `unit`; the rest of the command
    /// was dropped. `attempts` counts every failed write of the command.
    Bus {
        unit: Unit,
        attempts: u32,
        source: E,
    },
    /// A raw target selector did not name a known light or servo.
    InvalidTarget(u8),
    /// The neopixel driver rejected the write.
    Pixels,
    /// The buzzer could not be driven.
    Tone,
    /// A sensor input could not be read.
    Sensor,
}

impl<E: core::fmt::Debug> core::fmt::Display for CommandError<E> {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        match self {
            CommandError::Bus {
                unit,
                attempts,
                source,
            } => write!(
                f,
                "i2c write to {:?} failed after {} attempts: {:?}",
                unit, attempts, source
            ),
            CommandError::InvalidTarget(raw) => write!(f, "invalid target selector {}", raw),
            CommandError::Pixels => f.write_str("neopixel write failed"),
            CommandError::Tone => f.write_str("buzzer output failed"),
            CommandError::Sensor => f.write_str("sensor read failed"),
        }
    }
}

/// Error type of the I2C bus behind a session.
pub type BusError<S> = <<S as BusSession>::Bus as embedded_hal::i2c::ErrorType>::Error;

/// Driver for every actuator reachable over the Cutebot's I2C address.
pub struct I2CDevices<'a, S, D> {
    bus: &'a S,
    delay: D,
    address: u8,
    settle_delay_ms: u32,
    bus_retries: u8,
    servo_max_angle: u8,
}

impl<'a, S, D> I2CDevices<'a, S, D>
where
    S: BusSession,
    D: DelayNs,
{
    pub fn new(
        bus: &'a S,
        delay: D,
        config: &CutebotConfig,
    ) -> Self {
        I2CDevices {
            bus,
            delay,
            address: config.address,
            settle_delay_ms: config.settle_delay_ms,
            bus_retries: config.bus_retries,
            servo_max_angle: config.servo_max_angle,
        }
    }

    pub fn servo_max_angle(&self) -> u8 {
        self.servo_max_angle
    }

    /// Set both drive motors from signed velocities in `[-100, 100]`.
    ///
    /// `(0, 0)` sends the explicit stop pair (forward, magnitude 0).
    pub fn set_motors(
        &mut self,
        left: f32,
        right: f32,
    ) -> Result<(), CommandError<BusError<S>>> {
        let [l, r] = motor_frames(left, right);
        tracing::debug!(?l, ?r, "set motors");
        self.transmit("motors", &[(l.side.unit(), l.frame()), (r.side.unit(), r.frame())])
    }

    pub fn stop_motors(&mut self) -> Result<(), CommandError<BusError<S>>> {
        self.set_motors(0.0, 0.0)
    }

    /// Set one or both headlights. `LightTarget::None` turns both off.
    pub fn set_headlights(
        &mut self,
        target: LightTarget,
        color: RGB8,
    ) -> Result<(), CommandError<BusError<S>>> {
        let cmd = LightCommand::new(target, color);
        let mut frames = [(Unit::LeftHeadlight, [0; 4]); 2];
        let units = cmd.units();
        for (slot, &unit) in frames.iter_mut().zip(units) {
            *slot = (unit, cmd.frame(unit));
        }
        self.transmit("headlights", &frames[..units.len()])
    }

    /// Move one or both servos; the angle is clamped to `[0, max angle]`.
    pub fn set_servos(
        &mut self,
        target: ServoTarget,
        degrees: f32,
    ) -> Result<(), CommandError<BusError<S>>> {
        let cmd = ServoCommand::from_degrees(target, degrees, self.servo_max_angle);
        let mut frames = [(Unit::ServoS1, [0; 4]); 2];
        let units = cmd.units();
        for (slot, &unit) in frames.iter_mut().zip(units) {
            *slot = (unit, cmd.frame(unit));
        }
        self.transmit("servos", &frames[..units.len()])
    }

    pub fn center_servos(&mut self) -> Result<(), CommandError<BusError<S>>> {
        self.set_servos(ServoTarget::Both, f32::from(self.servo_max_angle / 2))
    }

    /// Send `frames` in one bus session, then wait out the settle delay.
    ///
    /// A frame that fails is resent whole. All frames of the command share
    /// one retry budget; once it runs out the remaining frames are dropped.
    /// The failure is logged and returned, never panicked on.
    fn transmit(
        &mut self,
        what: &'static str,
        frames: &[(Unit, Frame)],
    ) -> Result<(), CommandError<BusError<S>>> {
        let address = self.address;
        let budget = u16::from(self.bus_retries);
        let result: Result<(), CommandError<BusError<S>>> = self.bus.with_bus(|bus| {
            let mut failures: u16 = 0;
            for (unit, frame) in frames {
                // failures <= budget while frames are still being sent
                let remaining = budget - failures;
                let sent = with_retries(remaining, || {
                    bus.write(address, frame).inspect_err(|_| failures += 1)
                });
                if let Err(e) = sent {
                    return Err(CommandError::Bus {
                        unit: *unit,
                        attempts: u32::from(failures),
                        source: e.last_error,
                    });
                }
            }
            Ok(())
        });
        self.delay.delay_ms(self.settle_delay_ms);

        if let Err(e) = &result {
            tracing::warn!("{}: {:?}", what, e);
        }
        result
    }
}
