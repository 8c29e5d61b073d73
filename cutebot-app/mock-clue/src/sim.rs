//! Simulated Clue + Cutebot hardware for running the drivers on a host.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;
use std::time::Duration;

use cutebot_core::utils::controllers::TonePwm;
use cutebot_core::utils::sensors::{AnalogInput, RangeFinder};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin};
use embedded_hal::i2c::{ErrorKind, ErrorType as I2cErrorType, I2c, Operation};
use embedded_hal::pwm::{ErrorType as PwmErrorType, SetDutyCycle};
use rand::Rng;
use smart_leds_trait::{SmartLedsWrite, RGB8};
use tracing::{debug, info};

/// Physical state the simulated sensors observe.
#[derive(Default)]
pub struct World {
    pub distance_cm: Cell<f32>,
    /// Lateral offset of the chassis from the line centre, in cm.
    pub line_offset: Cell<f32>,
}

/// Half the width of the taped line, in cm.
const LINE_HALF_WIDTH: f32 = 1.5;
/// Distance of each tracking sensor from the chassis centre line, in cm.
const SENSOR_SPACING: f32 = 1.0;

impl World {
    /// Whether the sensor at `side` (-1 left, +1 right) is over the line.
    fn over_line(
        &self,
        side: f32,
    ) -> bool {
        (self.line_offset.get() + side * SENSOR_SPACING).abs() < LINE_HALF_WIDTH
    }

    /// Clue proximity reading (0..=255); rises as an obstacle closes in
    /// under 10 cm.
    pub fn proximity(&self) -> u8 {
        let d = self.distance_cm.get();
        ((10.0 - d).max(0.0) * 25.5).min(255.0) as u8
    }

    /// Advance the robot by one control step with the given wheel velocities.
    pub fn drive(
        &self,
        left: f32,
        right: f32,
    ) {
        let mut rng = rand::rng();
        let turn = right - left;
        let drift: f32 = rng.random_range(-0.3..0.3);
        self.line_offset
            .set(self.line_offset.get() - turn * 0.02 + drift);

        let forward = (left + right) / 2.0;
        let mut d = self.distance_cm.get() - forward * 0.05;
        if turn.abs() > 5.0 {
            d += turn.abs() * 0.1;
        }
        if d > 150.0 || rng.random_bool(0.02) {
            // a new wall comes into view
            d = rng.random_range(15.0..120.0);
        }
        self.distance_cm.set(d.clamp(2.0, 400.0));
    }
}

/// Clamp a user-supplied rate into `[0, 1]`; NaN and infinities disable it.
fn probability(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// I2C bus that logs every write and can inject transient faults.
pub struct SimBus {
    fault_rate: f64,
}

impl SimBus {
    pub fn new(fault_rate: f64) -> Self {
        SimBus {
            fault_rate: probability(fault_rate),
        }
    }
}

impl I2cErrorType for SimBus {
    type Error = ErrorKind;
}

impl I2c for SimBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if rand::rng().random_bool(self.fault_rate) {
            debug!("i2c 0x{:02X}: injected fault", address);
            return Err(ErrorKind::Other);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => info!("i2c 0x{:02X} <- {:02X?}", address, bytes),
                Operation::Read(buf) => buf.fill(0),
            }
        }
        Ok(())
    }
}

/// Tracking photoreflector; active-low like the real sensor.
pub struct SimTrackPin {
    world: Rc<World>,
    side: f32,
}

impl SimTrackPin {
    pub fn left(world: Rc<World>) -> Self {
        SimTrackPin { world, side: -1.0 }
    }

    pub fn right(world: Rc<World>) -> Self {
        SimTrackPin { world, side: 1.0 }
    }
}

impl PinErrorType for SimTrackPin {
    type Error = Infallible;
}

impl InputPin for SimTrackPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.world.over_line(self.side))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.world.over_line(self.side))
    }
}

#[derive(Debug)]
pub struct EchoTimeout;

/// HC-SR04 stand-in with multipath noise and missed echoes.
pub struct SimSonar {
    world: Rc<World>,
    timeout_rate: f64,
}

impl SimSonar {
    pub fn new(
        world: Rc<World>,
        timeout_rate: f64,
    ) -> Self {
        SimSonar {
            world,
            timeout_rate: probability(timeout_rate),
        }
    }
}

impl RangeFinder for SimSonar {
    type Error = EchoTimeout;

    fn measure_once(&mut self) -> Result<f32, Self::Error> {
        let mut rng = rand::rng();
        if rng.random_bool(self.timeout_rate) {
            return Err(EchoTimeout);
        }
        let d = self.world.distance_cm.get();
        if rng.random_bool(0.1) {
            // reflection off a far surface
            return Ok(d * 2.5);
        }
        Ok(d + rng.random_range(-0.15..0.15))
    }
}

pub struct SimAdc(pub u16);

impl AnalogInput for SimAdc {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        Ok(self.0)
    }
}

/// Neopixel driver that prints the strip.
pub struct ConsoleStrip;

impl SmartLedsWrite for ConsoleStrip {
    type Error = Infallible;
    type Color = RGB8;

    fn write<T, I>(
        &mut self,
        iterator: T,
    ) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        for (i, c) in iterator.into_iter().enumerate() {
            let c: RGB8 = c.into();
            info!("pixel {}: ({}, {}, {})", i, c.r, c.g, c.b);
        }
        Ok(())
    }
}

/// Buzzer that logs instead of beeping.
#[derive(Default)]
pub struct ConsoleBuzzer {
    frequency: u32,
}

impl PwmErrorType for ConsoleBuzzer {
    type Error = Infallible;
}

impl SetDutyCycle for ConsoleBuzzer {
    fn max_duty_cycle(&self) -> u16 {
        u16::MAX
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Self::Error> {
        if duty == 0 {
            info!("buzzer off");
        } else {
            info!("buzzer on at {} Hz", self.frequency);
        }
        Ok(())
    }
}

impl TonePwm for ConsoleBuzzer {
    fn set_frequency(
        &mut self,
        hz: u32,
    ) -> Result<(), Self::Error> {
        self.frequency = hz;
        Ok(())
    }
}

/// Blocking delay on the host clock, optionally sped up.
#[derive(Clone, Copy)]
pub struct HostDelay {
    pub speedup: u32,
}

impl DelayNs for HostDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        let ns = ns / self.speedup.max(1);
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}
