//! Cutebot sensor inputs.
//!
//! - `sonar`: median-filtered ultrasonic distance
//! - `analog`: raw P1/P2 expansion port readings
//!
//! The line-tracking photoreflectors are read directly by [`Sensors`].

pub mod analog;
pub mod sonar;

use embedded_hal::{delay::DelayNs, digital::InputPin};
use serde::{Deserialize, Serialize};

use crate::utils::config::CutebotConfig;
pub use analog::{AnalogChannel, AnalogInput, ExpansionPorts};
pub use sonar::{median_of_three, DistanceError, RangeFinder, NO_READING_CM};

/// Line tracking result. `true` means the sensor sees a dark surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackingState {
    pub left: bool,
    pub right: bool,
}

/// All Cutebot sensors sampled in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub distance_cm: f32,
    pub tracking: TrackingState,
    pub p1: Option<u16>,
    pub p2: Option<u16>,
}

/// Tracking pins plus the ultrasonic range finder.
pub struct Sensors<L, R, U, D> {
    left: L,
    right: R,
    sonar: U,
    delay: D,
    sonar_retries: u8,
    sonar_interval_ms: u32,
}

impl<L, R, U, D> Sensors<L, R, U, D>
where
    L: InputPin,
    R: InputPin<Error = L::Error>,
    U: RangeFinder,
    D: DelayNs,
{
    pub fn new(
        left: L,
        right: R,
        sonar: U,
        delay: D,
        config: &CutebotConfig,
    ) -> Self {
        Sensors {
            left,
            right,
            sonar,
            delay,
            sonar_retries: config.sonar_retries,
            sonar_interval_ms: config.sonar_interval_ms,
        }
    }

    /// Read both line trackers. The pins are active-low: a low level means a
    /// dark surface is under the sensor.
    pub fn read_tracking(&mut self) -> Result<TrackingState, L::Error> {
        Ok(TrackingState {
            left: self.left.is_low()?,
            right: self.right.is_low()?,
        })
    }

    /// Distance to the nearest obstacle in centimeters, or
    /// [`NO_READING_CM`] when the sonar does not answer.
    pub fn read_distance_cm(&mut self) -> f32 {
        match self.try_read_distance_cm() {
            Ok(cm) => cm,
            Err(e) => {
                tracing::warn!("{}", e);
                NO_READING_CM
            }
        }
    }

    /// Median of three pings, tolerating up to the configured number of
    /// timeouts across the whole reading.
    ///
    /// Every attempt is followed by the re-trigger pause, except the one that
    /// exhausts the failure budget.
    pub fn try_read_distance_cm(&mut self) -> Result<f32, DistanceError<U::Error>> {
        let mut samples = [0.0f32; sonar::SAMPLES];
        let mut collected = 0;
        let mut failures: u16 = 0;

        while collected < sonar::SAMPLES {
            match self.sonar.measure_once() {
                Ok(cm) => {
                    samples[collected] = cm;
                    collected += 1;
                }
                Err(last_error) => {
                    failures += 1;
                    tracing::debug!(failures, "sonar timeout");
                    if failures > u16::from(self.sonar_retries) {
                        return Err(DistanceError::Disconnected {
                            failures,
                            last_error,
                        });
                    }
                }
            }
            self.delay.delay_ms(self.sonar_interval_ms);
        }

        Ok(median_of_three(samples))
    }

    /// Sample distance and tracking, plus the expansion ports when given.
    pub fn snapshot<A: AnalogInput>(
        &mut self,
        ports: Option<&mut ExpansionPorts<A>>,
    ) -> Result<SensorSnapshot, L::Error> {
        let distance_cm = self.read_distance_cm();
        let tracking = self.read_tracking()?;
        let (p1, p2) = match ports {
            Some(ports) => (
                ports.read_analog(AnalogChannel::P1).ok(),
                ports.read_analog(AnalogChannel::P2).ok(),
            ),
            None => (None, None),
        };
        Ok(SensorSnapshot {
            distance_cm,
            tracking,
            p1,
            p2,
        })
    }
}
