//! Ultrasonic range finder conditioning.
//!
//! Single echoes are noisy (multipath reflections, missed echoes), so a
//! reading is the median of three raw samples. Timeouts are retried against a
//! small failure budget before the sensor is reported as disconnected.

/// A single-shot echo range finder such as the HC-SR04.
pub trait RangeFinder {
    type Error: core::fmt::Debug;

    /// Trigger one ping and return the distance in centimeters.
    fn measure_once(&mut self) -> Result<f32, Self::Error>;
}

impl<T: RangeFinder + ?Sized> RangeFinder for &mut T {
    type Error = T::Error;

    fn measure_once(&mut self) -> Result<f32, Self::Error> {
        (**self).measure_once()
    }
}

/// Sentinel distance returned when the sensor does not answer.
pub const NO_READING_CM: f32 = 0.0;

/// Samples combined into one reading.
pub const SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceError<E> {
    /// More than the allowed number of pings timed out.
    Disconnected { failures: u16, last_error: E },
}

impl<E: core::fmt::Debug> core::fmt::Display for DistanceError<E> {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        match self {
            DistanceError::Disconnected {
                failures,
                last_error,
            } => write!(
                f,
                "sonar connection error after {} timeouts: {:?}",
                failures, last_error
            ),
        }
    }
}

/// Middle value of three samples, computed as `sum - min - max`.
pub fn median_of_three(samples: [f32; SAMPLES]) -> f32 {
    let [a, b, c] = samples;
    let min = a.min(b).min(c);
    let max = a.max(b).max(c);
    a + b + c - min - max
}
