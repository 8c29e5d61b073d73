//! Piezo buzzer on a variable-frequency PWM pin.

use embedded_hal::{delay::DelayNs, pwm::SetDutyCycle};

use crate::utils::controllers::protocol::ToneCommand;

/// PWM output whose carrier frequency can be changed at runtime.
///
/// `embedded-hal` only covers the duty cycle; the frequency setter is
/// provided by the board HAL.
pub trait TonePwm: SetDutyCycle {
    fn set_frequency(
        &mut self,
        hz: u32,
    ) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneError<E> {
    /// Frequency must be positive.
    InvalidFrequency,
    Pwm(E),
}

/// Blocking tone player.
pub struct Buzzer<P, D> {
    pwm: P,
    delay: D,
}

impl<P, D> Buzzer<P, D>
where
    P: TonePwm,
    D: DelayNs,
{
    pub fn new(
        pwm: P,
        delay: D,
    ) -> Self {
        Buzzer { pwm, delay }
    }

    /// Play `frequency_hz` for `duration_s` seconds at 50% duty.
    pub fn play_tone(
        &mut self,
        frequency_hz: u32,
        duration_s: f32,
    ) -> Result<(), ToneError<P::Error>> {
        self.play(ToneCommand {
            frequency_hz,
            duration_s,
        })
    }

    /// Blocks the caller for the whole duration. Negative or NaN durations
    /// play nothing audible but still toggle the output.
    pub fn play(
        &mut self,
        tone: ToneCommand,
    ) -> Result<(), ToneError<P::Error>> {
        if tone.frequency_hz == 0 {
            tracing::warn!("buzzer: frequency must be positive");
            return Err(ToneError::InvalidFrequency);
        }
        self.pwm
            .set_frequency(tone.frequency_hz)
            .map_err(ToneError::Pwm)?;
        self.pwm
            .set_duty_cycle_fraction(1, 2)
            .map_err(ToneError::Pwm)?;

        self.delay.delay_us(duration_us(tone.duration_s));

        self.pwm.set_duty_cycle_fully_off().map_err(ToneError::Pwm)
    }
}

fn duration_us(duration_s: f32) -> u32 {
    // saturating cast; NaN and negatives become 0
    (duration_s * 1_000_000.0) as u32
}

#[cfg(test)]
mod tests {
    use super::duration_us;

    #[test]
    fn duration_conversion() {
        assert_eq!(duration_us(0.5), 500_000);
        assert_eq!(duration_us(-1.0), 0);
        assert_eq!(duration_us(f32::NAN), 0);
    }
}
