//! P1/P2 expansion ports.
//!
//! Raw ADC passthrough; no scaling or filtering is applied.

use serde::{Deserialize, Serialize};

/// One ADC channel. `embedded-hal` 1.0 has no ADC trait, so the board HAL
/// implements this one.
pub trait AnalogInput {
    type Error: core::fmt::Debug;

    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalogChannel {
    P1,
    P2,
}

pub struct ExpansionPorts<A> {
    p1: A,
    p2: A,
}

impl<A: AnalogInput> ExpansionPorts<A> {
    pub fn new(
        p1: A,
        p2: A,
    ) -> Self {
        ExpansionPorts { p1, p2 }
    }

    pub fn read_analog(
        &mut self,
        channel: AnalogChannel,
    ) -> Result<u16, A::Error> {
        match channel {
            AnalogChannel::P1 => self.p1.read_raw(),
            AnalogChannel::P2 => self.p2.read_raw(),
        }
    }
}
