//! Tunables for the Cutebot driver stack.
//!
//! Defaults match the board firmware and the HC-SR04 timing; a host can
//! override them from a JSON file (missing fields keep their defaults).

use serde::{Deserialize, Serialize};

use crate::utils::controllers::protocol::{CUTEBOT_ADDRESS, SERVO_MAX_ANGLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutebotConfig {
    /// 7-bit I2C address of the expansion board.
    pub address: u8,
    /// Pause after every bus session so the firmware can apply the command.
    pub settle_delay_ms: u32,
    /// Extra attempts per command after the first write fails, shared by
    /// all of the command's frames.
    pub bus_retries: u8,
    /// Upper bound for servo angles, in degrees.
    pub servo_max_angle: u8,
    /// Sonar timeouts tolerated before reporting a connection fault.
    pub sonar_retries: u8,
    /// Minimum spacing between two sonar triggers.
    pub sonar_interval_ms: u32,
}

impl Default for CutebotConfig {
    fn default() -> Self {
        CutebotConfig {
            address: CUTEBOT_ADDRESS,
            settle_delay_ms: 100,
            bus_retries: 12,
            servo_max_angle: SERVO_MAX_ANGLE,
            sonar_retries: 8,
            sonar_interval_ms: 25,
        }
    }
}
