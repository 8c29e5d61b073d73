//! Utility re-exports for the Cutebot.
//!
//! - `controllers`: I2C actuators, neopixels, buzzer and command dispatch
//! - `sensors`: line tracking, sonar and expansion ports
//! - `behaviors`: line following, obstacle avoidance and remote control
//! - `config`: timing and protocol tunables

pub mod behaviors;
pub mod config;
pub mod controllers;
pub mod sensors;

pub use config::CutebotConfig;
pub use controllers::{Cutebot, CutebotCommand};
pub use sensors::{SensorSnapshot, Sensors, TrackingState};
