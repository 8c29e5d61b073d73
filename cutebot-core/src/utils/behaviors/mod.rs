//! Control behaviors built on top of the Cutebot drivers.
//!
//! These are pure decision functions: they take sensor readings or remote
//! input and return motor/light intents. The caller owns the loop and the
//! hardware handle.

pub mod avoidance;
pub mod line_follow;
pub mod teleop;

pub use avoidance::{AvoidAction, Avoidance};
pub use line_follow::{countdown, LineFollowMode, LineFollower, Maneuver, Steering};
pub use teleop::{ButtonPacket, ControlPad, ControlPadButton, IrKeymap, IrRemote, PacketError};
