//! Line following on the two tracking sensors.
//!
//! A dark line under both sensors means the robot is centred. When only one
//! sensor sees the line the robot pivots toward it by stopping the motor on
//! that side.

use serde::{Deserialize, Serialize};

use crate::utils::sensors::TrackingState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineFollowMode {
    /// Stop when the line is lost.
    Simple,
    /// Spin toward the side the line was last seen on.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maneuver {
    Forward,
    Left,
    Right,
    SpinLeft,
    SpinRight,
    Stop,
}

/// Motor velocities chosen for one control step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Steering {
    pub left: f32,
    pub right: f32,
    pub maneuver: Maneuver,
}

pub struct LineFollower {
    speed: f32,
    mode: LineFollowMode,
    last_turn_was_left: bool,
}

impl LineFollower {
    pub fn new(
        speed: f32,
        mode: LineFollowMode,
    ) -> Self {
        LineFollower {
            speed,
            mode,
            last_turn_was_left: true,
        }
    }

    pub fn step(
        &mut self,
        tracking: TrackingState,
    ) -> Steering {
        let s = self.speed;
        let (left, right, maneuver) = match (tracking.left, tracking.right) {
            (true, true) => (s, s, Maneuver::Forward),
            (false, true) => {
                self.last_turn_was_left = false;
                (s, 0.0, Maneuver::Right)
            }
            (true, false) => {
                self.last_turn_was_left = true;
                (0.0, s, Maneuver::Left)
            }
            (false, false) => match self.mode {
                LineFollowMode::Simple => (0.0, 0.0, Maneuver::Stop),
                LineFollowMode::Memory if self.last_turn_was_left => (-s, s, Maneuver::SpinLeft),
                LineFollowMode::Memory => (s, -s, Maneuver::SpinRight),
            },
        };
        Steering {
            left,
            right,
            maneuver,
        }
    }
}

/// G6 F6 E6 D6 C6, the last note held twice as long.
const COUNTDOWN_HZ: [u32; 5] = [1568, 1397, 1319, 1175, 1047];

/// Notes of the start countdown as `(frequency Hz, seconds)`.
///
/// The total length is at least 1.5 s and is split into sixths.
pub fn countdown(total_s: f32) -> [(u32, f32); 5] {
    let unit = total_s.max(1.5) / 6.0;
    let mut notes = [(0, unit); 5];
    for (note, hz) in notes.iter_mut().zip(COUNTDOWN_HZ) {
        note.0 = hz;
    }
    notes[4].1 = unit * 2.0;
    notes
}
