//! Obstacle avoidance from the sonar and an optional proximity sensor.
//!
//! The pixel color shows the current decision: green clear, yellow veering
//! away from something 20-50 cm out, red for anything closer, blue when the
//! proximity sensor fires.

use smart_leds_trait::RGB8;

/// Distance beyond which the way ahead counts as clear.
pub const CLEAR_CM: f32 = 50.0;
/// Distance at or below which the robot veers hard.
pub const NEAR_CM: f32 = 20.0;
/// Proximity reading above which an object is considered touching.
pub const PROXIMITY_LIMIT: u8 = 5;

pub const GREEN: RGB8 = RGB8 { r: 0, g: 255, b: 0 };
pub const YELLOW: RGB8 = RGB8 { r: 255, g: 255, b: 0 };
pub const RED: RGB8 = RGB8 { r: 255, g: 0, b: 0 };
pub const BLUE: RGB8 = RGB8 { r: 0, g: 0, b: 255 };

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvoidAction {
    pub left: f32,
    pub right: f32,
    pub color: RGB8,
    /// Time to keep this action before sampling again.
    pub hold_ms: u32,
}

pub struct Avoidance {
    max_speed: f32,
}

impl Avoidance {
    pub fn new(max_speed: f32) -> Self {
        Avoidance { max_speed }
    }

    pub fn step(
        &self,
        distance_cm: f32,
        proximity: Option<u8>,
    ) -> AvoidAction {
        let max = self.max_speed;
        let half = max / 2.0;

        if proximity.is_some_and(|p| p > PROXIMITY_LIMIT) {
            return AvoidAction {
                left: -max,
                right: -half,
                color: BLUE,
                hold_ms: 200,
            };
        }

        let (left, right, color) = if distance_cm >= CLEAR_CM {
            (max, max, GREEN)
        } else if distance_cm > NEAR_CM {
            let alpha = 1.0 - distance_cm / 200.0;
            (half * alpha, max, YELLOW)
        } else {
            let alpha = -1.0 + distance_cm / 200.0;
            (half * alpha, half, RED)
        };
        AvoidAction {
            left,
            right,
            color,
            hold_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_road_drives_straight() {
        let a = Avoidance::new(50.0).step(120.0, Some(0));
        assert_eq!((a.left, a.right, a.color), (50.0, 50.0, GREEN));
    }

    #[test]
    fn mid_range_veers() {
        let a = Avoidance::new(50.0).step(40.0, None);
        assert_eq!(a.color, YELLOW);
        assert!((a.left - 20.0).abs() < 1e-4);
        assert_eq!(a.right, 50.0);
    }

    #[test]
    fn close_range_reverses_left_wheel() {
        let a = Avoidance::new(50.0).step(10.0, None);
        assert_eq!(a.color, RED);
        assert!(a.left < 0.0);
        assert_eq!(a.right, 25.0);
    }

    #[test]
    fn lost_sonar_reads_as_close() {
        // the sonar sentinel is 0.0
        assert_eq!(Avoidance::new(50.0).step(0.0, None).color, RED);
    }

    #[test]
    fn proximity_wins() {
        let a = Avoidance::new(50.0).step(200.0, Some(9));
        assert_eq!((a.left, a.right, a.color, a.hold_ms), (-50.0, -25.0, BLUE, 200));
    }
}
