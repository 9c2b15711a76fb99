//! Localization: wheel odometry weighted by the IMU heading.
//!
//! Each tick the forward distance is the mean of the two wheel deltas
//! scaled by the wheel radius; the heading comes straight from the IMU
//! filter (single source of truth) and the position translates along the
//! new heading. Position grows without bound — no wrap is ever applied.

use mule_common::consts::WHEEL_RADIUS_MM;
use mule_common::math::Pose2D;

/// Integrated pose on the mat.
#[derive(Debug, Clone)]
pub struct Localization {
    pose: Pose2D,
    last_left_rad: f64,
    last_right_rad: f64,
    primed: bool,
}

impl Localization {
    pub fn new() -> Self {
        Self {
            pose: Pose2D::default(),
            last_left_rad: 0.0,
            last_right_rad: 0.0,
            primed: false,
        }
    }

    /// Integrate one tick of encoder data with the fused heading.
    ///
    /// The first call only latches the encoder baseline.
    pub fn update(&mut self, left_pos_rad: f64, right_pos_rad: f64, heading_rad: f64) {
        if !self.primed {
            self.last_left_rad = left_pos_rad;
            self.last_right_rad = right_pos_rad;
            self.primed = true;
            self.pose = Pose2D::new(self.pose.x_mm, self.pose.y_mm, heading_rad);
            return;
        }

        let d_left = (left_pos_rad - self.last_left_rad) * WHEEL_RADIUS_MM;
        let d_right = (right_pos_rad - self.last_right_rad) * WHEEL_RADIUS_MM;
        self.last_left_rad = left_pos_rad;
        self.last_right_rad = right_pos_rad;

        let forward = 0.5 * (d_left + d_right);
        self.pose = Pose2D::new(self.pose.x_mm, self.pose.y_mm, heading_rad).advanced(forward);
    }

    /// Current pose (value at the end of the last tick).
    #[inline]
    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    /// Overwrite the pose (known-landmark sighting). Atomic with respect
    /// to the tick: the caller invokes this between updates only. The
    /// encoder baseline is preserved so no motion is lost.
    pub fn set_pose(&mut self, pose: Pose2D) {
        self.pose = pose;
    }

    /// Return to the boot state.
    pub fn reset(&mut self) {
        self.pose = Pose2D::default();
        self.primed = false;
    }
}

impl Default for Localization {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::FRAC_PI_2;

    #[test]
    fn first_update_only_primes() {
        let mut loc = Localization::new();
        loc.update(100.0, 100.0, 0.0);
        assert_eq!(loc.pose().x_mm, 0.0);
    }

    #[test]
    fn straight_motion_integrates_along_heading() {
        let mut loc = Localization::new();
        loc.update(0.0, 0.0, 0.0);
        // Both wheels advance 1 rad → forward = WHEEL_RADIUS_MM.
        loc.update(1.0, 1.0, 0.0);
        assert!((loc.pose().x_mm - WHEEL_RADIUS_MM).abs() < 1e-9);
        assert_eq!(loc.pose().y_mm, 0.0);
    }

    #[test]
    fn heading_comes_from_the_filter() {
        let mut loc = Localization::new();
        loc.update(0.0, 0.0, 0.0);
        loc.update(1.0, 1.0, FRAC_PI_2);
        // Translation happens along the new heading.
        assert!(loc.pose().x_mm.abs() < 1e-9);
        assert!((loc.pose().y_mm - WHEEL_RADIUS_MM).abs() < 1e-9);
        assert!((loc.pose().heading_rad - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn point_turn_does_not_translate() {
        let mut loc = Localization::new();
        loc.update(0.0, 0.0, 0.0);
        loc.update(-0.5, 0.5, 0.3);
        assert!(loc.pose().position().length() < 1e-9);
    }

    #[test]
    fn set_pose_round_trips() {
        let mut loc = Localization::new();
        loc.update(0.0, 0.0, 0.0);
        let p = Pose2D::new(120.0, -44.0, 0.7);
        loc.set_pose(p);
        assert_eq!(loc.pose(), p);
        // Further motion continues from the set pose.
        loc.update(1.0, 1.0, 0.7);
        assert!(loc.pose().position().distance(p.position()) > 0.0);
    }

    #[test]
    fn reset_returns_to_origin() {
        let mut loc = Localization::new();
        loc.update(0.0, 0.0, 0.0);
        loc.update(5.0, 5.0, 0.0);
        loc.reset();
        assert_eq!(loc.pose(), Pose2D::default());
    }
}
