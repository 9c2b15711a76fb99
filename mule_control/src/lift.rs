//! Lift controller: the joint cascade plus the height ↔ angle mapping.
//!
//! The lift is commanded either by angle or by gripper height. Height
//! commands convert to an angle target through a fixed table anchored at
//! the three calibrated heights (low dock, carry, high dock) with linear
//! interpolation between anchors; the exposed height derives from the
//! measured angle through the four-bar geometry.

use mule_common::consts::{
    LIFT_ARM_LENGTH_MM, LIFT_HEIGHT_CARRY_MM, LIFT_HEIGHT_HIGH_DOCK_MM, LIFT_HEIGHT_LOW_DOCK_MM,
    LIFT_MAX_ANGLE_RAD, LIFT_MIN_ANGLE_RAD, LIFT_PIVOT_HEIGHT_MM,
};

use crate::config::JointConfig;
use crate::joint::JointController;

/// Gripper height for a lift angle [mm].
#[inline]
pub fn height_from_angle(angle_rad: f64) -> f64 {
    LIFT_PIVOT_HEIGHT_MM + LIFT_ARM_LENGTH_MM * angle_rad.sin()
}

/// Exact lift angle for an anchor height [rad].
#[inline]
fn anchor_angle(height_mm: f64) -> f64 {
    ((height_mm - LIFT_PIVOT_HEIGHT_MM) / LIFT_ARM_LENGTH_MM).asin()
}

/// Lift angle for a gripper height, interpolated over the anchor table.
///
/// Heights beyond the outer anchors extrapolate with the end segment's
/// slope; the joint's hard-limit clamp catches anything unreachable.
pub fn angle_for_height(height_mm: f64) -> f64 {
    let anchors = [
        (LIFT_HEIGHT_LOW_DOCK_MM, anchor_angle(LIFT_HEIGHT_LOW_DOCK_MM)),
        (LIFT_HEIGHT_CARRY_MM, anchor_angle(LIFT_HEIGHT_CARRY_MM)),
        (
            LIFT_HEIGHT_HIGH_DOCK_MM,
            anchor_angle(LIFT_HEIGHT_HIGH_DOCK_MM),
        ),
    ];

    let (seg_lo, seg_hi) = if height_mm <= anchors[1].0 {
        (anchors[0], anchors[1])
    } else {
        (anchors[1], anchors[2])
    };
    let (h0, a0) = seg_lo;
    let (h1, a1) = seg_hi;
    let t = (height_mm - h0) / (h1 - h0);
    a0 + t * (a1 - a0)
}

/// The lift joint.
#[derive(Debug, Clone)]
pub struct LiftController {
    joint: JointController,
}

impl LiftController {
    pub fn new(config: JointConfig) -> Self {
        Self {
            joint: JointController::new(config, LIFT_MIN_ANGLE_RAD, LIFT_MAX_ANGLE_RAD),
        }
    }

    /// Command by angle. Clamps at the hard stops.
    pub fn set_angle(&mut self, angle_rad: f64) -> bool {
        self.joint.set_target(angle_rad)
    }

    /// Command by gripper height; converts through the anchor table.
    pub fn set_height(&mut self, height_mm: f64) -> bool {
        self.joint.set_target(angle_for_height(height_mm))
    }

    /// Run one tick; returns motor power.
    pub fn update(&mut self, measured_angle_rad: f64, dt_s: f64) -> f64 {
        self.joint.update(measured_angle_rad, dt_s)
    }

    /// Current gripper height [mm], derived from the measured angle.
    #[inline]
    pub fn height_mm(&self) -> f64 {
        height_from_angle(self.joint.angle())
    }

    #[inline]
    pub fn angle(&self) -> f64 {
        self.joint.angle()
    }

    #[inline]
    pub fn target_angle(&self) -> f64 {
        self.joint.target()
    }

    #[inline]
    pub fn is_in_position(&self) -> bool {
        self.joint.is_in_position()
    }

    pub fn take_range_flag(&mut self) -> bool {
        self.joint.take_range_flag()
    }

    pub fn hold(&mut self) {
        self.joint.hold()
    }

    pub fn reset(&mut self) {
        self.joint.reset()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_heights_map_exactly() {
        for h in [
            LIFT_HEIGHT_LOW_DOCK_MM,
            LIFT_HEIGHT_CARRY_MM,
            LIFT_HEIGHT_HIGH_DOCK_MM,
        ] {
            let angle = angle_for_height(h);
            assert!(
                (height_from_angle(angle) - h).abs() < 1e-9,
                "anchor {h} round-trips"
            );
        }
    }

    #[test]
    fn interpolated_heights_are_monotonic() {
        let mut last = angle_for_height(LIFT_HEIGHT_LOW_DOCK_MM);
        let mut h = LIFT_HEIGHT_LOW_DOCK_MM;
        while h < LIFT_HEIGHT_HIGH_DOCK_MM {
            h += 1.0;
            let a = angle_for_height(h);
            assert!(a > last);
            last = a;
        }
    }

    #[test]
    fn interpolation_error_stays_small() {
        // The piecewise-linear table vs. the exact asin, worst case
        // inside the anchor range.
        let mut h = LIFT_HEIGHT_LOW_DOCK_MM;
        while h <= LIFT_HEIGHT_HIGH_DOCK_MM {
            let approx = angle_for_height(h);
            let exact = ((h - LIFT_PIVOT_HEIGHT_MM) / LIFT_ARM_LENGTH_MM).asin();
            assert!(
                (approx - exact).abs() < 0.02,
                "at {h}: approx {approx}, exact {exact}"
            );
            h += 0.5;
        }
    }

    #[test]
    fn boundary_anchor_commands_succeed() {
        let mut lift = LiftController::new(JointConfig::lift_default());
        assert!(lift.set_height(LIFT_HEIGHT_LOW_DOCK_MM));
        assert!(lift.set_height(LIFT_HEIGHT_HIGH_DOCK_MM));
        assert!(!lift.take_range_flag());
    }

    #[test]
    fn absurd_height_clamps_and_flags() {
        let mut lift = LiftController::new(JointConfig::lift_default());
        assert!(!lift.set_height(500.0));
        assert!(lift.take_range_flag());
        assert!(lift.target_angle() <= LIFT_MAX_ANGLE_RAD);
    }

    #[test]
    fn height_tracks_measured_angle() {
        let mut lift = LiftController::new(JointConfig::lift_default());
        let angle = angle_for_height(LIFT_HEIGHT_CARRY_MM);
        lift.update(angle, 0.005);
        assert!((lift.height_mm() - LIFT_HEIGHT_CARRY_MM).abs() < 1e-9);
    }
}
