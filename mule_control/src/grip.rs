//! Gripper controller.
//!
//! The gripper motor has no feedback; actuation is a fixed power pulse
//! of fixed length, after which power is cut. The engaged latch is set
//! when an engage pulse completes and cleared as soon as a disengage is
//! commanded.

use mule_common::consts::{GRIPPER_DISENGAGE_POWER, GRIPPER_ENGAGE_POWER, GRIPPER_PULSE_TICKS};

/// Timed-pulse gripper drive.
#[derive(Debug, Clone, Default)]
pub struct GripController {
    power: f64,
    pulse_ticks_left: u32,
    /// Pulse that is running (true = engage).
    engaging: bool,
    engaged: bool,
}

impl GripController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an engage pulse. No-op while a pulse is running.
    pub fn engage(&mut self) {
        if self.pulse_ticks_left == 0 {
            self.power = GRIPPER_ENGAGE_POWER;
            self.pulse_ticks_left = GRIPPER_PULSE_TICKS;
            self.engaging = true;
        }
    }

    /// Start a disengage pulse; the engaged latch drops immediately.
    pub fn disengage(&mut self) {
        self.engaged = false;
        if self.pulse_ticks_left == 0 {
            self.power = GRIPPER_DISENGAGE_POWER;
            self.pulse_ticks_left = GRIPPER_PULSE_TICKS;
            self.engaging = false;
        }
    }

    /// Run one tick; returns motor power.
    pub fn update(&mut self) -> f64 {
        if self.pulse_ticks_left > 0 {
            self.pulse_ticks_left -= 1;
            if self.pulse_ticks_left == 0 {
                // There is no gripper sensor; assume the mechanism
                // reached its end of travel when the pulse is done.
                if self.engaging {
                    self.engaged = true;
                }
                self.power = 0.0;
            }
        }
        self.power
    }

    /// True between pulses.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.pulse_ticks_left == 0
    }

    #[inline]
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engage_pulse_latches_engaged() {
        let mut g = GripController::new();
        g.engage();
        assert!(!g.is_idle());
        for _ in 0..GRIPPER_PULSE_TICKS {
            let p = g.update();
            assert!(p <= 0.0);
        }
        assert!(g.is_idle());
        assert!(g.is_engaged());
        assert_eq!(g.update(), 0.0);
    }

    #[test]
    fn disengage_clears_latch_immediately() {
        let mut g = GripController::new();
        g.engage();
        for _ in 0..GRIPPER_PULSE_TICKS {
            g.update();
        }
        assert!(g.is_engaged());
        g.disengage();
        assert!(!g.is_engaged());
        let p = g.update();
        assert!(p > 0.0);
    }

    #[test]
    fn pulse_is_not_restartable_midway() {
        let mut g = GripController::new();
        g.engage();
        g.update();
        let remaining_before = g.pulse_ticks_left;
        g.engage();
        assert_eq!(g.pulse_ticks_left, remaining_before);
    }

    #[test]
    fn reset_drops_everything() {
        let mut g = GripController::new();
        g.engage();
        for _ in 0..GRIPPER_PULSE_TICKS {
            g.update();
        }
        g.reset();
        assert!(!g.is_engaged());
        assert!(g.is_idle());
        assert_eq!(g.update(), 0.0);
    }
}
