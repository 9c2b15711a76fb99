//! Closed-loop per-wheel speed control.
//!
//! Each wheel ramps its commanded speed toward the target at the
//! commanded acceleration, then converts the ramped target to motor
//! power: a calibrated linear feed-forward plus a PI correction on the
//! measured-vs-ramped error. The measured speed is a first-order
//! low-pass of the raw encoder rate.
//!
//! The controller has one mode field instead of a separate disable path:
//! `Closed` runs the loop, `Passthrough` forwards raw power from the
//! caller (test modes) while the speed filter and stall detection keep
//! running.

use mule_common::consts::{MAX_WHEEL_SPEED_MMPS, WHEEL_RADIUS_MM};

use crate::config::WheelConfig;

/// Which loop the wheels run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WheelMode {
    /// Speed loop closed on the encoders.
    #[default]
    Closed,
    /// Raw power from the caller passes straight through.
    Passthrough,
}

/// Left/right wheel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelSide {
    Left = 0,
    Right = 1,
}

/// Read-only view of one wheel's state.
#[derive(Debug, Clone, Copy, Default)]
pub struct WheelStateView {
    /// Monotonic shaft position since boot [rad].
    pub position_rad: f64,
    /// Low-passed measured speed [mm/s].
    pub filtered_speed_mmps: f64,
    /// Ramped commanded speed [mm/s].
    pub commanded_speed_mmps: f64,
    /// Acceleration limit in force [mm/s²] (0 = instantaneous).
    pub commanded_accel_mmps2: f64,
    /// Stall latch.
    pub stalled: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct WheelLoop {
    target_speed_mmps: f64,
    target_accel_mmps2: f64,
    commanded_speed_mmps: f64,
    filtered_speed_mmps: f64,
    integral: f64,
    position_rad: f64,
    last_pos_rad: f64,
    primed: bool,
    raw_power: f64,
    power: f64,
    stall_ticks: u32,
    stalled: bool,
}

impl WheelLoop {
    fn reset_loop_state(&mut self) {
        self.commanded_speed_mmps = 0.0;
        self.integral = 0.0;
    }
}

/// Both drive wheels.
#[derive(Debug, Clone)]
pub struct WheelController {
    config: WheelConfig,
    mode: WheelMode,
    wheels: [WheelLoop; 2],
}

impl WheelController {
    pub fn new(config: WheelConfig) -> Self {
        Self {
            config,
            mode: WheelMode::Closed,
            wheels: [WheelLoop::default(); 2],
        }
    }

    /// Set speed/acceleration targets for both wheels.
    ///
    /// Speeds clamp to the configured maximum; returns false when a
    /// clamp happened so the caller can raise the out-of-range event.
    pub fn set_targets(
        &mut self,
        left_mmps: f64,
        right_mmps: f64,
        left_accel_mmps2: f64,
        right_accel_mmps2: f64,
    ) -> bool {
        let mut in_range = true;
        for (wheel, (speed, accel)) in self.wheels.iter_mut().zip([
            (left_mmps, left_accel_mmps2),
            (right_mmps, right_accel_mmps2),
        ]) {
            let clamped = speed.clamp(-MAX_WHEEL_SPEED_MMPS, MAX_WHEEL_SPEED_MMPS);
            if clamped != speed {
                in_range = false;
            }
            wheel.target_speed_mmps = clamped;
            wheel.target_accel_mmps2 = accel.max(0.0);
        }
        in_range
    }

    /// Command both wheels to zero with an immediate ramp.
    pub fn stop(&mut self) {
        self.set_targets(0.0, 0.0, 0.0, 0.0);
    }

    /// Switch between the closed loop and raw passthrough.
    pub fn set_mode(&mut self, mode: WheelMode) {
        if mode != self.mode {
            self.mode = mode;
            for wheel in &mut self.wheels {
                wheel.reset_loop_state();
                wheel.raw_power = 0.0;
            }
        }
    }

    #[inline]
    pub fn mode(&self) -> WheelMode {
        self.mode
    }

    /// Raw power for the passthrough mode.
    pub fn set_raw_power(&mut self, left: f64, right: f64) {
        self.wheels[0].raw_power = left.clamp(-1.0, 1.0);
        self.wheels[1].raw_power = right.clamp(-1.0, 1.0);
    }

    /// Run one tick. Takes the encoder positions, returns the motor
    /// powers (left, right).
    pub fn update(&mut self, left_pos_rad: f64, right_pos_rad: f64, dt_s: f64) -> (f64, f64) {
        let positions = [left_pos_rad, right_pos_rad];
        let mut powers = [0.0; 2];

        for (i, wheel) in self.wheels.iter_mut().enumerate() {
            wheel.position_rad = positions[i];

            // Measured speed: raw encoder rate through a first-order
            // low-pass.
            let raw_speed = if wheel.primed && dt_s > 0.0 {
                (positions[i] - wheel.last_pos_rad) / dt_s * WHEEL_RADIUS_MM
            } else {
                0.0
            };
            wheel.last_pos_rad = positions[i];
            wheel.primed = true;

            let omega = 2.0 * core::f64::consts::PI * self.config.speed_filter_hz * dt_s;
            let alpha = omega / (1.0 + omega);
            wheel.filtered_speed_mmps += alpha * (raw_speed - wheel.filtered_speed_mmps);

            let power = match self.mode {
                WheelMode::Passthrough => {
                    wheel.commanded_speed_mmps = 0.0;
                    wheel.raw_power
                }
                WheelMode::Closed => {
                    // Ramp toward the target. Zero accel means jump.
                    if wheel.target_accel_mmps2 <= 0.0 {
                        wheel.commanded_speed_mmps = wheel.target_speed_mmps;
                    } else {
                        let step = wheel.target_accel_mmps2 * dt_s;
                        let delta = wheel.target_speed_mmps - wheel.commanded_speed_mmps;
                        wheel.commanded_speed_mmps += delta.clamp(-step, step);
                    }

                    let error = wheel.commanded_speed_mmps - wheel.filtered_speed_mmps;
                    if self.config.ki > 0.0 {
                        wheel.integral += error * dt_s;
                        // Keep the integral contribution inside half the
                        // power range.
                        let limit = 0.5 * self.config.max_power / self.config.ki;
                        wheel.integral = wheel.integral.clamp(-limit, limit);
                    }

                    self.config.kff * wheel.commanded_speed_mmps
                        + self.config.kp * error
                        + self.config.ki * wheel.integral
                }
            };
            let power = power.clamp(-self.config.max_power, self.config.max_power);
            wheel.power = power;
            powers[i] = power;

            // Stall detection: power without motion for a full window.
            if wheel.filtered_speed_mmps.abs() < self.config.stall_speed_mmps
                && power.abs() > self.config.stall_power
            {
                wheel.stall_ticks = wheel.stall_ticks.saturating_add(1);
                if wheel.stall_ticks >= self.config.stall_window_ticks {
                    wheel.stalled = true;
                }
            } else {
                wheel.stall_ticks = 0;
            }
        }

        (powers[0], powers[1])
    }

    /// State view of one wheel.
    pub fn state(&self, side: WheelSide) -> WheelStateView {
        let w = &self.wheels[side as usize];
        WheelStateView {
            position_rad: w.position_rad,
            filtered_speed_mmps: w.filtered_speed_mmps,
            commanded_speed_mmps: w.commanded_speed_mmps,
            commanded_accel_mmps2: w.target_accel_mmps2,
            stalled: w.stalled,
        }
    }

    /// True when either wheel has latched a stall.
    pub fn any_stalled(&self) -> bool {
        self.wheels.iter().any(|w| w.stalled)
    }

    /// True when both wheels have latched a stall.
    pub fn both_stalled(&self) -> bool {
        self.wheels.iter().all(|w| w.stalled)
    }

    /// Clear the stall latches (caller-issued reset).
    pub fn clear_stall(&mut self) {
        for wheel in &mut self.wheels {
            wheel.stalled = false;
            wheel.stall_ticks = 0;
        }
    }

    /// Return to the boot state (positions are re-primed on the next
    /// update).
    pub fn reset(&mut self) {
        let config = self.config;
        *self = Self::new(config);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.005;

    fn controller() -> WheelController {
        WheelController::new(WheelConfig::default())
    }

    #[test]
    fn targets_clamp_to_maximum() {
        let mut c = controller();
        assert!(!c.set_targets(500.0, -500.0, 0.0, 0.0));
        c.update(0.0, 0.0, DT);
        assert_eq!(
            c.state(WheelSide::Left).commanded_speed_mmps,
            MAX_WHEEL_SPEED_MMPS
        );
        assert_eq!(
            c.state(WheelSide::Right).commanded_speed_mmps,
            -MAX_WHEEL_SPEED_MMPS
        );
    }

    #[test]
    fn in_range_targets_do_not_flag() {
        let mut c = controller();
        assert!(c.set_targets(100.0, 100.0, 200.0, 200.0));
    }

    #[test]
    fn ramp_respects_acceleration() {
        let mut c = controller();
        c.set_targets(100.0, 100.0, 200.0, 200.0);
        c.update(0.0, 0.0, DT);
        // One tick at 200 mm/s² is 1 mm/s.
        let v = c.state(WheelSide::Left).commanded_speed_mmps;
        assert!((v - 1.0).abs() < 1e-9);
        c.update(0.0, 0.0, DT);
        assert!((c.state(WheelSide::Left).commanded_speed_mmps - 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_accel_jumps_to_target() {
        let mut c = controller();
        c.set_targets(100.0, 100.0, 0.0, 0.0);
        c.update(0.0, 0.0, DT);
        assert_eq!(c.state(WheelSide::Left).commanded_speed_mmps, 100.0);
    }

    #[test]
    fn power_is_clamped() {
        let mut c = controller();
        c.set_targets(MAX_WHEEL_SPEED_MMPS, MAX_WHEEL_SPEED_MMPS, 0.0, 0.0);
        // Stationary encoders → large error, but power stays bounded.
        for _ in 0..500 {
            let (l, r) = c.update(0.0, 0.0, DT);
            assert!(l.abs() <= 1.0 && r.abs() <= 1.0);
        }
    }

    #[test]
    fn stall_latches_after_window() {
        let mut c = controller();
        c.set_targets(100.0, 100.0, 0.0, 0.0);
        let window = WheelConfig::default().stall_window_ticks;
        for _ in 0..window + 5 {
            c.update(0.0, 0.0, DT); // encoders frozen
        }
        assert!(c.state(WheelSide::Left).stalled);
        assert!(c.both_stalled());
        // Sticky until cleared.
        c.stop();
        c.update(0.0, 0.0, DT);
        assert!(c.any_stalled());
        c.clear_stall();
        assert!(!c.any_stalled());
    }

    #[test]
    fn moving_wheel_does_not_stall() {
        let mut c = controller();
        c.set_targets(100.0, 100.0, 0.0, 0.0);
        let mut pos = 0.0;
        for _ in 0..200 {
            // Encoder tracks ~100 mm/s.
            pos += 100.0 / WHEEL_RADIUS_MM * DT;
            c.update(pos, pos, DT);
        }
        assert!(!c.any_stalled());
        let v = c.state(WheelSide::Left).filtered_speed_mmps;
        assert!((v - 100.0).abs() < 5.0);
    }

    #[test]
    fn passthrough_forwards_raw_power() {
        let mut c = controller();
        c.set_mode(WheelMode::Passthrough);
        c.set_raw_power(0.3, -0.3);
        let (l, r) = c.update(0.0, 0.0, DT);
        assert_eq!(l, 0.3);
        assert_eq!(r, -0.3);
        // Returning to closed loop starts from rest.
        c.set_mode(WheelMode::Closed);
        let (l, _) = c.update(0.0, 0.0, DT);
        assert_eq!(l, 0.0);
    }

    #[test]
    fn reset_returns_to_boot() {
        let mut c = controller();
        c.set_targets(100.0, 100.0, 0.0, 0.0);
        c.update(1.0, 1.0, DT);
        c.reset();
        let s = c.state(WheelSide::Left);
        assert_eq!(s.commanded_speed_mmps, 0.0);
        assert_eq!(s.position_rad, 0.0);
        assert!(!s.stalled);
    }
}
