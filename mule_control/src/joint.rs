//! Cascade controller for a single-DOF joint (head, lift).
//!
//! Outer position loop produces a desired velocity, saturated at the
//! configured maximum; inner velocity loop (feed-forward + PI) produces
//! motor power. `is_in_position` goes true once the angular error has
//! stayed inside the tolerance for the configured dwell.
//!
//! Hard limits are enforced at the target: commanding outside the range
//! clamps and raises a non-fatal out-of-range flag the caller collects.

use crate::config::JointConfig;

/// One single-DOF joint under cascade control.
#[derive(Debug, Clone)]
pub struct JointController {
    config: JointConfig,
    min_angle_rad: f64,
    max_angle_rad: f64,

    target_angle_rad: f64,
    angle_rad: f64,
    filtered_speed_radps: f64,
    last_angle_rad: f64,
    primed: bool,

    integral: f64,
    in_pos_ticks: u32,
    in_position: bool,
    /// Out-of-range command happened since the last take.
    range_flag: bool,
    power: f64,
}

impl JointController {
    pub fn new(config: JointConfig, min_angle_rad: f64, max_angle_rad: f64) -> Self {
        Self {
            config,
            min_angle_rad,
            max_angle_rad,
            target_angle_rad: 0.0,
            angle_rad: 0.0,
            filtered_speed_radps: 0.0,
            last_angle_rad: 0.0,
            primed: false,
            integral: 0.0,
            in_pos_ticks: 0,
            in_position: false,
            range_flag: false,
            power: 0.0,
        }
    }

    /// Set the angle target. Out-of-range targets clamp to the hard
    /// limits and raise the range flag; returns false in that case.
    pub fn set_target(&mut self, angle_rad: f64) -> bool {
        let clamped = angle_rad.clamp(self.min_angle_rad, self.max_angle_rad);
        self.target_angle_rad = clamped;
        self.in_pos_ticks = 0;
        self.in_position = false;
        if clamped != angle_rad {
            self.range_flag = true;
            return false;
        }
        true
    }

    /// Hold the current measured angle.
    pub fn hold(&mut self) {
        let angle = self.angle_rad;
        self.set_target(angle);
    }

    /// Run one tick against the measured angle; returns motor power.
    pub fn update(&mut self, measured_angle_rad: f64, dt_s: f64) -> f64 {
        self.angle_rad = measured_angle_rad;

        let raw_speed = if self.primed && dt_s > 0.0 {
            (measured_angle_rad - self.last_angle_rad) / dt_s
        } else {
            0.0
        };
        self.last_angle_rad = measured_angle_rad;
        self.primed = true;

        let omega = 2.0 * core::f64::consts::PI * self.config.speed_filter_hz * dt_s;
        let alpha = omega / (1.0 + omega);
        self.filtered_speed_radps += alpha * (raw_speed - self.filtered_speed_radps);

        // Outer loop: position error → desired velocity.
        let pos_error = self.target_angle_rad - measured_angle_rad;
        let desired_vel = (self.config.kp_pos * pos_error)
            .clamp(-self.config.max_speed_radps, self.config.max_speed_radps);

        // Inner loop: velocity error → power.
        let vel_error = desired_vel - self.filtered_speed_radps;
        if self.config.ki_vel > 0.0 {
            self.integral += vel_error * dt_s;
            let limit = 0.5 * self.config.max_power / self.config.ki_vel;
            self.integral = self.integral.clamp(-limit, limit);
        }
        let power = self.config.kff_vel * desired_vel
            + self.config.kp_vel * vel_error
            + self.config.ki_vel * self.integral;
        self.power = power.clamp(-self.config.max_power, self.config.max_power);

        // In-position dwell.
        if pos_error.abs() <= self.config.in_pos_tol_rad {
            self.in_pos_ticks = self.in_pos_ticks.saturating_add(1);
            if self.in_pos_ticks >= self.config.in_pos_dwell_ticks {
                self.in_position = true;
            }
        } else {
            self.in_pos_ticks = 0;
            self.in_position = false;
        }

        self.power
    }

    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle_rad
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.target_angle_rad
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.filtered_speed_radps
    }

    #[inline]
    pub fn is_in_position(&self) -> bool {
        self.in_position
    }

    /// Take (and clear) the out-of-range flag.
    pub fn take_range_flag(&mut self) -> bool {
        core::mem::replace(&mut self.range_flag, false)
    }

    #[inline]
    pub const fn limits(&self) -> (f64, f64) {
        (self.min_angle_rad, self.max_angle_rad)
    }

    /// Return to the boot state.
    pub fn reset(&mut self) {
        let config = self.config;
        *self = Self::new(config, self.min_angle_rad, self.max_angle_rad);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
