//! Control configuration: gains, limits, windows, timeouts.
//!
//! Geometry is compile-time (`mule_common::consts`); everything tunable
//! lives here. The config deserializes from TOML with every field
//! defaulted, so a partial file only overrides what it names. Loading
//! and validation happen once at startup — never inside the tick.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use mule_common::consts::{GYRO_DEADBAND_RADPS, GYRO_DEADBAND_TICKS};

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

// ─── Wheel controller ───────────────────────────────────────────────

/// Per-wheel speed loop tuning.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    /// Proportional gain [power per mm/s of speed error].
    pub kp: f64,
    /// Integral gain [power per mm of accumulated error].
    pub ki: f64,
    /// Feed-forward map slope [power per mm/s of commanded speed].
    pub kff: f64,
    /// Power clamp.
    pub max_power: f64,
    /// Cutoff of the measured-speed low-pass [Hz].
    pub speed_filter_hz: f64,
    /// Speed below which a powered wheel counts toward a stall [mm/s].
    pub stall_speed_mmps: f64,
    /// Power above which a still wheel counts toward a stall.
    pub stall_power: f64,
    /// Consecutive ticks of powered stillness before the stall latches.
    pub stall_window_ticks: u32,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            kp: 0.004,
            ki: 0.02,
            // Free speed is ≈252 mm/s at full power.
            kff: 1.0 / 252.0,
            max_power: 1.0,
            speed_filter_hz: 8.0,
            stall_speed_mmps: 2.0,
            stall_power: 0.15,
            stall_window_ticks: 60,
        }
    }
}

// ─── Joint controllers (head, lift) ─────────────────────────────────

/// Cascade position/velocity loop tuning for a single-DOF joint.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct JointConfig {
    /// Outer loop gain [rad/s of desired velocity per rad of error].
    pub kp_pos: f64,
    /// Inner loop proportional gain [power per rad/s of velocity error].
    pub kp_vel: f64,
    /// Inner loop integral gain [power per rad of accumulated error].
    pub ki_vel: f64,
    /// Velocity feed-forward [power per rad/s of desired velocity].
    pub kff_vel: f64,
    /// Desired-velocity saturation [rad/s].
    pub max_speed_radps: f64,
    /// Power clamp.
    pub max_power: f64,
    /// Cutoff of the measured-speed low-pass [Hz].
    pub speed_filter_hz: f64,
    /// In-position window [rad].
    pub in_pos_tol_rad: f64,
    /// Ticks the error must stay inside the window.
    pub in_pos_dwell_ticks: u32,
}

impl JointConfig {
    /// Defaults for the lift joint.
    pub fn lift_default() -> Self {
        Self {
            kp_pos: 8.0,
            kp_vel: 0.6,
            ki_vel: 3.0,
            kff_vel: 1.0 / 3.8,
            max_speed_radps: 2.5,
            max_power: 1.0,
            speed_filter_hz: 10.0,
            in_pos_tol_rad: 0.015,
            in_pos_dwell_ticks: 20,
        }
    }

    /// Defaults for the head joint.
    pub fn head_default() -> Self {
        Self {
            kp_pos: 10.0,
            kp_vel: 0.5,
            ki_vel: 2.5,
            kff_vel: 1.0 / 5.0,
            max_speed_radps: 4.0,
            max_power: 1.0,
            speed_filter_hz: 10.0,
            in_pos_tol_rad: 0.015,
            in_pos_dwell_ticks: 20,
        }
    }
}

impl Default for JointConfig {
    fn default() -> Self {
        Self::lift_default()
    }
}

// ─── IMU filter ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    /// Rest dead-band threshold [rad/s].
    pub deadband_radps: f64,
    /// Ticks below the threshold before integration is suppressed.
    pub deadband_window_ticks: u32,
    /// Weight of the odometric rate estimate when the wheels agree
    /// (0 = pure gyro).
    pub odometry_blend: f64,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            deadband_radps: GYRO_DEADBAND_RADPS,
            deadband_window_ticks: GYRO_DEADBAND_TICKS,
            odometry_blend: 0.0,
        }
    }
}

// ─── Path follower ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Cross-track correction gain [1/mm of curvature per mm of error].
    pub k_cross: f64,
    /// Heading damping on the cross-track loop [1/mm per rad].
    pub k_heading: f64,
    /// Saturation of the correction curvature [1/mm].
    pub max_correction: f64,
    /// Point-turn completion window [rad].
    pub heading_tol_rad: f64,
    /// Floor under the profiled speed so a segment always finishes
    /// [mm/s] (and [rad/s] for point turns, scaled by 0.01).
    pub min_speed_mmps: f64,
    /// Position tolerance for segment continuity checks [mm].
    pub continuity_tol_mm: f64,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            k_cross: 0.002,
            k_heading: 0.3,
            max_correction: 0.02,
            heading_tol_rad: 0.03,
            min_speed_mmps: 20.0,
            continuity_tol_mm: 1.0,
        }
    }
}

// ─── Docking ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DockConfig {
    /// Curvature per mm of transverse error.
    pub ky: f64,
    /// Curvature per rad of relative marker rotation.
    pub ktheta: f64,
    /// Integral gain on the transverse error.
    pub ki_y: f64,
    /// Correction curvature saturation [1/mm].
    pub max_correction: f64,
    /// Nominal approach speed [mm/s].
    pub approach_speed_mmps: f64,
    /// Distance over which the approach speed decays linearly [mm].
    pub slow_distance_mm: f64,
    /// Forward distance at which the approach stops [mm].
    pub stop_distance_mm: f64,
    /// Transverse window for a lock [mm].
    pub lock_y_tol_mm: f64,
    /// Angular window for a lock [rad].
    pub lock_theta_tol_rad: f64,
    /// Ticks the errors must hold inside the windows.
    pub lock_dwell_ticks: u32,
    /// Observation age beyond which only odometric extrapolation is
    /// trusted [ticks].
    pub fresh_window_ticks: u32,
    /// Observation age at which the target counts as lost [ticks].
    pub lost_window_ticks: u32,
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            ky: 0.004,
            ktheta: 0.5,
            ki_y: 0.0002,
            max_correction: 0.02,
            approach_speed_mmps: 60.0,
            slow_distance_mm: 100.0,
            stop_distance_mm: 20.0,
            lock_y_tol_mm: 5.0,
            lock_theta_tol_rad: 0.05,
            lock_dwell_ticks: 10,
            fresh_window_ticks: 60,
            lost_window_ticks: 400,
        }
    }
}

// ─── Pick-and-place ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PickPlaceConfig {
    /// Timeout applied to every step [ticks].
    pub step_timeout_ticks: u32,
    /// Reverse distance after engaging or placing [mm].
    pub retreat_distance_mm: f64,
    /// Reverse speed during the retreat [mm/s].
    pub retreat_speed_mmps: f64,
}

impl Default for PickPlaceConfig {
    fn default() -> Self {
        Self {
            step_timeout_ticks: 2_000,
            retreat_distance_mm: 40.0,
            retreat_speed_mmps: 50.0,
        }
    }
}

// ─── Top level ──────────────────────────────────────────────────────

/// Complete control configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub wheel: WheelConfig,
    pub lift: LiftJointConfig,
    pub head: HeadJointConfig,
    pub imu: ImuConfig,
    pub path: PathConfig,
    pub dock: DockConfig,
    pub pickplace: PickPlaceConfig,
    /// Robot-state snapshot divider (1 = every tick).
    pub status_divider: u32,
}

/// Newtype so the lift and head joints get distinct serde defaults.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(transparent)]
pub struct LiftJointConfig(pub JointConfig);

impl Default for LiftJointConfig {
    fn default() -> Self {
        Self(JointConfig::lift_default())
    }
}

/// See [`LiftJointConfig`].
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(transparent)]
pub struct HeadJointConfig(pub JointConfig);

impl Default for HeadJointConfig {
    fn default() -> Self {
        Self(JointConfig::head_default())
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            wheel: WheelConfig::default(),
            lift: LiftJointConfig::default(),
            head: HeadJointConfig::default(),
            imu: ImuConfig::default(),
            path: PathConfig::default(),
            dock: DockConfig::default(),
            pickplace: PickPlaceConfig::default(),
            status_divider: 1,
        }
    }
}

impl ControlConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text)?;
        if config.status_divider == 0 {
            config.status_divider = 1;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wheel.max_power <= 0.0 || self.wheel.max_power > 1.0 {
            return Err(ConfigError::Invalid("wheel.max_power must be in (0, 1]"));
        }
        if self.wheel.kff < 0.0 || self.wheel.kp < 0.0 || self.wheel.ki < 0.0 {
            return Err(ConfigError::Invalid("wheel gains must be non-negative"));
        }
        for joint in [&self.lift.0, &self.head.0] {
            if joint.max_speed_radps <= 0.0 {
                return Err(ConfigError::Invalid("joint max_speed must be positive"));
            }
            if joint.in_pos_dwell_ticks == 0 {
                return Err(ConfigError::Invalid("joint dwell must be at least 1 tick"));
            }
        }
        if !(0.0..=1.0).contains(&self.imu.odometry_blend) {
            return Err(ConfigError::Invalid("imu.odometry_blend must be in [0, 1]"));
        }
        if self.dock.lost_window_ticks <= self.dock.fresh_window_ticks {
            return Err(ConfigError::Invalid(
                "dock.lost_window must exceed dock.fresh_window",
            ));
        }
        if self.path.continuity_tol_mm <= 0.0 {
            return Err(ConfigError::Invalid("path.continuity_tol must be positive"));
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
