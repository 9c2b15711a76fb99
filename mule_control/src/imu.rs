//! IMU filter: drift-corrected yaw from gyro integration.
//!
//! Integrates the gyro Z rate over the control period into an unwrapped
//! heading. At rest (rate magnitude under the dead-band for a full
//! window) integration is suppressed, which kills drift during pauses.
//! When the wheel odometry is trustworthy the per-tick rate can be
//! blended with the odometric rate estimate; the default weight is zero.
//!
//! A stale or out-of-range sample is replaced by the previous rate
//! (zero-order hold) and flagged as a transient fault; the fault clears
//! as soon as fresh samples resume.

use mule_common::consts::GYRO_MAX_VALID_RADPS;
use mule_common::math::normalize_angle;
use mule_hal::ImuSample;

use crate::config::ImuConfig;

/// Gyro-Z heading filter. One instance per robot; the localization reads
/// its heading, nothing else integrates the gyro.
#[derive(Debug, Clone)]
pub struct ImuFilter {
    config: ImuConfig,
    /// Unwrapped integrated heading [rad].
    heading_rad: f64,
    /// Last accepted rate [rad/s] (held on bad samples).
    rate_radps: f64,
    /// Consecutive ticks below the dead-band.
    still_ticks: u32,
    /// Transient fault: sample was stale or out of range this tick.
    fault: bool,
}

impl ImuFilter {
    pub fn new(config: ImuConfig) -> Self {
        Self {
            config,
            heading_rad: 0.0,
            rate_radps: 0.0,
            still_ticks: 0,
            fault: false,
        }
    }

    /// Integrate one sample.
    ///
    /// `odo_rate_radps` is the odometric yaw-rate estimate and
    /// `odo_valid` whether the wheels agree well enough to trust it.
    /// Returns the new normalized heading.
    pub fn update(
        &mut self,
        sample: &ImuSample,
        odo_rate_radps: f64,
        odo_valid: bool,
        dt_s: f64,
    ) -> f64 {
        let gyro_z = sample.rate_radps[2];
        if !sample.fresh || gyro_z.abs() > GYRO_MAX_VALID_RADPS {
            // Zero-order hold on the previous rate.
            self.fault = true;
        } else {
            self.fault = false;
            self.rate_radps = gyro_z;
        }

        // Rest dead-band: a sustained near-zero rate integrates as zero.
        if self.rate_radps.abs() < self.config.deadband_radps {
            self.still_ticks = self.still_ticks.saturating_add(1);
        } else {
            self.still_ticks = 0;
        }
        let mut rate = if self.still_ticks >= self.config.deadband_window_ticks {
            0.0
        } else {
            self.rate_radps
        };

        if odo_valid && self.config.odometry_blend > 0.0 {
            let w = self.config.odometry_blend;
            rate = (1.0 - w) * rate + w * odo_rate_radps;
        }

        self.heading_rad += rate * dt_s;
        self.heading()
    }

    /// Current heading, normalized to (−π, π].
    #[inline]
    pub fn heading(&self) -> f64 {
        normalize_angle(self.heading_rad)
    }

    /// Rate used for the last update [rad/s].
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate_radps
    }

    /// True while samples are stale or out of range.
    #[inline]
    pub fn has_fault(&self) -> bool {
        self.fault
    }

    /// Overwrite the heading (pose set from a known landmark).
    pub fn set_heading(&mut self, heading_rad: f64) {
        self.heading_rad = normalize_angle(heading_rad);
    }

    /// Return to the boot state.
    pub fn reset(&mut self) {
        self.heading_rad = 0.0;
        self.rate_radps = 0.0;
        self.still_ticks = 0;
        self.fault = false;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::PI;

    const DT: f64 = 0.005;
    const GYRO_DEADBAND_DRIFT: f64 = 0.005;

    fn sample(rate_z: f64) -> ImuSample {
        ImuSample {
            rate_radps: [0.0, 0.0, rate_z],
            fresh: true,
            ..ImuSample::default()
        }
    }

    fn filter() -> ImuFilter {
        ImuFilter::new(ImuConfig::default())
    }

    #[test]
    fn integrates_rate() {
        let mut f = filter();
        // 1 rad/s for 1 s.
        for _ in 0..200 {
            f.update(&sample(1.0), 0.0, false, DT);
        }
        assert!((f.heading() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn heading_is_normalized() {
        let mut f = filter();
        // 2 rad/s for 2 s = 4 rad, which wraps.
        for _ in 0..400 {
            f.update(&sample(2.0), 0.0, false, DT);
        }
        let h = f.heading();
        assert!(h > -PI && h <= PI);
        assert!((h - (4.0 - 2.0 * PI)).abs() < 1e-9);
    }

    #[test]
    fn deadband_suppresses_drift_at_rest() {
        let mut f = filter();
        let drift = GYRO_DEADBAND_DRIFT;
        // Window fills, then integration stops.
        for _ in 0..2_000 {
            f.update(&sample(drift), 0.0, false, DT);
        }
        // Only the window's worth of drift got in.
        let max_leak = drift * DT * ImuConfig::default().deadband_window_ticks as f64;
        assert!(f.heading().abs() <= max_leak + 1e-12);
    }

    #[test]
    fn motion_exits_deadband() {
        let mut f = filter();
        for _ in 0..100 {
            f.update(&sample(0.001), 0.0, false, DT);
        }
        let before = f.heading();
        for _ in 0..200 {
            f.update(&sample(1.0), 0.0, false, DT);
        }
        assert!((f.heading() - before - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stale_sample_holds_rate_and_faults() {
        let mut f = filter();
        f.update(&sample(1.0), 0.0, false, DT);
        assert!(!f.has_fault());

        let stale = ImuSample {
            fresh: false,
            ..sample(99.0)
        };
        f.update(&stale, 0.0, false, DT);
        assert!(f.has_fault());
        assert_eq!(f.rate(), 1.0); // held

        f.update(&sample(1.0), 0.0, false, DT);
        assert!(!f.has_fault());
    }

    #[test]
    fn out_of_range_sample_faults() {
        let mut f = filter();
        f.update(&sample(GYRO_MAX_VALID_RADPS * 2.0), 0.0, false, DT);
        assert!(f.has_fault());
        assert_eq!(f.rate(), 0.0);
    }

    #[test]
    fn odometry_blend_mixes_rates() {
        let mut f = ImuFilter::new(ImuConfig {
            odometry_blend: 0.5,
            ..ImuConfig::default()
        });
        // Gyro says 1.0, odometry says 0.5, blend 50/50 → 0.75.
        for _ in 0..200 {
            f.update(&sample(1.0), 0.5, true, DT);
        }
        assert!((f.heading() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn set_heading_overrides() {
        let mut f = filter();
        f.set_heading(1.0);
        assert!((f.heading() - 1.0).abs() < 1e-12);
        f.reset();
        assert_eq!(f.heading(), 0.0);
    }
}
