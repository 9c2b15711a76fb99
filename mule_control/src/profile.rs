//! Distance-parameterized trapezoidal speed profile.
//!
//! Ramp up at the acceleration limit, cruise, ramp down at the
//! deceleration limit so the boundary speed is met exactly at the end of
//! the distance. When the distance is too short for a full trapezoid the
//! cruise speed drops to the peak of the resulting triangle.
//!
//! All quantities are magnitudes; callers apply direction signs.

/// Limits for one profiled move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileConstraints {
    /// Cruise ceiling [unit/s].
    pub max_velocity: f64,
    /// Ramp-up rate [unit/s²]; ≤ 0 means instantaneous.
    pub accel: f64,
    /// Ramp-down rate [unit/s²]; ≤ 0 means instantaneous.
    pub decel: f64,
}

/// One precomputed trapezoid over a fixed distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrapezoidalProfile {
    constraints: ProfileConstraints,
    initial_velocity: f64,
    final_velocity: f64,
    cruise_velocity: f64,
    distance: f64,
    accel_distance: f64,
    decel_distance: f64,
}

impl TrapezoidalProfile {
    /// Build a profile covering `distance` that starts at
    /// `initial_velocity` and ends at `final_velocity`.
    pub fn new(
        distance: f64,
        initial_velocity: f64,
        final_velocity: f64,
        constraints: ProfileConstraints,
    ) -> Self {
        let distance = distance.max(0.0);
        let vi = initial_velocity.abs();
        let vf = final_velocity.abs();
        let vmax = constraints.max_velocity.abs();

        let instant_accel = constraints.accel <= 0.0;
        let instant_decel = constraints.decel <= 0.0;

        let cruise_velocity = if instant_accel && instant_decel {
            vmax
        } else {
            let a = if instant_accel { f64::INFINITY } else { constraints.accel };
            let d = if instant_decel { f64::INFINITY } else { constraints.decel };
            let non_cruise = (vmax * vmax - vi * vi).max(0.0) / (2.0 * a)
                + (vmax * vmax - vf * vf).max(0.0) / (2.0 * d);
            if non_cruise <= distance {
                vmax
            } else {
                // Triangle peak that meets both boundary speeds.
                let peak_sq = (2.0 * distance * a * d + d * vi * vi + a * vf * vf) / (a + d);
                peak_sq.max(vi * vi).max(vf * vf).sqrt().min(vmax)
            }
        };

        let accel_distance = if instant_accel {
            0.0
        } else {
            (cruise_velocity * cruise_velocity - vi * vi).max(0.0) / (2.0 * constraints.accel)
        };
        let decel_distance = if instant_decel {
            distance
        } else {
            distance
                - (cruise_velocity * cruise_velocity - vf * vf).max(0.0)
                    / (2.0 * constraints.decel)
        };

        Self {
            constraints,
            initial_velocity: vi,
            final_velocity: vf,
            cruise_velocity,
            distance,
            accel_distance,
            decel_distance: decel_distance.max(accel_distance),
        }
    }

    /// Speed at a given distance along the move [unit/s].
    pub fn velocity(&self, distance: f64) -> f64 {
        let d = distance.clamp(0.0, self.distance);
        if d < self.accel_distance {
            (self.initial_velocity * self.initial_velocity
                + 2.0 * self.constraints.accel * d)
                .sqrt()
        } else if d < self.decel_distance {
            self.cruise_velocity
        } else if self.constraints.decel <= 0.0 {
            self.cruise_velocity
        } else {
            (self.cruise_velocity * self.cruise_velocity
                - 2.0 * self.constraints.decel * (d - self.decel_distance))
                .max(self.final_velocity * self.final_velocity)
                .sqrt()
        }
    }

    /// Total distance covered by the profile.
    #[inline]
    pub const fn distance(&self) -> f64 {
        self.distance
    }

    /// Cruise speed reached by this profile.
    #[inline]
    pub const fn cruise_velocity(&self) -> f64 {
        self.cruise_velocity
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints(v: f64, a: f64, d: f64) -> ProfileConstraints {
        ProfileConstraints {
            max_velocity: v,
            accel: a,
            decel: d,
        }
    }

    #[test]
    fn long_move_reaches_cruise() {
        let p = TrapezoidalProfile::new(300.0, 0.0, 0.0, constraints(100.0, 200.0, 500.0));
        assert_eq!(p.cruise_velocity(), 100.0);
        assert_eq!(p.velocity(150.0), 100.0);
        // Starts and ends at the boundary speeds.
        assert_eq!(p.velocity(0.0), 0.0);
        assert!(p.velocity(300.0) < 1.0);
    }

    #[test]
    fn ramp_up_follows_accel_limit() {
        let p = TrapezoidalProfile::new(300.0, 0.0, 0.0, constraints(100.0, 200.0, 500.0));
        // v = sqrt(2·a·d): at d = 9, v = 60.
        assert!((p.velocity(9.0) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn short_move_becomes_triangle() {
        let p = TrapezoidalProfile::new(10.0, 0.0, 0.0, constraints(100.0, 200.0, 200.0));
        // Peak = sqrt(2·a·d/2·...) = sqrt(2000) ≈ 44.7 < 100.
        assert!(p.cruise_velocity() < 100.0);
        assert!(p.cruise_velocity() > 0.0);
        // Symmetric triangle peaks at the middle.
        assert!((p.velocity(5.0) - p.cruise_velocity()).abs() < 1e-9);
    }

    #[test]
    fn nonzero_boundary_speeds() {
        let p = TrapezoidalProfile::new(100.0, 50.0, 30.0, constraints(100.0, 200.0, 200.0));
        assert_eq!(p.velocity(0.0), 50.0);
        assert!((p.velocity(100.0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn instantaneous_accel_starts_at_cruise() {
        let p = TrapezoidalProfile::new(100.0, 0.0, 0.0, constraints(80.0, 0.0, 200.0));
        assert_eq!(p.velocity(0.0), 80.0);
        // Still ramps down at the end.
        assert!(p.velocity(99.9) < 80.0);
    }

    #[test]
    fn zero_distance_is_degenerate() {
        let p = TrapezoidalProfile::new(0.0, 0.0, 0.0, constraints(100.0, 200.0, 200.0));
        assert_eq!(p.distance(), 0.0);
        // No motion required anywhere.
        assert!(p.velocity(0.0) <= 100.0);
    }

    #[test]
    fn velocity_clamps_outside_range() {
        let p = TrapezoidalProfile::new(100.0, 0.0, 0.0, constraints(100.0, 200.0, 200.0));
        assert_eq!(p.velocity(-5.0), p.velocity(0.0));
        assert_eq!(p.velocity(500.0), p.velocity(100.0));
    }
}
