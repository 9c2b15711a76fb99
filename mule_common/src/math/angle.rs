//! Angle helpers.
//!
//! All headings in the control core are normalized to (−π, π]. The two
//! functions here are the only place that wrapping happens; callers never
//! wrap by hand.

use core::f64::consts::{PI, TAU};

/// Normalize an angle to (−π, π].
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Shortest signed rotation that takes `from` to `to` [rad].
///
/// Positive result means counter-clockwise.
#[inline]
pub fn angle_diff(to: f64, from: f64) -> f64 {
    normalize_angle(to - from)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_inside_range() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert!((normalize_angle(1.0) - 1.0).abs() < 1e-12);
        assert!((normalize_angle(-3.0) - (-3.0)).abs() < 1e-12);
    }

    #[test]
    fn pi_maps_to_positive_pi() {
        assert!((normalize_angle(PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-9);
    }

    #[test]
    fn wraps_multiple_turns() {
        assert!((normalize_angle(5.0 * TAU + 0.25) - 0.25).abs() < 1e-9);
        assert!((normalize_angle(-5.0 * TAU - 0.25) + 0.25).abs() < 1e-9);
    }

    #[test]
    fn diff_takes_shortest_way() {
        // 170° to −170°: shortest way is +20°, not −340°.
        let a = 170.0_f64.to_radians();
        let b = -170.0_f64.to_radians();
        let d = angle_diff(b, a);
        assert!((d - 20.0_f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn diff_of_equal_angles_is_zero() {
        assert_eq!(angle_diff(1.5, 1.5), 0.0);
    }
}
