//! Planar pose on the mat.
//!
//! `Pose2D` composition and difference follow SE(2): composing applies a
//! local displacement in the pose's own frame, differencing expresses one
//! pose in another's frame. Headings are always stored normalized to
//! (−π, π]; the constructors are the only wrap points.

use super::angle::normalize_angle;
use super::vec2::Vec2;

/// Planar pose `(x_mm, y_mm, heading_rad)` on the mat.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose2D {
    /// Position along the mat x axis [mm].
    pub x_mm: f64,
    /// Position along the mat y axis [mm].
    pub y_mm: f64,
    /// Heading, normalized to (−π, π] [rad].
    pub heading_rad: f64,
}

impl Pose2D {
    /// Construct a pose; the heading is normalized.
    #[inline]
    pub fn new(x_mm: f64, y_mm: f64, heading_rad: f64) -> Self {
        Self {
            x_mm,
            y_mm,
            heading_rad: normalize_angle(heading_rad),
        }
    }

    /// Position component as a vector.
    #[inline]
    pub const fn position(&self) -> Vec2 {
        Vec2::new(self.x_mm, self.y_mm)
    }

    /// Compose with a displacement expressed in this pose's frame.
    #[inline]
    pub fn compose(&self, local: Pose2D) -> Pose2D {
        let p = self.position() + local.position().rotated(self.heading_rad);
        Pose2D::new(p.x, p.y, self.heading_rad + local.heading_rad)
    }

    /// This pose expressed in `reference`'s frame (the SE(2) difference).
    ///
    /// `reference.compose(pose.relative_to(reference)) == pose`.
    #[inline]
    pub fn relative_to(&self, reference: Pose2D) -> Pose2D {
        let d = (self.position() - reference.position()).rotated(-reference.heading_rad);
        Pose2D::new(d.x, d.y, self.heading_rad - reference.heading_rad)
    }

    /// Map a point from this pose's frame to the mat frame.
    #[inline]
    pub fn transform_point(&self, local: Vec2) -> Vec2 {
        self.position() + local.rotated(self.heading_rad)
    }

    /// Map a mat-frame point into this pose's frame.
    #[inline]
    pub fn inverse_transform_point(&self, world: Vec2) -> Vec2 {
        (world - self.position()).rotated(-self.heading_rad)
    }

    /// This pose advanced `distance_mm` along its own heading.
    #[inline]
    pub fn advanced(&self, distance_mm: f64) -> Pose2D {
        let p = self.position() + Vec2::from_polar(distance_mm, self.heading_rad);
        Pose2D {
            x_mm: p.x,
            y_mm: p.y,
            heading_rad: self.heading_rad,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn constructor_normalizes_heading() {
        let p = Pose2D::new(0.0, 0.0, 3.0 * PI);
        assert!((p.heading_rad - PI).abs() < 1e-9);
    }

    #[test]
    fn compose_rotates_displacement() {
        // Facing +y, a forward step lands along +y.
        let p = Pose2D::new(10.0, 0.0, FRAC_PI_2);
        let q = p.compose(Pose2D::new(5.0, 0.0, 0.0));
        assert!((q.x_mm - 10.0).abs() < 1e-9);
        assert!((q.y_mm - 5.0).abs() < 1e-9);
    }

    #[test]
    fn relative_to_inverts_compose() {
        let a = Pose2D::new(100.0, -30.0, 0.8);
        let d = Pose2D::new(20.0, 5.0, -0.3);
        let b = a.compose(d);
        let r = b.relative_to(a);
        assert!((r.x_mm - d.x_mm).abs() < 1e-9);
        assert!((r.y_mm - d.y_mm).abs() < 1e-9);
        assert!((r.heading_rad - d.heading_rad).abs() < 1e-9);
    }

    #[test]
    fn advanced_moves_along_heading() {
        let p = Pose2D::new(0.0, 0.0, PI).advanced(10.0);
        assert!((p.x_mm + 10.0).abs() < 1e-9);
        assert!(p.y_mm.abs() < 1e-9);
    }

    #[test]
    fn point_transform_round_trip() {
        let p = Pose2D::new(12.0, -7.0, 1.1);
        let local = Vec2::new(30.0, 4.0);
        let world = p.transform_point(local);
        let back = p.inverse_transform_point(world);
        assert!((back.x - local.x).abs() < 1e-9);
        assert!((back.y - local.y).abs() < 1e-9);
    }
}
