//! Path follower: executes a precomputed sequence of segments.
//!
//! A path holds up to [`MAX_PATH_SEGMENTS`] line / arc / point-turn
//! segments, appended through checked calls that enforce geometric
//! continuity at the joins. While traversing, each tick projects the
//! current pose onto the active segment, computes cross-track error and
//! along-track progress, and commands the steering controller with a
//! feed-forward curvature plus a saturated cross-track correction. The
//! commanded speed follows a trapezoidal profile that lands exactly on
//! the next segment's entry speed (or zero at the end of the path).
//!
//! Segment switching happens on the tick the projection crosses the
//! boundary — no extra deceleration tick in between. Signed segment
//! speeds drive the path in reverse.

use core::f64::consts::{FRAC_PI_2, TAU};

use heapless::Vec as HVec;
use thiserror::Error;

use mule_common::consts::MAX_PATH_SEGMENTS;
use mule_common::math::{Pose2D, Vec2, angle_diff};
use mule_common::msg::{PathSegmentMsg, SpeedSpec};

use crate::config::PathConfig;
use crate::profile::{ProfileConstraints, TrapezoidalProfile};
use crate::steering::SteeringController;

/// Point-turn rate floor inside a path [rad/s].
const MIN_TURN_RATE_RADPS: f64 = 0.1;

/// Typed failures of the path editing operations. The failing call
/// mutates nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path already holds the maximum number of segments.
    #[error("path is full")]
    Overflow,
    /// The new segment's start does not meet the previous segment's end.
    #[error("segment start is discontinuous with the path end")]
    Discontinuous,
    /// Traversal of an empty path was requested.
    #[error("path is empty")]
    Empty,
}

/// Geometry of one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentGeometry {
    Line {
        start: Vec2,
        end: Vec2,
    },
    Arc {
        center: Vec2,
        radius_mm: f64,
        start_angle_rad: f64,
        sweep_rad: f64,
    },
    PointTurn {
        target_heading_rad: f64,
    },
}

/// One path segment with its speed envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSegment {
    pub geometry: SegmentGeometry,
    pub speed: SpeedSpec,
}

impl PathSegment {
    /// Build from the wire form.
    pub fn from_msg(msg: &PathSegmentMsg) -> Self {
        match *msg {
            PathSegmentMsg::Line {
                x0_mm,
                y0_mm,
                x1_mm,
                y1_mm,
                speed,
            } => Self {
                geometry: SegmentGeometry::Line {
                    start: Vec2::new(x0_mm, y0_mm),
                    end: Vec2::new(x1_mm, y1_mm),
                },
                speed,
            },
            PathSegmentMsg::Arc {
                cx_mm,
                cy_mm,
                radius_mm,
                start_angle_rad,
                sweep_rad,
                speed,
            } => Self {
                geometry: SegmentGeometry::Arc {
                    center: Vec2::new(cx_mm, cy_mm),
                    radius_mm,
                    start_angle_rad,
                    sweep_rad,
                },
                speed,
            },
            PathSegmentMsg::PointTurn {
                target_heading_rad,
                speed,
            } => Self {
                geometry: SegmentGeometry::PointTurn { target_heading_rad },
                speed,
            },
        }
    }

    /// Along-track length [mm]; zero for point turns.
    pub fn length(&self) -> f64 {
        match self.geometry {
            SegmentGeometry::Line { start, end } => start.distance(end),
            SegmentGeometry::Arc {
                radius_mm,
                sweep_rad,
                ..
            } => radius_mm.abs() * sweep_rad.abs(),
            SegmentGeometry::PointTurn { .. } => 0.0,
        }
    }

    /// Where the segment begins, when it constrains position.
    fn start_point(&self) -> Option<Vec2> {
        match self.geometry {
            SegmentGeometry::Line { start, .. } => Some(start),
            SegmentGeometry::Arc {
                center,
                radius_mm,
                start_angle_rad,
                ..
            } => Some(center + Vec2::from_polar(radius_mm.abs(), start_angle_rad)),
            SegmentGeometry::PointTurn { .. } => None,
        }
    }

    /// Where the segment ends, when it constrains position.
    fn end_point(&self) -> Option<Vec2> {
        match self.geometry {
            SegmentGeometry::Line { end, .. } => Some(end),
            SegmentGeometry::Arc {
                center,
                radius_mm,
                start_angle_rad,
                sweep_rad,
            } => Some(center + Vec2::from_polar(radius_mm.abs(), start_angle_rad + sweep_rad)),
            SegmentGeometry::PointTurn { .. } => None,
        }
    }
}

/// Traversal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowState {
    #[default]
    Idle,
    Traversing,
    Completed,
    Aborted,
}

/// Events the follower reports to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEvent {
    /// The final segment finished; wheels commanded to zero.
    Completed,
    /// Both wheels stalled mid-segment; wheels commanded to zero.
    Aborted,
}

/// The path follower. Owns the path storage for its whole lifetime.
#[derive(Debug, Clone)]
pub struct PathFollower {
    config: PathConfig,
    segments: HVec<PathSegment, MAX_PATH_SEGMENTS>,
    active_index: usize,
    state: FollowState,
    /// Speed magnitude entering the active segment [mm/s].
    entry_speed_mmps: f64,
    /// Profile over the active segment, rebuilt at each entry.
    profile: Option<TrapezoidalProfile>,
    /// Point-turn angular speed state [rad/s].
    turn_omega_radps: f64,
}

impl PathFollower {
    pub fn new(config: PathConfig) -> Self {
        Self {
            config,
            segments: HVec::new(),
            active_index: 0,
            state: FollowState::Idle,
            entry_speed_mmps: 0.0,
            profile: None,
            turn_omega_radps: 0.0,
        }
    }

    // ── Path editing ──

    /// Drop all segments and return to the boot state.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.active_index = 0;
        self.state = FollowState::Idle;
        self.entry_speed_mmps = 0.0;
        self.profile = None;
        self.turn_omega_radps = 0.0;
    }

    fn append(&mut self, segment: PathSegment) -> Result<(), PathError> {
        if let (Some(tail), Some(start)) = (self.path_end(), segment.start_point()) {
            if tail.distance(start) > self.config.continuity_tol_mm {
                return Err(PathError::Discontinuous);
            }
        }
        self.segments.push(segment).map_err(|_| PathError::Overflow)
    }

    /// End position of the path as built so far.
    fn path_end(&self) -> Option<Vec2> {
        self.segments.iter().rev().find_map(|s| s.end_point())
    }

    pub fn append_line(&mut self, start: Vec2, end: Vec2, speed: SpeedSpec) -> Result<(), PathError> {
        self.append(PathSegment {
            geometry: SegmentGeometry::Line { start, end },
            speed,
        })
    }

    pub fn append_arc(
        &mut self,
        center: Vec2,
        radius_mm: f64,
        start_angle_rad: f64,
        sweep_rad: f64,
        speed: SpeedSpec,
    ) -> Result<(), PathError> {
        self.append(PathSegment {
            geometry: SegmentGeometry::Arc {
                center,
                radius_mm,
                start_angle_rad,
                sweep_rad,
            },
            speed,
        })
    }

    pub fn append_point_turn(
        &mut self,
        target_heading_rad: f64,
        speed: SpeedSpec,
    ) -> Result<(), PathError> {
        self.append(PathSegment {
            geometry: SegmentGeometry::PointTurn { target_heading_rad },
            speed,
        })
    }

    /// Append a segment arriving over the wire.
    pub fn append_msg(&mut self, msg: &PathSegmentMsg) -> Result<(), PathError> {
        self.append(PathSegment::from_msg(msg))
    }

    // ── Traversal ──

    /// Begin traversal from the first segment.
    pub fn start(&mut self, steering: &mut SteeringController) -> Result<(), PathError> {
        if self.segments.is_empty() {
            return Err(PathError::Empty);
        }
        self.active_index = 0;
        self.state = FollowState::Traversing;
        self.entry_speed_mmps = 0.0;
        self.turn_omega_radps = 0.0;
        self.enter_segment(0);
        steering.enter_follow();
        Ok(())
    }

    /// Stop traversing without touching the stored segments.
    pub fn stop_traversal(&mut self) {
        if self.state == FollowState::Traversing {
            self.state = FollowState::Idle;
        }
    }

    #[inline]
    pub fn is_traversing(&self) -> bool {
        self.state == FollowState::Traversing
    }

    #[inline]
    pub fn state(&self) -> FollowState {
        self.state
    }

    #[inline]
    pub fn active_index(&self) -> usize {
        self.active_index
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Speed the active segment must end at: the next segment's target
    /// magnitude, or zero at the end of the path / before a point turn.
    fn exit_speed(&self, index: usize) -> f64 {
        match self.segments.get(index + 1) {
            Some(next) => match next.geometry {
                SegmentGeometry::PointTurn { .. } => 0.0,
                _ => next.speed.target_speed_mmps.abs(),
            },
            None => 0.0,
        }
    }

    fn enter_segment(&mut self, index: usize) {
        let segment = self.segments[index];
        self.turn_omega_radps = 0.0;
        self.profile = match segment.geometry {
            SegmentGeometry::PointTurn { .. } => None,
            _ => Some(TrapezoidalProfile::new(
                segment.length(),
                self.entry_speed_mmps,
                self.exit_speed(index),
                ProfileConstraints {
                    max_velocity: segment.speed.target_speed_mmps.abs(),
                    accel: segment.speed.accel_mmps2,
                    decel: segment.speed.decel_mmps2,
                },
            )),
        };
    }

    /// Run one traversal tick.
    pub fn update(
        &mut self,
        pose: Pose2D,
        both_wheels_stalled: bool,
        steering: &mut SteeringController,
        dt_s: f64,
    ) -> Option<PathEvent> {
        if self.state != FollowState::Traversing {
            return None;
        }
        if both_wheels_stalled {
            self.state = FollowState::Aborted;
            steering.stop();
            return Some(PathEvent::Aborted);
        }

        // Advance over any segment boundary crossed this tick, then
        // command the (possibly new) active segment.
        loop {
            let segment = self.segments[self.active_index];
            match self.segment_command(&segment, pose) {
                SegmentTick::Done { exit_speed } => {
                    self.entry_speed_mmps = exit_speed;
                    self.active_index += 1;
                    if self.active_index >= self.segments.len() {
                        self.state = FollowState::Completed;
                        self.active_index = self.segments.len().saturating_sub(1);
                        steering.stop();
                        return Some(PathEvent::Completed);
                    }
                    self.enter_segment(self.active_index);
                }
                SegmentTick::Arc {
                    speed_mmps,
                    curvature_per_mm,
                } => {
                    steering.follow_arc(speed_mmps, curvature_per_mm);
                    return None;
                }
                SegmentTick::Spin { omega_radps } => {
                    let accel = self.segments[self.active_index].speed.accel_mmps2;
                    let target = self.segments[self.active_index]
                        .speed
                        .target_speed_mmps
                        .abs()
                        .max(MIN_TURN_RATE_RADPS);
                    let decel = self.segments[self.active_index].speed.decel_mmps2;
                    // Online angular trapezoid toward the remaining
                    // sweep.
                    let remaining = omega_radps.abs();
                    let cap = if decel > 0.0 {
                        (2.0 * decel * remaining).sqrt()
                    } else {
                        target
                    };
                    let step = if accel > 0.0 { accel * dt_s } else { target };
                    self.turn_omega_radps = (self.turn_omega_radps + step)
                        .min(target)
                        .min(cap)
                        .max(MIN_TURN_RATE_RADPS);
                    steering.follow_spin(self.turn_omega_radps * omega_radps.signum());
                    return None;
                }
            }
        }
    }

    /// Project the pose onto one segment and produce its command.
    fn segment_command(&self, segment: &PathSegment, pose: Pose2D) -> SegmentTick {
        let speed_sign = if segment.speed.target_speed_mmps < 0.0 {
            -1.0
        } else {
            1.0
        };
        match segment.geometry {
            SegmentGeometry::Line { start, end } => {
                let length = start.distance(end);
                if length <= f64::EPSILON {
                    return SegmentTick::Done { exit_speed: self.entry_speed_mmps };
                }
                let u = (end - start) * (1.0 / length);
                let rel = pose.position() - start;
                let progress = rel.dot(u);
                if progress >= length {
                    return SegmentTick::Done {
                        exit_speed: self.profiled_speed(progress),
                    };
                }
                let cross = u.cross(rel);
                let desired_heading = if speed_sign > 0.0 {
                    u.angle()
                } else {
                    u.angle() + core::f64::consts::PI
                };
                let curvature =
                    self.correction(cross, angle_diff(desired_heading, pose.heading_rad))
                        * speed_sign;
                SegmentTick::Arc {
                    speed_mmps: self.profiled_speed(progress) * speed_sign,
                    curvature_per_mm: curvature,
                }
            }
            SegmentGeometry::Arc {
                center,
                radius_mm,
                start_angle_rad,
                sweep_rad,
            } => {
                let radius = radius_mm.abs();
                let sweep_mag = sweep_rad.abs();
                let sweep_sign = if sweep_rad < 0.0 { -1.0 } else { 1.0 };
                let rel = pose.position() - center;
                let pos_angle = rel.angle();

                // Swept angle from the segment start, in the sweep
                // direction, wrapped into [0, 2π).
                let mut swept = (pos_angle - start_angle_rad) * sweep_sign;
                swept %= TAU;
                if swept < 0.0 {
                    swept += TAU;
                }
                if swept >= sweep_mag {
                    // Disambiguate "past the end" from "just before the
                    // start" (numerical noise at entry).
                    if swept - sweep_mag < (TAU - sweep_mag) * 0.5 {
                        return SegmentTick::Done {
                            exit_speed: self.profiled_speed(sweep_mag * radius),
                        };
                    }
                    swept = 0.0;
                }
                let progress = swept * radius;

                let cross = sweep_sign * (radius - rel.length());
                let tangent = pos_angle + sweep_sign * FRAC_PI_2;
                let desired_heading = if speed_sign > 0.0 {
                    tangent
                } else {
                    tangent + core::f64::consts::PI
                };
                let ff = sweep_sign * speed_sign / radius;
                let curvature = ff
                    + self.correction(cross, angle_diff(desired_heading, pose.heading_rad))
                        * speed_sign;
                SegmentTick::Arc {
                    speed_mmps: self.profiled_speed(progress) * speed_sign,
                    curvature_per_mm: curvature,
                }
            }
            SegmentGeometry::PointTurn { target_heading_rad } => {
                let remaining = angle_diff(target_heading_rad, pose.heading_rad);
                if remaining.abs() <= self.config.heading_tol_rad {
                    return SegmentTick::Done { exit_speed: 0.0 };
                }
                SegmentTick::Spin {
                    omega_radps: remaining,
                }
            }
        }
    }

    /// Saturated cross-track + heading correction curvature.
    fn correction(&self, cross_mm: f64, heading_err_rad: f64) -> f64 {
        (-self.config.k_cross * cross_mm + self.config.k_heading * heading_err_rad)
            .clamp(-self.config.max_correction, self.config.max_correction)
    }

    /// Profiled speed magnitude at a progress, floored so segments
    /// always finish.
    fn profiled_speed(&self, progress_mm: f64) -> f64 {
        match &self.profile {
            Some(p) => p.velocity(progress_mm).max(self.config.min_speed_mmps),
            None => self.config.min_speed_mmps,
        }
    }

    // ── Convenience single-segment paths ──

    /// Straight move of `distance_mm` (signed; negative drives in
    /// reverse) from the current pose.
    pub fn drive_straight(
        &mut self,
        pose: Pose2D,
        distance_mm: f64,
        speed_mmps: f64,
        accel_mmps2: f64,
        decel_mmps2: f64,
        steering: &mut SteeringController,
    ) -> Result<(), PathError> {
        self.clear();
        let start = pose.position();
        let end = pose.advanced(distance_mm).position();
        let signed_speed = speed_mmps.abs() * distance_mm.signum();
        self.append_line(
            start,
            end,
            SpeedSpec {
                target_speed_mmps: signed_speed,
                accel_mmps2,
                decel_mmps2,
            },
        )?;
        self.start(steering)
    }

    /// Arc of `sweep_rad` at `radius_mm` from the current pose.
    /// Positive sweep curves left.
    pub fn drive_arc(
        &mut self,
        pose: Pose2D,
        radius_mm: f64,
        sweep_rad: f64,
        speed_mmps: f64,
        accel_mmps2: f64,
        decel_mmps2: f64,
        steering: &mut SteeringController,
    ) -> Result<(), PathError> {
        self.clear();
        let side = if sweep_rad >= 0.0 { 1.0 } else { -1.0 };
        let center = pose.position()
            + Vec2::from_polar(radius_mm.abs(), pose.heading_rad + side * FRAC_PI_2);
        let start_angle = (pose.position() - center).angle();
        self.append_arc(
            center,
            radius_mm.abs(),
            start_angle,
            sweep_rad,
            SpeedSpec {
                target_speed_mmps: speed_mmps,
                accel_mmps2,
                decel_mmps2,
            },
        )?;
        self.start(steering)
    }

    /// In-place rotation to `target_heading_rad`.
    pub fn drive_point_turn(
        &mut self,
        target_heading_rad: f64,
        angular_speed_radps: f64,
        accel_radps2: f64,
        decel_radps2: f64,
        steering: &mut SteeringController,
    ) -> Result<(), PathError> {
        self.clear();
        self.append_point_turn(
            target_heading_rad,
            SpeedSpec {
                target_speed_mmps: angular_speed_radps,
                accel_mmps2: accel_radps2,
                decel_mmps2: decel_radps2,
            },
        )?;
        self.start(steering)
    }
}

/// One tick's outcome for the active segment.
enum SegmentTick {
    Done { exit_speed: f64 },
    Arc { speed_mmps: f64, curvature_per_mm: f64 },
    Spin { omega_radps: f64 },
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.005;

    fn speed(v: f64) -> SpeedSpec {
        SpeedSpec {
            target_speed_mmps: v,
            accel_mmps2: 200.0,
            decel_mmps2: 500.0,
        }
    }

    fn follower() -> (PathFollower, SteeringController) {
        (
            PathFollower::new(PathConfig::default()),
            SteeringController::new(),
        )
    }

    #[test]
    fn empty_path_cannot_start() {
        let (mut f, mut s) = follower();
        assert_eq!(f.start(&mut s), Err(PathError::Empty));
        assert_eq!(f.state(), FollowState::Idle);
    }

    #[test]
    fn overflow_is_rejected_without_mutation() {
        let (mut f, _) = follower();
        for i in 0..MAX_PATH_SEGMENTS {
            let x = i as f64 * 10.0;
            f.append_line(Vec2::new(x, 0.0), Vec2::new(x + 10.0, 0.0), speed(100.0))
                .unwrap();
        }
        let err = f.append_line(
            Vec2::new(80.0, 0.0),
            Vec2::new(90.0, 0.0),
            speed(100.0),
        );
        assert_eq!(err, Err(PathError::Overflow));
        assert_eq!(f.segment_count(), MAX_PATH_SEGMENTS);
    }

    #[test]
    fn discontinuous_append_is_rejected() {
        let (mut f, _) = follower();
        f.append_line(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), speed(100.0))
            .unwrap();
        let err = f.append_line(Vec2::new(150.0, 0.0), Vec2::new(200.0, 0.0), speed(100.0));
        assert_eq!(err, Err(PathError::Discontinuous));
        assert_eq!(f.segment_count(), 1);
    }

    #[test]
    fn point_turn_joins_anywhere() {
        let (mut f, _) = follower();
        f.append_line(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), speed(100.0))
            .unwrap();
        f.append_point_turn(1.0, speed(1.5)).unwrap();
        // Continuity resumes across the turn: next line must start at
        // (100, 0).
        f.append_line(Vec2::new(100.0, 0.0), Vec2::new(100.0, 50.0), speed(100.0))
            .unwrap();
        assert_eq!(f.segment_count(), 3);
        let err = f.append_line(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), speed(100.0));
        assert_eq!(err, Err(PathError::Discontinuous));
    }

    #[test]
    fn clear_after_traversal_equals_boot() {
        let (mut f, mut s) = follower();
        let boot = format!("{:?}", f);
        f.append_line(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), speed(100.0))
            .unwrap();
        f.start(&mut s).unwrap();
        assert!(f.is_traversing());
        f.clear();
        assert_eq!(format!("{:?}", f), boot);
    }

    #[test]
    fn line_commands_forward_speed() {
        let (mut f, mut s) = follower();
        f.append_line(Vec2::new(0.0, 0.0), Vec2::new(300.0, 0.0), speed(100.0))
            .unwrap();
        f.start(&mut s).unwrap();
        let ev = f.update(Pose2D::new(0.0, 0.0, 0.0), false, &mut s, DT);
        assert!(ev.is_none());
        assert!(f.is_traversing());
        assert_eq!(f.active_index(), 0);
    }

    #[test]
    fn line_completes_at_the_end() {
        let (mut f, mut s) = follower();
        f.append_line(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), speed(100.0))
            .unwrap();
        f.start(&mut s).unwrap();
        let ev = f.update(Pose2D::new(101.0, 0.0, 0.0), false, &mut s, DT);
        assert_eq!(ev, Some(PathEvent::Completed));
        assert_eq!(f.state(), FollowState::Completed);
        assert!(!f.is_traversing());
    }

    #[test]
    fn boundary_switch_happens_same_tick() {
        let (mut f, mut s) = follower();
        f.append_line(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), speed(100.0))
            .unwrap();
        f.append_line(Vec2::new(100.0, 0.0), Vec2::new(200.0, 0.0), speed(80.0))
            .unwrap();
        f.start(&mut s).unwrap();
        // One tick past the first boundary: the follower must already
        // be commanding segment 1.
        let ev = f.update(Pose2D::new(100.5, 0.0, 0.0), false, &mut s, DT);
        assert!(ev.is_none());
        assert_eq!(f.active_index(), 1);
        assert!(f.is_traversing());
    }

    #[test]
    fn stall_aborts_traversal() {
        let (mut f, mut s) = follower();
        f.append_line(Vec2::new(0.0, 0.0), Vec2::new(300.0, 0.0), speed(100.0))
            .unwrap();
        f.start(&mut s).unwrap();
        let ev = f.update(Pose2D::new(10.0, 0.0, 0.0), true, &mut s, DT);
        assert_eq!(ev, Some(PathEvent::Aborted));
        assert_eq!(f.state(), FollowState::Aborted);
    }

    #[test]
    fn point_turn_segment_completes_on_heading() {
        let (mut f, mut s) = follower();
        f.append_point_turn(1.0, speed(1.5)).unwrap();
        f.start(&mut s).unwrap();
        let ev = f.update(Pose2D::new(0.0, 0.0, 0.0), false, &mut s, DT);
        assert!(ev.is_none());
        let ev = f.update(Pose2D::new(0.0, 0.0, 1.0), false, &mut s, DT);
        assert_eq!(ev, Some(PathEvent::Completed));
    }

    #[test]
    fn active_index_stays_in_bounds() {
        let (mut f, mut s) = follower();
        f.append_line(Vec2::new(0.0, 0.0), Vec2::new(50.0, 0.0), speed(100.0))
            .unwrap();
        f.start(&mut s).unwrap();
        let mut pose = Pose2D::default();
        for _ in 0..200 {
            if f.is_traversing() {
                assert!(f.active_index() < f.segment_count());
            }
            pose = pose.advanced(1.0);
            f.update(pose, false, &mut s, DT);
        }
    }

    #[test]
    fn drive_straight_reverse_uses_negative_speed() {
        let (mut f, mut s) = follower();
        f.drive_straight(Pose2D::default(), -100.0, 60.0, 200.0, 500.0, &mut s)
            .unwrap();
        assert!(f.is_traversing());
        // A pose behind the start must not complete the segment.
        let ev = f.update(Pose2D::new(-10.0, 0.0, 0.0), false, &mut s, DT);
        assert!(ev.is_none());
        let ev = f.update(Pose2D::new(-101.0, 0.0, 0.0), false, &mut s, DT);
        assert_eq!(ev, Some(PathEvent::Completed));
    }
}
