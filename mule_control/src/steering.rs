//! Steering: the single arbitration point for wheel-speed commands.
//!
//! Every motion intent — direct wheel speeds, an arc, a point turn, or
//! the path follower's per-tick output — goes through here before it
//! reaches the wheel controller. Entering a new mode cancels whatever
//! was in progress and pushes fresh targets on the same tick. Modes
//! never preempt each other silently; the caller asks for the change.

use mule_common::consts::TRACK_WIDTH_MM;
use mule_common::math::angle_diff;

use crate::profile::{ProfileConstraints, TrapezoidalProfile};
use crate::wheel::WheelController;

/// Floor under the profiled point-turn rate so turns always finish
/// [rad/s].
const MIN_TURN_RATE_RADPS: f64 = 0.1;

/// Point-turn completion window [rad].
const TURN_DONE_TOL_RAD: f64 = 0.02;

/// Events the steering controller reports to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteeringEvent {
    /// A commanded point turn reached its heading.
    PointTurnComplete,
}

/// Discriminant of the active steering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteeringModeKind {
    Idle,
    Direct,
    Arc,
    PointTurn,
    Follow,
}

#[derive(Debug, Clone, Copy)]
struct PointTurnState {
    target_heading_rad: f64,
    /// +1 = counter-clockwise.
    direction: f64,
    profile: TrapezoidalProfile,
    traveled_rad: f64,
    last_heading_rad: f64,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Idle,
    Direct {
        left_mmps: f64,
        right_mmps: f64,
        left_accel_mmps2: f64,
        right_accel_mmps2: f64,
    },
    Arc {
        speed_mmps: f64,
        curvature_per_mm: f64,
        accel_mmps2: f64,
    },
    PointTurn(PointTurnState),
    Follow {
        speed_mmps: f64,
        curvature_per_mm: f64,
        spin_radps: Option<f64>,
    },
}

/// Converts motion intents into per-wheel speed targets.
#[derive(Debug, Clone)]
pub struct SteeringController {
    mode: Mode,
    pending_stop: bool,
}

impl SteeringController {
    pub fn new() -> Self {
        Self {
            mode: Mode::Idle,
            pending_stop: false,
        }
    }

    #[inline]
    pub fn mode_kind(&self) -> SteeringModeKind {
        match self.mode {
            Mode::Idle => SteeringModeKind::Idle,
            Mode::Direct { .. } => SteeringModeKind::Direct,
            Mode::Arc { .. } => SteeringModeKind::Arc,
            Mode::PointTurn(_) => SteeringModeKind::PointTurn,
            Mode::Follow { .. } => SteeringModeKind::Follow,
        }
    }

    /// Direct drive: per-wheel targets passed through unchanged.
    pub fn drive_wheels(
        &mut self,
        left_mmps: f64,
        right_mmps: f64,
        left_accel_mmps2: f64,
        right_accel_mmps2: f64,
    ) {
        self.mode = Mode::Direct {
            left_mmps,
            right_mmps,
            left_accel_mmps2,
            right_accel_mmps2,
        };
        self.pending_stop = false;
    }

    /// Constant-curvature arc at a given speed.
    pub fn drive_arc(&mut self, speed_mmps: f64, curvature_per_mm: f64, accel_mmps2: f64) {
        self.mode = Mode::Arc {
            speed_mmps,
            curvature_per_mm,
            accel_mmps2,
        };
        self.pending_stop = false;
    }

    /// Rotate in place to `target_heading_rad`.
    ///
    /// The sign of `angular_vel_radps` picks the rotation direction;
    /// zero picks the shorter way.
    pub fn point_turn(
        &mut self,
        current_heading_rad: f64,
        target_heading_rad: f64,
        angular_vel_radps: f64,
        accel_radps2: f64,
        decel_radps2: f64,
    ) {
        let shortest = angle_diff(target_heading_rad, current_heading_rad);
        let direction = if angular_vel_radps > 0.0 {
            1.0
        } else if angular_vel_radps < 0.0 {
            -1.0
        } else if shortest >= 0.0 {
            1.0
        } else {
            -1.0
        };
        // Sweep measured in the chosen direction.
        let mut sweep = shortest * direction;
        if sweep < -TURN_DONE_TOL_RAD {
            sweep += core::f64::consts::TAU;
        }
        let sweep = sweep.max(0.0);

        let rate = angular_vel_radps.abs().max(MIN_TURN_RATE_RADPS);
        self.mode = Mode::PointTurn(PointTurnState {
            target_heading_rad,
            direction,
            profile: TrapezoidalProfile::new(
                sweep,
                0.0,
                0.0,
                ProfileConstraints {
                    max_velocity: rate,
                    accel: accel_radps2,
                    decel: decel_radps2,
                },
            ),
            traveled_rad: 0.0,
            last_heading_rad: current_heading_rad,
        });
        self.pending_stop = false;
    }

    /// Hand the wheel command over to the path follower.
    pub fn enter_follow(&mut self) {
        self.mode = Mode::Follow {
            speed_mmps: 0.0,
            curvature_per_mm: 0.0,
            spin_radps: None,
        };
        self.pending_stop = false;
    }

    /// Per-tick arc intent from the path follower (Follow mode only).
    pub fn follow_arc(&mut self, speed_mmps: f64, curvature_per_mm: f64) {
        if let Mode::Follow {
            speed_mmps: s,
            curvature_per_mm: k,
            spin_radps,
        } = &mut self.mode
        {
            *s = speed_mmps;
            *k = curvature_per_mm;
            *spin_radps = None;
        }
    }

    /// Per-tick spin intent from the path follower (Follow mode only).
    pub fn follow_spin(&mut self, omega_radps: f64) {
        if let Mode::Follow { spin_radps, .. } = &mut self.mode {
            *spin_radps = Some(omega_radps);
        }
    }

    /// Cancel the current mode and command zero on the next update.
    pub fn stop(&mut self) {
        self.mode = Mode::Idle;
        self.pending_stop = true;
    }

    /// Push this tick's wheel targets. Runs after the high-level
    /// controllers and before the wheel loop.
    pub fn update(
        &mut self,
        heading_rad: f64,
        wheels: &mut WheelController,
    ) -> Option<SteeringEvent> {
        if self.pending_stop {
            self.pending_stop = false;
            wheels.stop();
        }
        match &mut self.mode {
            Mode::Idle => None,
            Mode::Direct {
                left_mmps,
                right_mmps,
                left_accel_mmps2,
                right_accel_mmps2,
            } => {
                wheels.set_targets(*left_mmps, *right_mmps, *left_accel_mmps2, *right_accel_mmps2);
                None
            }
            Mode::Arc {
                speed_mmps,
                curvature_per_mm,
                accel_mmps2,
            } => {
                let (left, right) = arc_to_wheels(*speed_mmps, *curvature_per_mm);
                wheels.set_targets(left, right, *accel_mmps2, *accel_mmps2);
                None
            }
            Mode::PointTurn(state) => {
                // Accumulate traveled angle in the turn direction.
                let step = angle_diff(heading_rad, state.last_heading_rad) * state.direction;
                state.last_heading_rad = heading_rad;
                state.traveled_rad += step.max(0.0);

                let remaining = angle_diff(state.target_heading_rad, heading_rad);
                if remaining.abs() <= TURN_DONE_TOL_RAD
                    || state.traveled_rad >= state.profile.distance()
                {
                    self.mode = Mode::Idle;
                    wheels.stop();
                    return Some(SteeringEvent::PointTurnComplete);
                }

                let rate = state
                    .profile
                    .velocity(state.traveled_rad)
                    .max(MIN_TURN_RATE_RADPS)
                    * state.direction;
                let half = rate * TRACK_WIDTH_MM * 0.5;
                wheels.set_targets(-half, half, 0.0, 0.0);
                None
            }
            Mode::Follow {
                speed_mmps,
                curvature_per_mm,
                spin_radps,
            } => {
                if let Some(omega) = *spin_radps {
                    let half = omega * TRACK_WIDTH_MM * 0.5;
                    wheels.set_targets(-half, half, 0.0, 0.0);
                } else {
                    let (left, right) = arc_to_wheels(*speed_mmps, *curvature_per_mm);
                    wheels.set_targets(left, right, 0.0, 0.0);
                }
                None
            }
        }
    }

    /// Return to the boot state.
    pub fn reset(&mut self) {
        self.mode = Mode::Idle;
        self.pending_stop = false;
    }
}

impl Default for SteeringController {
    fn default() -> Self {
        Self::new()
    }
}

/// Differential split of an arc intent over the wheelbase.
#[inline]
fn arc_to_wheels(speed_mmps: f64, curvature_per_mm: f64) -> (f64, f64) {
    let half = speed_mmps * curvature_per_mm * TRACK_WIDTH_MM * 0.5;
    (speed_mmps - half, speed_mmps + half)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WheelConfig;
    use crate::wheel::WheelSide;
    use core::f64::consts::FRAC_PI_2;

    const DT: f64 = 0.005;

    fn rig() -> (SteeringController, WheelController) {
        (
            SteeringController::new(),
            WheelController::new(WheelConfig::default()),
        )
    }

    #[test]
    fn straight_arc_has_equal_wheels() {
        let (l, r) = arc_to_wheels(100.0, 0.0);
        assert_eq!(l, 100.0);
        assert_eq!(r, 100.0);
    }

    #[test]
    fn positive_curvature_turns_left() {
        // CCW arc: right wheel runs faster.
        let (l, r) = arc_to_wheels(100.0, 0.01);
        assert!(r > l);
        assert!((0.5 * (l + r) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn direct_mode_pushes_targets_each_tick() {
        let (mut s, mut w) = rig();
        s.drive_wheels(50.0, -50.0, 0.0, 0.0);
        s.update(0.0, &mut w);
        w.update(0.0, 0.0, DT);
        assert_eq!(w.state(WheelSide::Left).commanded_speed_mmps, 50.0);
        assert_eq!(w.state(WheelSide::Right).commanded_speed_mmps, -50.0);
        assert_eq!(s.mode_kind(), SteeringModeKind::Direct);
    }

    #[test]
    fn point_turn_commands_opposite_wheels() {
        let (mut s, mut w) = rig();
        s.point_turn(0.0, FRAC_PI_2, 1.5, 10.0, 10.0);
        let ev = s.update(0.0, &mut w);
        assert!(ev.is_none());
        w.update(0.0, 0.0, DT);
        let l = w.state(WheelSide::Left).commanded_speed_mmps;
        let r = w.state(WheelSide::Right).commanded_speed_mmps;
        assert!((l + r).abs() < 1e-9, "opposite and equal: {l} vs {r}");
        assert!(r > 0.0, "CCW turn drives the right wheel forward");
    }

    #[test]
    fn point_turn_to_current_heading_is_zero_motion() {
        let (mut s, mut w) = rig();
        s.point_turn(1.0, 1.0, 1.5, 10.0, 10.0);
        let ev = s.update(1.0, &mut w);
        assert_eq!(ev, Some(SteeringEvent::PointTurnComplete));
        w.update(0.0, 0.0, DT);
        assert_eq!(w.state(WheelSide::Left).commanded_speed_mmps, 0.0);
        assert_eq!(s.mode_kind(), SteeringModeKind::Idle);
    }

    #[test]
    fn negative_rate_turns_clockwise() {
        let (mut s, mut w) = rig();
        // Target is +90° but the commanded direction is CW: the long
        // way around.
        s.point_turn(0.0, FRAC_PI_2, -1.5, 10.0, 10.0);
        s.update(0.0, &mut w);
        w.update(0.0, 0.0, DT);
        assert!(w.state(WheelSide::Left).commanded_speed_mmps > 0.0);
    }

    #[test]
    fn point_turn_completes_when_heading_arrives() {
        let (mut s, mut w) = rig();
        s.point_turn(0.0, FRAC_PI_2, 1.5, 10.0, 10.0);
        let mut heading = 0.0;
        let mut done = false;
        for _ in 0..2_000 {
            if let Some(SteeringEvent::PointTurnComplete) = s.update(heading, &mut w) {
                done = true;
                break;
            }
            // Pretend the robot tracks the commanded rate exactly.
            let r = w_commanded_rate(&mut w);
            heading += r * DT;
        }
        assert!(done);
        assert!((heading - FRAC_PI_2).abs() < 0.05);
    }

    fn w_commanded_rate(w: &mut WheelController) -> f64 {
        w.update(0.0, 0.0, DT);
        let l = w.state(WheelSide::Left).commanded_speed_mmps;
        let r = w.state(WheelSide::Right).commanded_speed_mmps;
        (r - l) / TRACK_WIDTH_MM
    }

    #[test]
    fn follow_mode_forwards_arc_intents() {
        let (mut s, mut w) = rig();
        s.enter_follow();
        s.follow_arc(80.0, 0.0);
        s.update(0.0, &mut w);
        w.update(0.0, 0.0, DT);
        assert_eq!(w.state(WheelSide::Left).commanded_speed_mmps, 80.0);
        // Arc intents outside Follow mode are ignored.
        s.stop();
        s.follow_arc(80.0, 0.0);
        s.update(0.0, &mut w);
        w.update(0.0, 0.0, DT);
        assert_eq!(w.state(WheelSide::Left).commanded_speed_mmps, 0.0);
    }

    #[test]
    fn stop_pushes_zero_once() {
        let (mut s, mut w) = rig();
        s.drive_wheels(100.0, 100.0, 0.0, 0.0);
        s.stop();
        s.update(0.0, &mut w);
        w.update(0.0, 0.0, DT);
        assert_eq!(w.state(WheelSide::Left).commanded_speed_mmps, 0.0);
        assert_eq!(s.mode_kind(), SteeringModeKind::Idle);
    }
}
