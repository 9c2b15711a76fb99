//! Diagnostic test modes.
//!
//! A closed set of built-in behaviours used on the production line and
//! the bench: wheel ramps, joint sweeps, an IMU rotation check, an LED
//! cycle, and canned path-follow / pick-and-place demos. At most one
//! test is active; switching tests resets the outgoing one (animations
//! stopped, wheels back to the closed loop, path cleared, docking
//! cancelled) before the new one initializes.
//!
//! Every test is parameterized by the `(p1, p2, p3)` triple from the
//! `StartTestMode` message; each mode documents its own meaning for the
//! three values (see [`TestModeId`]). Zero always means "use the
//! default".

use core::f64::consts::{FRAC_PI_2, PI};

use tracing::info;

use mule_common::consts::{
    HEAD_MAX_ANGLE_RAD, HEAD_MIN_ANGLE_RAD, LIFT_HEIGHT_CARRY_MM, LIFT_HEIGHT_HIGH_DOCK_MM,
    LIFT_HEIGHT_LOW_DOCK_MM, NUM_LEDS,
};
use mule_common::math::{Pose2D, Vec2, normalize_angle};
use mule_common::msg::{DockAction, Rgba, SpeedSpec, TestModeId};

use crate::anim::AnimationController;
use crate::dock::DockingController;
use crate::grip::GripController;
use crate::joint::JointController;
use crate::lift::LiftController;
use crate::path::PathFollower;
use crate::pickplace::{PickPlaceController, PickPlaceDeps, PickPlaceStep};
use crate::steering::{SteeringController, SteeringModeKind};
use crate::wheel::{WheelController, WheelMode, WheelSide};

/// Ticks between wheel-ramp steps.
const RAMP_HOLD_TICKS: u32 = 100;

/// Ticks between telemetry packets.
const TELEMETRY_DIVIDER: u32 = 100;

/// Pause between consecutive IMU test turns [ticks].
const TURN_PAUSE_TICKS: u32 = 100;

/// Everything a test may drive, borrowed for one call.
pub struct TestModeDeps<'a> {
    pub wheels: &'a mut WheelController,
    pub head: &'a mut JointController,
    pub lift: &'a mut LiftController,
    pub grip: &'a mut GripController,
    pub steering: &'a mut SteeringController,
    pub follower: &'a mut PathFollower,
    pub pickplace: &'a mut PickPlaceController,
    pub dock: &'a mut DockingController,
    pub anim: &'a mut AnimationController,
    pub leds: &'a mut [Rgba; NUM_LEDS],
    pub pose: Pose2D,
    pub motion_delta: Pose2D,
    pub both_wheels_stalled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PickPlacePhase {
    Pickup,
    Place,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ActiveTest {
    None,
    DirectDrive {
        /// p1 bit 0: close the loop on speed instead of raw power.
        closed_loop: bool,
        /// Step per ramp stage (mm/s or power %).
        step: i32,
        /// Turnaround magnitude (mm/s or power %).
        limit: i32,
        level: i32,
        rising: bool,
        hold_left: u32,
    },
    LiftSweep {
        /// p1 bit 0: sweep the full anchor range.
        full_range: bool,
        high: bool,
        dwell_ticks: u32,
        dwell_left: u32,
    },
    HeadSweep {
        high: bool,
        dwell_ticks: u32,
        dwell_left: u32,
    },
    ImuTurn {
        /// p1 bit 0: alternate direction between turns.
        alternate: bool,
        left: bool,
        rate_radps: f64,
        accel_radps2: f64,
        pause_left: u32,
    },
    LedCycle {
        hold_ticks: u32,
        hold_left: u32,
        channel: usize,
        color: usize,
    },
    PathDemo {
        reverse: bool,
    },
    PickPlaceDemo {
        marker_id: u8,
        phase: PickPlacePhase,
    },
}

/// Dispatches the diagnostic behaviours.
#[derive(Debug, Clone)]
pub struct TestModeController {
    mode: TestModeId,
    active: ActiveTest,
    telemetry_countdown: u32,
}

impl TestModeController {
    pub fn new() -> Self {
        Self {
            mode: TestModeId::None,
            active: ActiveTest::None,
            telemetry_countdown: TELEMETRY_DIVIDER,
        }
    }

    #[inline]
    pub fn mode(&self) -> TestModeId {
        self.mode
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.mode != TestModeId::None
    }

    /// Bring every actuator the tests touch back to neutral.
    pub fn neutralize(deps: &mut TestModeDeps<'_>) {
        deps.anim.stop();
        deps.wheels.set_mode(WheelMode::Closed);
        deps.steering.stop();
        deps.follower.clear();
        deps.dock.cancel();
        deps.pickplace.reset();
        deps.head.hold();
        deps.lift.hold();
    }

    /// Switch to a test mode. The outgoing test is reset first;
    /// `TestModeId::None` just exits.
    pub fn start(&mut self, id: TestModeId, p1: i32, p2: i32, p3: i32, deps: &mut TestModeDeps<'_>) {
        Self::neutralize(deps);
        info!(?id, p1, p2, p3, "test mode start");
        self.telemetry_countdown = TELEMETRY_DIVIDER;
        self.mode = id;

        self.active = match id {
            TestModeId::None => ActiveTest::None,
            TestModeId::DirectDrive => {
                let closed_loop = p1 & 1 != 0;
                let default_limit = if closed_loop { 120 } else { 60 };
                ActiveTest::DirectDrive {
                    closed_loop,
                    step: if p2 != 0 { p2 } else { 10 },
                    limit: if p3 != 0 { p3.abs() } else { default_limit },
                    level: 0,
                    rising: true,
                    hold_left: RAMP_HOLD_TICKS,
                }
            }
            TestModeId::LiftSweep => ActiveTest::LiftSweep {
                full_range: p1 & 1 != 0,
                high: true,
                dwell_ticks: if p3 > 0 { p3 as u32 } else { 100 },
                dwell_left: 0,
            },
            TestModeId::HeadSweep => ActiveTest::HeadSweep {
                high: true,
                dwell_ticks: if p3 > 0 { p3 as u32 } else { 100 },
                dwell_left: 0,
            },
            TestModeId::ImuTurn => ActiveTest::ImuTurn {
                alternate: p1 & 1 != 0,
                left: true,
                rate_radps: if p2 != 0 { p2 as f64 / 100.0 } else { 1.5 },
                accel_radps2: if p3 != 0 { p3 as f64 / 100.0 } else { 10.0 },
                pause_left: TURN_PAUSE_TICKS,
            },
            TestModeId::LedCycle => ActiveTest::LedCycle {
                hold_ticks: if p1 > 0 { p1 as u32 } else { 100 },
                hold_left: if p1 > 0 { p1 as u32 } else { 100 },
                channel: 0,
                color: 0,
            },
            TestModeId::PathFollowDemo => ActiveTest::PathDemo {
                reverse: p1 & 1 != 0,
            },
            TestModeId::PickPlaceDemo => ActiveTest::PickPlaceDemo {
                marker_id: if p1 > 0 { p1 as u8 } else { 1 },
                phase: PickPlacePhase::Pickup,
            },
        };

        // One-shot initialization that needs the deps.
        match &self.active {
            ActiveTest::LiftSweep { full_range, .. } => {
                let target = sweep_high_height(*full_range);
                deps.lift.set_height(target);
            }
            ActiveTest::HeadSweep { .. } => {
                deps.head.set_target(HEAD_MAX_ANGLE_RAD - 0.05);
            }
            ActiveTest::ImuTurn {
                rate_radps,
                accel_radps2,
                ..
            } => {
                let target = normalize_angle(deps.pose.heading_rad + PI);
                deps.steering.point_turn(
                    deps.pose.heading_rad,
                    target,
                    *rate_radps,
                    *accel_radps2,
                    *accel_radps2,
                );
            }
            ActiveTest::PathDemo { reverse } => {
                launch_demo_path(deps, *reverse);
            }
            ActiveTest::PickPlaceDemo { marker_id, .. } => {
                deps.pickplace.start(
                    *marker_id,
                    DockAction::PickupHigh,
                    (0.0, 0.0, 0.0),
                    deps.dock,
                );
            }
            _ => {}
        }
    }

    /// Run the active test for one tick. Returns telemetry values when
    /// a packet is due.
    pub fn update(&mut self, deps: &mut TestModeDeps<'_>, dt_s: f64) -> Option<(f64, f64, f64)> {
        match &mut self.active {
            ActiveTest::None => {}
            ActiveTest::DirectDrive {
                closed_loop,
                step,
                limit,
                level,
                rising,
                hold_left,
            } => {
                if *hold_left == 0 {
                    *hold_left = RAMP_HOLD_TICKS;
                    let next = if *rising {
                        *level + *step
                    } else {
                        *level - *step
                    };
                    if next.abs() > *limit {
                        *rising = !*rising;
                    } else {
                        *level = next;
                    }
                } else {
                    *hold_left -= 1;
                }
                if *closed_loop {
                    deps.steering
                        .drive_wheels(*level as f64, *level as f64, 0.0, 0.0);
                } else {
                    deps.wheels.set_mode(WheelMode::Passthrough);
                    let power = *level as f64 / 100.0;
                    deps.wheels.set_raw_power(power, power);
                }
            }
            ActiveTest::LiftSweep {
                full_range,
                high,
                dwell_ticks,
                dwell_left,
            } => {
                if deps.lift.is_in_position() {
                    if *dwell_left == 0 {
                        *high = !*high;
                        let target = if *high {
                            sweep_high_height(*full_range)
                        } else {
                            LIFT_HEIGHT_LOW_DOCK_MM + 10.0
                        };
                        deps.lift.set_height(target);
                        *dwell_left = *dwell_ticks;
                    } else {
                        *dwell_left -= 1;
                    }
                }
            }
            ActiveTest::HeadSweep {
                high,
                dwell_ticks,
                dwell_left,
            } => {
                if deps.head.is_in_position() {
                    if *dwell_left == 0 {
                        *high = !*high;
                        let target = if *high {
                            HEAD_MAX_ANGLE_RAD - 0.05
                        } else {
                            HEAD_MIN_ANGLE_RAD + 0.05
                        };
                        deps.head.set_target(target);
                        *dwell_left = *dwell_ticks;
                    } else {
                        *dwell_left -= 1;
                    }
                }
            }
            ActiveTest::ImuTurn {
                alternate,
                left,
                rate_radps,
                accel_radps2,
                pause_left,
            } => {
                if deps.steering.mode_kind() != SteeringModeKind::PointTurn {
                    if *pause_left > 0 {
                        *pause_left -= 1;
                    } else {
                        if *alternate {
                            *left = !*left;
                        }
                        let dir = if *left { 1.0 } else { -1.0 };
                        let target = normalize_angle(deps.pose.heading_rad + dir * PI);
                        deps.steering.point_turn(
                            deps.pose.heading_rad,
                            target,
                            dir * *rate_radps,
                            *accel_radps2,
                            *accel_radps2,
                        );
                        *pause_left = TURN_PAUSE_TICKS;
                    }
                }
            }
            ActiveTest::LedCycle {
                hold_ticks,
                hold_left,
                channel,
                color,
            } => {
                const COLORS: [Rgba; 3] = [Rgba::RED, Rgba::GREEN, Rgba::BLUE];
                deps.leds[*channel] = COLORS[*color];
                if *hold_left == 0 {
                    *hold_left = *hold_ticks;
                    *channel += 1;
                    if *channel >= NUM_LEDS {
                        *channel = 0;
                        *color = (*color + 1) % COLORS.len();
                    }
                } else {
                    *hold_left -= 1;
                }
            }
            ActiveTest::PathDemo { .. } => {
                deps.follower.update(
                    deps.pose,
                    deps.both_wheels_stalled,
                    deps.steering,
                    dt_s,
                );
            }
            ActiveTest::PickPlaceDemo { marker_id, phase } => {
                let mut pp_deps = PickPlaceDeps {
                    dock: &mut *deps.dock,
                    lift: &mut *deps.lift,
                    grip: &mut *deps.grip,
                    steering: &mut *deps.steering,
                };
                let event =
                    deps.pickplace
                        .update(deps.pose, deps.motion_delta, &mut pp_deps, dt_s);
                match *phase {
                    PickPlacePhase::Pickup => {
                        if let Some(e) = event {
                            if e.success {
                                deps.pickplace.start(
                                    *marker_id,
                                    DockAction::PlaceOnGround,
                                    (100.0, -10.0, 0.0),
                                    deps.dock,
                                );
                                *phase = PickPlacePhase::Place;
                            } else {
                                *phase = PickPlacePhase::Finished;
                            }
                        }
                    }
                    PickPlacePhase::Place => {
                        if event.is_some() {
                            *phase = PickPlacePhase::Finished;
                        }
                    }
                    PickPlacePhase::Finished => {}
                }
            }
        }

        self.telemetry(deps)
    }

    fn telemetry(&mut self, deps: &TestModeDeps<'_>) -> Option<(f64, f64, f64)> {
        if self.mode == TestModeId::None {
            return None;
        }
        if self.telemetry_countdown > 0 {
            self.telemetry_countdown -= 1;
            return None;
        }
        self.telemetry_countdown = TELEMETRY_DIVIDER;

        Some(match self.active {
            ActiveTest::DirectDrive { level, .. } => (
                level as f64,
                deps.wheels.state(WheelSide::Left).filtered_speed_mmps,
                deps.wheels.state(WheelSide::Right).filtered_speed_mmps,
            ),
            ActiveTest::LiftSweep { .. } => (
                deps.lift.height_mm(),
                deps.lift.target_angle(),
                deps.lift.is_in_position() as u8 as f64,
            ),
            ActiveTest::HeadSweep { .. } => (
                deps.head.angle(),
                deps.head.target(),
                deps.head.is_in_position() as u8 as f64,
            ),
            ActiveTest::ImuTurn { .. } => (deps.pose.heading_rad, 0.0, 0.0),
            ActiveTest::LedCycle {
                channel, color, ..
            } => (channel as f64, color as f64, 0.0),
            ActiveTest::PathDemo { .. } => (
                deps.follower.active_index() as f64,
                deps.follower.is_traversing() as u8 as f64,
                0.0,
            ),
            ActiveTest::PickPlaceDemo { .. } => (
                deps.pickplace.step() as u8 as f64,
                deps.pickplace.last_success() as u8 as f64,
                0.0,
            ),
            ActiveTest::None => return None,
        })
    }

    /// Exit whatever test is running and neutralize.
    pub fn stop(&mut self, deps: &mut TestModeDeps<'_>) {
        Self::neutralize(deps);
        self.mode = TestModeId::None;
        self.active = ActiveTest::None;
    }

    /// Return to the boot state without touching peripherals.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for TestModeController {
    fn default() -> Self {
        Self::new()
    }
}

/// Upper sweep target for the lift test [mm].
fn sweep_high_height(full_range: bool) -> f64 {
    if full_range {
        LIFT_HEIGHT_HIGH_DOCK_MM - 2.0
    } else {
        LIFT_HEIGHT_CARRY_MM - 10.0
    }
}

/// Lay out the demo path from the current pose: 300 mm straight, a
/// quarter-circle left, and a point turn back the way we came. The
/// reverse variant is a single backwards straight.
fn launch_demo_path(deps: &mut TestModeDeps<'_>, reverse: bool) {
    let speed = SpeedSpec {
        target_speed_mmps: 100.0,
        accel_mmps2: 200.0,
        decel_mmps2: 500.0,
    };
    if reverse {
        let _ = deps.follower.drive_straight(
            deps.pose,
            -300.0,
            speed.target_speed_mmps,
            speed.accel_mmps2,
            speed.decel_mmps2,
            deps.steering,
        );
        return;
    }

    deps.follower.clear();
    let heading = deps.pose.heading_rad;
    let start = deps.pose.position();
    let line_end = deps.pose.advanced(300.0).position();
    let ok = deps.follower.append_line(start, line_end, speed).is_ok();

    let radius = 100.0;
    let center = line_end + Vec2::from_polar(radius, heading + FRAC_PI_2);
    let start_angle = (line_end - center).angle();
    let ok = ok
        && deps
            .follower
            .append_arc(center, radius, start_angle, FRAC_PI_2, speed)
            .is_ok();
    let ok = ok
        && deps
            .follower
            .append_point_turn(
                normalize_angle(heading + PI),
                SpeedSpec {
                    target_speed_mmps: 1.5,
                    accel_mmps2: 10.0,
                    decel_mmps2: 10.0,
                },
            )
            .is_ok();
    if ok {
        let _ = deps.follower.start(deps.steering);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
