//! Pick-and-place: coordinated docking, lift, and gripper sequencing.
//!
//! One explicit state machine, one transition per tick. The docking
//! controller runs as a delegate while this controller is the active
//! behavior; transitions gate on `Docking::is_locked`,
//! `Lift::is_in_position`, and the gripper pulse, each under a per-step
//! timeout. Any sub-step failure records the step, commands zero, and
//! surfaces a single failure event; the next command starts fresh.

use mule_common::consts::{
    LIFT_HEIGHT_CARRY_MM, LIFT_HEIGHT_HIGH_DOCK_MM, LIFT_HEIGHT_LOW_DOCK_MM,
};
use mule_common::math::{Pose2D, Vec2};
use mule_common::msg::DockAction;

use crate::config::PickPlaceConfig;
use crate::dock::{DockEvent, DockingController};
use crate::grip::GripController;
use crate::lift::LiftController;
use crate::steering::SteeringController;

/// Steps of the manipulation sequence. The discriminant travels in the
/// `ActionCompleted` detail byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PickPlaceStep {
    #[default]
    Idle = 0,
    WaitingForMarker = 1,
    Approaching = 2,
    Engaging = 3,
    Lifting = 4,
    Retreating = 5,
    Placing = 6,
    Done = 7,
    Failed = 8,
}

/// Completion event for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickPlaceEvent {
    pub success: bool,
    /// The step that was running when the sequence ended.
    pub step: PickPlaceStep,
}

/// Sibling controllers the sequence drives each tick.
pub struct PickPlaceDeps<'a> {
    pub dock: &'a mut DockingController,
    pub lift: &'a mut LiftController,
    pub grip: &'a mut GripController,
    pub steering: &'a mut SteeringController,
}

/// The pick-and-place controller.
#[derive(Debug, Clone)]
pub struct PickPlaceController {
    config: PickPlaceConfig,
    step: PickPlaceStep,
    action: DockAction,
    marker_id: u8,
    /// Ticks left before the current step times out.
    step_ticks_left: u32,
    /// Gripper pulse already started within Engaging/Placing.
    gripper_started: bool,
    /// Position where the retreat began.
    retreat_start: Vec2,
    /// Success flag of the last completed sequence.
    last_success: bool,
}

impl PickPlaceController {
    pub fn new(config: PickPlaceConfig) -> Self {
        Self {
            config,
            step: PickPlaceStep::Idle,
            action: DockAction::PickupLow,
            marker_id: 0,
            step_ticks_left: 0,
            gripper_started: false,
            retreat_start: Vec2::default(),
            last_success: false,
        }
    }

    /// Begin a sequence. For `PlaceOnGround` the pose is the
    /// odometry-relative placement; vision actions ignore it.
    pub fn start(
        &mut self,
        marker_id: u8,
        action: DockAction,
        ground_pose: (f64, f64, f64),
        dock: &mut DockingController,
    ) {
        self.action = action;
        self.marker_id = marker_id;
        self.gripper_started = false;
        self.step_ticks_left = self.config.step_timeout_ticks;
        if action == DockAction::PlaceOnGround {
            let (dx, dy, dtheta) = ground_pose;
            dock.start_relative(dx, dy, dtheta);
            self.step = PickPlaceStep::Approaching;
        } else {
            dock.start(marker_id, 0.0);
            self.step = PickPlaceStep::WaitingForMarker;
        }
    }

    /// Abort and return to idle on the next command.
    pub fn cancel(&mut self, deps: &mut PickPlaceDeps<'_>) {
        deps.dock.cancel();
        deps.steering.stop();
        self.step = PickPlaceStep::Idle;
    }

    #[inline]
    pub fn step(&self) -> PickPlaceStep {
        self.step
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(
            self.step,
            PickPlaceStep::Idle | PickPlaceStep::Done | PickPlaceStep::Failed
        )
    }

    #[inline]
    pub fn last_success(&self) -> bool {
        self.last_success
    }

    /// Lift height the action docks at [mm].
    fn dock_height(&self) -> f64 {
        match self.action {
            DockAction::PickupLow | DockAction::PlaceLow | DockAction::PlaceOnGround => {
                LIFT_HEIGHT_LOW_DOCK_MM
            }
            DockAction::PickupHigh | DockAction::PlaceHigh => LIFT_HEIGHT_HIGH_DOCK_MM,
        }
    }

    fn advance(&mut self, step: PickPlaceStep) {
        self.step = step;
        self.step_ticks_left = self.config.step_timeout_ticks;
        self.gripper_started = false;
    }

    fn fail(&mut self, deps: &mut PickPlaceDeps<'_>) -> Option<PickPlaceEvent> {
        let step = self.step;
        deps.dock.cancel();
        deps.steering.stop();
        self.step = PickPlaceStep::Failed;
        self.last_success = false;
        Some(PickPlaceEvent {
            success: false,
            step,
        })
    }

    /// Run one tick.
    pub fn update(
        &mut self,
        pose: Pose2D,
        motion_delta: Pose2D,
        deps: &mut PickPlaceDeps<'_>,
        dt_s: f64,
    ) -> Option<PickPlaceEvent> {
        if !self.is_active() {
            return None;
        }

        if self.step_ticks_left == 0 {
            // Marker never seen and approach failures both surface as
            // an approach failure to the supervisor.
            if self.step == PickPlaceStep::WaitingForMarker {
                self.step = PickPlaceStep::Approaching;
            }
            return self.fail(deps);
        }
        self.step_ticks_left -= 1;

        match self.step {
            PickPlaceStep::WaitingForMarker => {
                deps.dock.update(motion_delta, deps.steering, dt_s);
                if deps.dock.has_target() {
                    self.advance(PickPlaceStep::Approaching);
                }
                None
            }
            PickPlaceStep::Approaching => {
                match deps.dock.update(motion_delta, deps.steering, dt_s) {
                    Some(DockEvent::LostTarget) => return self.fail(deps),
                    Some(DockEvent::Locked) => {
                        deps.lift.set_height(self.dock_height());
                        self.advance(PickPlaceStep::Engaging);
                    }
                    None => {}
                }
                None
            }
            PickPlaceStep::Engaging => {
                // Hold position while the lift and gripper work.
                deps.dock.update(motion_delta, deps.steering, dt_s);
                if deps.lift.is_in_position() && !self.gripper_started {
                    if self.action.is_place() {
                        deps.grip.disengage();
                    } else {
                        deps.grip.engage();
                    }
                    self.gripper_started = true;
                } else if self.gripper_started && deps.grip.is_idle() {
                    if self.action.is_place() {
                        self.advance(PickPlaceStep::Placing);
                    } else {
                        deps.lift.set_height(LIFT_HEIGHT_CARRY_MM);
                        self.advance(PickPlaceStep::Lifting);
                    }
                }
                None
            }
            PickPlaceStep::Lifting => {
                deps.dock.update(motion_delta, deps.steering, dt_s);
                if deps.lift.is_in_position() {
                    self.retreat_start = pose.position();
                    deps.dock.cancel();
                    self.advance(PickPlaceStep::Retreating);
                }
                None
            }
            PickPlaceStep::Placing => {
                deps.dock.update(motion_delta, deps.steering, dt_s);
                // The object is released; back away.
                self.retreat_start = pose.position();
                deps.dock.cancel();
                self.advance(PickPlaceStep::Retreating);
                None
            }
            PickPlaceStep::Retreating => {
                let moved = pose.position().distance(self.retreat_start);
                if moved >= self.config.retreat_distance_mm {
                    deps.steering.stop();
                    self.step = PickPlaceStep::Done;
                    self.last_success = true;
                    return Some(PickPlaceEvent {
                        success: true,
                        step: PickPlaceStep::Done,
                    });
                }
                // Plain reverse crawl.
                let v = -self.config.retreat_speed_mmps;
                deps.steering.drive_wheels(v, v, 0.0, 0.0);
                None
            }
            _ => None,
        }
    }

    /// Return to the boot state.
    pub fn reset(&mut self) {
        let config = self.config;
        *self = Self::new(config);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
