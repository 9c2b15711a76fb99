//! The main tick: a deterministic, single-threaded scheduler.
//!
//! One [`Scheduler`] owns the HAL and every controller; no controller
//! owns another. Each control period [`Scheduler::step`] runs the
//! canonical sequence:
//!
//! 1. Read the HAL (encoders, IMU, host bytes).
//! 2. Update the IMU filter.
//! 3. Update localization.
//! 4. Drain and dispatch supervisor commands.
//! 5. Update the single active high-level behavior (test mode,
//!    pick-and-place, docking, or path following — mutually exclusive).
//! 6. Update the animation controller (may override actuators).
//! 7. Update steering (skipped for wheel-owning animations).
//! 8. Update the wheel, head, lift, and gripper loops; write powers.
//! 9. Emit status.
//!
//! Any observable quantity refers to its value at the end of the tick;
//! timestamps are the tick index, compared with wrapping arithmetic.

use heapless::Vec as HVec;
use tracing::{debug, warn};

use mule_common::consts::{
    CONTROL_DT_S, HEAD_MAX_ANGLE_RAD, HEAD_MIN_ANGLE_RAD, MAX_WHEEL_ACCEL_MMPS2,
    MAX_WHEEL_SPEED_MMPS, NUM_LEDS, TRACK_WIDTH_MM,
};
use mule_common::faults::RobotFault;
use mule_common::link::{CommandConsumer, StatusProducer};
use mule_common::math::Pose2D;
use mule_common::msg::{
    self, ActionKind, Command, Rgba, RobotStateMsg, Status, TestModeId,
};
use mule_hal::{Hal, MotorId};

use crate::anim::{ActuatorMask, AnimationController};
use crate::config::ControlConfig;
use crate::dock::{DockEvent, DockingController};
use crate::grip::GripController;
use crate::imu::ImuFilter;
use crate::joint::JointController;
use crate::lift::LiftController;
use crate::odom::Localization;
use crate::path::{PathEvent, PathFollower};
use crate::pickplace::{PickPlaceController, PickPlaceDeps};
use crate::steering::{SteeringController, SteeringEvent};
use crate::testmode::{TestModeController, TestModeDeps};
use crate::wheel::{WheelController, WheelSide};

/// Wheel speed agreement window for trusting the odometric yaw rate
/// [mm/s].
const ODO_AGREE_TOL_MMPS: f64 = 20.0;

/// Partial-frame accumulator size [bytes].
const RX_BUF_LEN: usize = 256;

/// Status/event staging capacity per tick.
const EVENTS_PER_TICK: usize = 6;

/// The one high-level behavior allowed to run in step 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveBehavior {
    #[default]
    None,
    TestMode,
    PickAndPlace,
    Docking,
    PathFollow,
}

// ─── Cycle statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics, updated by the pacing loop.
#[derive(Debug, Clone, Copy)]
pub struct CycleStats {
    pub cycle_count: u64,
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    pub sum_cycle_ns: i64,
    pub overruns: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
        }
    }

    /// Record one cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
    }

    /// Average cycle time [ns]; 0 before the first cycle.
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Scheduler ──────────────────────────────────────────────────────

/// Owns the HAL and all controllers; runs the canonical tick.
pub struct Scheduler<H: Hal> {
    hal: H,
    config: ControlConfig,

    tick: u32,
    imu_filter: ImuFilter,
    localization: Localization,
    wheels: WheelController,
    head: JointController,
    lift: LiftController,
    grip: GripController,
    steering: SteeringController,
    follower: PathFollower,
    dock: DockingController,
    pickplace: PickPlaceController,
    anim: AnimationController,
    testmode: TestModeController,

    active: ActiveBehavior,
    leds: [Rgba; NUM_LEDS],
    prev_pose: Pose2D,
    faults: RobotFault,
    protocol_errors: u32,
    rx: HVec<u8, RX_BUF_LEN>,

    /// Timing statistics, recorded by the pacing loop.
    pub stats: CycleStats,
}

impl<H: Hal> Scheduler<H> {
    pub fn new(hal: H, config: ControlConfig) -> Self {
        Self {
            hal,
            tick: 0,
            imu_filter: ImuFilter::new(config.imu),
            localization: Localization::new(),
            wheels: WheelController::new(config.wheel),
            head: JointController::new(config.head.0, HEAD_MIN_ANGLE_RAD, HEAD_MAX_ANGLE_RAD),
            lift: LiftController::new(config.lift.0),
            grip: GripController::new(),
            steering: SteeringController::new(),
            follower: PathFollower::new(config.path),
            dock: DockingController::new(config.dock),
            pickplace: PickPlaceController::new(config.pickplace),
            anim: AnimationController::new(),
            testmode: TestModeController::new(),
            active: ActiveBehavior::None,
            leds: [Rgba::OFF; NUM_LEDS],
            prev_pose: Pose2D::default(),
            faults: RobotFault::empty(),
            protocol_errors: 0,
            rx: HVec::new(),
            stats: CycleStats::new(),
            config,
        }
    }

    // ── Introspection ──

    #[inline]
    pub fn pose(&self) -> Pose2D {
        self.localization.pose()
    }

    /// Overwrite the pose (known-landmark sighting); atomic between
    /// ticks.
    pub fn set_pose(&mut self, pose: Pose2D) {
        self.localization.set_pose(pose);
        self.imu_filter.set_heading(pose.heading_rad);
        self.prev_pose = pose;
    }

    #[inline]
    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    #[inline]
    pub fn active(&self) -> ActiveBehavior {
        self.active
    }

    #[inline]
    pub fn faults(&self) -> RobotFault {
        self.faults
    }

    #[inline]
    pub fn protocol_errors(&self) -> u32 {
        self.protocol_errors
    }

    #[inline]
    pub fn hal(&self) -> &H {
        &self.hal
    }

    #[inline]
    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    #[inline]
    pub fn wheels(&self) -> &WheelController {
        &self.wheels
    }

    #[inline]
    pub fn lift(&self) -> &LiftController {
        &self.lift
    }

    #[inline]
    pub fn head(&self) -> &JointController {
        &self.head
    }

    #[inline]
    pub fn follower(&self) -> &PathFollower {
        &self.follower
    }

    #[inline]
    pub fn dock(&self) -> &DockingController {
        &self.dock
    }

    #[inline]
    pub fn pickplace(&self) -> &PickPlaceController {
        &self.pickplace
    }

    /// Current robot-state snapshot (as step 9 would emit it).
    pub fn robot_state(&self) -> RobotStateMsg {
        let pose = self.localization.pose();
        RobotStateMsg {
            tick: self.tick,
            x_mm: pose.x_mm,
            y_mm: pose.y_mm,
            heading_rad: pose.heading_rad,
            left_speed_mmps: self.wheels.state(WheelSide::Left).filtered_speed_mmps,
            right_speed_mmps: self.wheels.state(WheelSide::Right).filtered_speed_mmps,
            lift_height_mm: self.lift.height_mm(),
            head_angle_rad: self.head.angle(),
            gyro_z_radps: self.imu_filter.rate(),
            battery_v: self.hal.battery_voltage(),
            flags: self.faults.bits(),
        }
    }

    // ── The tick ──

    /// Run one control period.
    ///
    /// `commands` is the inbound SPSC ring from the host context (in
    /// addition to the HAL byte pipe); `status` receives snapshots and
    /// events. Either side may be absent.
    pub fn step(
        &mut self,
        mut commands: Option<&mut CommandConsumer<'_>>,
        mut status: Option<&mut StatusProducer<'_>>,
    ) {
        let dt = CONTROL_DT_S;

        // ═══ 1. Read HAL ═══
        self.hal.advance(dt);
        let left_pos = self.hal.motor_position(MotorId::LeftWheel);
        let right_pos = self.hal.motor_position(MotorId::RightWheel);
        let imu = self.hal.imu_read();
        self.pump_host_bytes();

        // ═══ 2. IMU filter ═══
        let left = self.wheels.state(WheelSide::Left);
        let right = self.wheels.state(WheelSide::Right);
        let odo_rate =
            (right.filtered_speed_mmps - left.filtered_speed_mmps) / TRACK_WIDTH_MM;
        let odo_valid = (left.filtered_speed_mmps - left.commanded_speed_mmps).abs()
            < ODO_AGREE_TOL_MMPS
            && (right.filtered_speed_mmps - right.commanded_speed_mmps).abs()
                < ODO_AGREE_TOL_MMPS;
        let heading = self.imu_filter.update(&imu, odo_rate, odo_valid, dt);

        // Transient IMU flags track the current sample.
        self.faults
            .remove(RobotFault::IMU_STALE | RobotFault::IMU_RANGE);
        if self.imu_filter.has_fault() {
            self.faults |= if imu.fresh {
                RobotFault::IMU_RANGE
            } else {
                RobotFault::IMU_STALE
            };
        }
        if !self.hal.faults().is_empty() {
            self.faults |= RobotFault::HAL_PERIPHERAL;
        }

        // ═══ 3. Localization ═══
        self.localization.update(left_pos, right_pos, heading);
        let pose = self.localization.pose();
        let motion_delta = pose.relative_to(self.prev_pose);
        self.prev_pose = pose;

        // ═══ 4. Commands ═══
        let mut events: HVec<Status, EVENTS_PER_TICK> = HVec::new();
        self.dispatch_host_frames();
        if let Some(ref mut rx) = commands {
            while let Some(cmd) = rx.dequeue() {
                self.dispatch(cmd);
            }
        }

        // ═══ 5. Active behavior ═══
        self.step_active(pose, motion_delta, dt, &mut events);

        // ═══ 6. Animation ═══
        let (anim_out, anim_finished) = self.anim.update(self.tick);
        if anim_finished {
            let _ = events.push(Status::ActionCompleted {
                kind: ActionKind::Animation,
                success: true,
                detail: self.anim.tag(),
            });
        }
        let owned = self.anim.owned();
        if let Some((l, r)) = anim_out.wheels {
            self.wheels
                .set_targets(l, r, MAX_WHEEL_ACCEL_MMPS2, MAX_WHEEL_ACCEL_MMPS2);
        }
        if let Some(angle) = anim_out.head {
            self.head.set_target(angle);
        }
        if let Some(angle) = anim_out.lift {
            self.lift.set_angle(angle);
        }
        let mut led_frame = self.leds;
        for (ch, slot) in anim_out.leds.iter().enumerate() {
            if let Some(rgba) = slot {
                led_frame[ch] = *rgba;
            }
        }

        // ═══ 7. Steering ═══
        if !owned.contains(ActuatorMask::WHEELS) {
            if let Some(SteeringEvent::PointTurnComplete) =
                self.steering.update(heading, &mut self.wheels)
            {
                let _ = events.push(Status::ActionCompleted {
                    kind: ActionKind::PointTurn,
                    success: true,
                    detail: 0,
                });
            }
        }

        // ═══ 8. Inner loops ═══
        let (left_power, right_power) = self.wheels.update(left_pos, right_pos, dt);
        self.hal.motor_set_power(MotorId::LeftWheel, left_power);
        self.hal.motor_set_power(MotorId::RightWheel, right_power);

        let head_angle = self.hal.motor_position(MotorId::Head);
        let head_power = self.head.update(head_angle, dt);
        self.hal.motor_set_power(MotorId::Head, head_power);

        let lift_angle = self.hal.motor_position(MotorId::Lift);
        let lift_power = self.lift.update(lift_angle, dt);
        self.hal.motor_set_power(MotorId::Lift, lift_power);

        let grip_power = self.grip.update();
        self.hal.motor_set_power(MotorId::Grip, grip_power);

        if self.wheels.state(WheelSide::Left).stalled {
            self.faults |= RobotFault::LEFT_WHEEL_STALL;
        }
        if self.wheels.state(WheelSide::Right).stalled {
            self.faults |= RobotFault::RIGHT_WHEEL_STALL;
        }
        if self.lift.take_range_flag() {
            self.faults |= RobotFault::LIFT_RANGE;
            warn!("lift target clamped to its hard stops");
        }
        if self.head.take_range_flag() {
            self.faults |= RobotFault::HEAD_RANGE;
            warn!("head target clamped to its hard stops");
        }

        // ═══ 9. Status ═══
        for ch in 0..NUM_LEDS {
            self.hal.set_led(ch, led_frame[ch]);
        }

        if self.tick % self.config.status_divider.max(1) == 0 {
            let _ = events.push(Status::RobotState(self.robot_state()));
        }
        for event in &events {
            if let Ok(frame) = msg::encode_status(event) {
                self.hal.host_send(&frame);
            }
            if let Some(ref mut tx) = status {
                // A full ring drops the snapshot; the supervisor reads
                // a slightly older one.
                let _ = tx.enqueue(*event);
            }
        }

        self.tick = self.tick.wrapping_add(1);
    }

    /// Step 5: run exactly one high-level behavior.
    fn step_active(
        &mut self,
        pose: Pose2D,
        motion_delta: Pose2D,
        dt: f64,
        events: &mut HVec<Status, EVENTS_PER_TICK>,
    ) {
        match self.active {
            ActiveBehavior::None => {}
            ActiveBehavior::TestMode => {
                let Self {
                    wheels,
                    head,
                    lift,
                    grip,
                    steering,
                    follower,
                    pickplace,
                    dock,
                    anim,
                    testmode,
                    leds,
                    ..
                } = self;
                let both_stalled = wheels.both_stalled();
                let mut deps = TestModeDeps {
                    wheels,
                    head,
                    lift,
                    grip,
                    steering,
                    follower,
                    pickplace,
                    dock,
                    anim,
                    leds,
                    pose,
                    motion_delta,
                    both_wheels_stalled: both_stalled,
                };
                if let Some((v1, v2, v3)) = testmode.update(&mut deps, dt) {
                    let _ = events.push(Status::TestModeTelemetry {
                        mode: testmode.mode(),
                        v1,
                        v2,
                        v3,
                    });
                }
                if !testmode.is_active() {
                    self.active = ActiveBehavior::None;
                }
            }
            ActiveBehavior::PickAndPlace => {
                let Self {
                    dock,
                    lift,
                    grip,
                    steering,
                    pickplace,
                    ..
                } = self;
                let mut deps = PickPlaceDeps {
                    dock,
                    lift,
                    grip,
                    steering,
                };
                if let Some(ev) = pickplace.update(pose, motion_delta, &mut deps, dt) {
                    if !ev.success {
                        self.faults |= RobotFault::DOCK_LOST;
                    }
                    let _ = events.push(Status::ActionCompleted {
                        kind: ActionKind::PickAndPlace,
                        success: ev.success,
                        detail: ev.step as u8,
                    });
                    self.active = ActiveBehavior::None;
                }
            }
            ActiveBehavior::Docking => {
                match self.dock.update(motion_delta, &mut self.steering, dt) {
                    Some(DockEvent::Locked) => {
                        let _ = events.push(Status::ActionCompleted {
                            kind: ActionKind::Dock,
                            success: true,
                            detail: 0,
                        });
                        // Stay active and hold the lock until CancelDock.
                    }
                    Some(DockEvent::LostTarget) => {
                        self.faults |= RobotFault::DOCK_LOST;
                        let _ = events.push(Status::ActionCompleted {
                            kind: ActionKind::Dock,
                            success: false,
                            detail: 0,
                        });
                        self.active = ActiveBehavior::None;
                    }
                    None => {}
                }
            }
            ActiveBehavior::PathFollow => {
                let both_stalled = self.wheels.both_stalled();
                match self
                    .follower
                    .update(pose, both_stalled, &mut self.steering, dt)
                {
                    Some(PathEvent::Completed) => {
                        let _ = events.push(Status::ActionCompleted {
                            kind: ActionKind::PathFollow,
                            success: true,
                            detail: 0,
                        });
                        self.active = ActiveBehavior::None;
                    }
                    Some(PathEvent::Aborted) => {
                        self.faults |= RobotFault::PATH_ABORTED;
                        let _ = events.push(Status::ActionCompleted {
                            kind: ActionKind::PathFollow,
                            success: false,
                            detail: 0,
                        });
                        self.active = ActiveBehavior::None;
                    }
                    None => {}
                }
            }
        }
    }

    /// Move inbound host bytes into the frame accumulator (bounded per
    /// tick).
    fn pump_host_bytes(&mut self) {
        let mut buf = [0u8; 64];
        for _ in 0..4 {
            let n = self.hal.host_recv(&mut buf);
            if n == 0 {
                break;
            }
            for &b in &buf[..n] {
                if self.rx.push(b).is_err() {
                    // Accumulator overflow: drop the backlog and count
                    // a protocol error.
                    self.rx.clear();
                    self.protocol_error("rx accumulator overflow");
                    break;
                }
            }
        }
    }

    /// Decode and dispatch every whole frame in the accumulator.
    fn dispatch_host_frames(&mut self) {
        loop {
            let Some((body_range, consumed)) = msg::split_frame(&self.rx)
                .map(|(body, consumed)| {
                    let start = 1;
                    (start..start + body.len(), consumed)
                })
            else {
                break;
            };
            let decoded = msg::decode_command(&self.rx[body_range]);
            // Shift the consumed frame off the front.
            let remaining: HVec<u8, RX_BUF_LEN> =
                self.rx[consumed..].iter().copied().collect();
            self.rx = remaining;
            match decoded {
                Ok(cmd) => self.dispatch(cmd),
                Err(e) => self.protocol_error(&e.to_string()),
            }
        }
    }

    fn protocol_error(&mut self, what: &str) {
        self.protocol_errors = self.protocol_errors.wrapping_add(1);
        self.faults |= RobotFault::PROTOCOL;
        warn!(what, "inbound frame dropped");
    }

    /// Leave whatever high-level behavior is active.
    fn deactivate(&mut self) {
        match self.active {
            ActiveBehavior::None => {}
            ActiveBehavior::TestMode => {
                let Self {
                    wheels,
                    head,
                    lift,
                    grip,
                    steering,
                    follower,
                    pickplace,
                    dock,
                    anim,
                    testmode,
                    leds,
                    prev_pose,
                    ..
                } = self;
                let mut deps = TestModeDeps {
                    wheels,
                    head,
                    lift,
                    grip,
                    steering,
                    follower,
                    pickplace,
                    dock,
                    anim,
                    leds,
                    pose: *prev_pose,
                    motion_delta: Pose2D::default(),
                    both_wheels_stalled: false,
                };
                testmode.stop(&mut deps);
            }
            ActiveBehavior::PickAndPlace => {
                let Self {
                    dock,
                    lift,
                    grip,
                    steering,
                    pickplace,
                    ..
                } = self;
                let mut deps = PickPlaceDeps {
                    dock,
                    lift,
                    grip,
                    steering,
                };
                pickplace.cancel(&mut deps);
            }
            ActiveBehavior::Docking => {
                self.dock.cancel();
                self.steering.stop();
            }
            ActiveBehavior::PathFollow => {
                self.follower.stop_traversal();
                self.steering.stop();
            }
        }
        self.active = ActiveBehavior::None;
    }

    /// Route one supervisor command into its controller.
    pub fn dispatch(&mut self, cmd: Command) {
        debug!(?cmd, "dispatch");
        match cmd {
            Command::DriveWheels {
                left_mmps,
                right_mmps,
                left_accel_mmps2,
                right_accel_mmps2,
            } => {
                self.deactivate();
                if left_mmps.abs() > MAX_WHEEL_SPEED_MMPS
                    || right_mmps.abs() > MAX_WHEEL_SPEED_MMPS
                {
                    self.faults |= RobotFault::SPEED_CLAMP;
                    warn!("wheel speed command clamped");
                }
                self.steering
                    .drive_wheels(left_mmps, right_mmps, left_accel_mmps2, right_accel_mmps2);
            }
            Command::DriveArc {
                speed_mmps,
                curvature_per_mm,
                accel_mmps2,
            } => {
                self.deactivate();
                self.steering
                    .drive_arc(speed_mmps, curvature_per_mm, accel_mmps2);
            }
            Command::PointTurn {
                target_heading_rad,
                angular_vel_radps,
                accel_radps2,
                decel_radps2,
            } => {
                self.deactivate();
                self.steering.point_turn(
                    self.imu_filter.heading(),
                    target_heading_rad,
                    angular_vel_radps,
                    accel_radps2,
                    decel_radps2,
                );
            }
            Command::StartPath => {
                self.deactivate();
                match self.follower.start(&mut self.steering) {
                    Ok(()) => self.active = ActiveBehavior::PathFollow,
                    Err(e) => warn!(%e, "path start rejected"),
                }
            }
            Command::AppendPathSegment(seg) => {
                if self.follower.is_traversing() {
                    warn!("append rejected while traversing");
                } else if let Err(e) = self.follower.append_msg(&seg) {
                    warn!(%e, "path segment rejected");
                }
            }
            Command::ClearPath => {
                if self.active == ActiveBehavior::PathFollow {
                    self.deactivate();
                }
                self.follower.clear();
            }
            Command::SetHeadAngle { angle_rad } => {
                self.head.set_target(angle_rad);
            }
            Command::SetLiftHeight { height_mm } => {
                self.lift.set_height(height_mm);
            }
            Command::StartDock {
                marker_id,
                action: _,
                marker_width_mm: _,
                speed_override_mmps,
            } => {
                self.deactivate();
                self.dock.start(marker_id, speed_override_mmps);
                self.active = ActiveBehavior::Docking;
            }
            Command::CancelDock => {
                if self.active == ActiveBehavior::Docking {
                    self.deactivate();
                } else {
                    self.dock.cancel();
                }
            }
            Command::PickAndPlace {
                marker_id,
                action,
                dx_mm,
                dy_mm,
                dtheta_rad,
            } => {
                self.deactivate();
                self.pickplace
                    .start(marker_id, action, (dx_mm, dy_mm, dtheta_rad), &mut self.dock);
                self.active = ActiveBehavior::PickAndPlace;
            }
            Command::PlayAnimation { id, tag } => {
                if !self.anim.play(id, tag, self.tick) {
                    warn!(id, "unknown animation id");
                }
            }
            Command::StopAnimation => {
                self.anim.stop();
                self.steering.stop();
            }
            Command::SetLed { channel, rgba } => {
                if (channel as usize) < NUM_LEDS {
                    self.leds[channel as usize] = rgba;
                } else {
                    self.protocol_error("led channel out of range");
                }
            }
            Command::StartTestMode { id, p1, p2, p3 } => {
                self.deactivate();
                let Self {
                    wheels,
                    head,
                    lift,
                    grip,
                    steering,
                    follower,
                    pickplace,
                    dock,
                    anim,
                    testmode,
                    leds,
                    prev_pose,
                    ..
                } = self;
                let mut deps = TestModeDeps {
                    wheels,
                    head,
                    lift,
                    grip,
                    steering,
                    follower,
                    pickplace,
                    dock,
                    anim,
                    leds,
                    pose: *prev_pose,
                    motion_delta: Pose2D::default(),
                    both_wheels_stalled: false,
                };
                testmode.start(id, p1, p2, p3, &mut deps);
                self.active = if id == TestModeId::None {
                    ActiveBehavior::None
                } else {
                    ActiveBehavior::TestMode
                };
            }
            Command::Reset => self.reset(),
            Command::MarkerObservation {
                marker_id,
                x_mm,
                y_mm,
                theta_rad,
            } => {
                self.dock.observe(marker_id, x_mm, y_mm, theta_rad);
            }
        }
    }

    /// Full reset: equivalent to boot. Idempotent.
    pub fn reset(&mut self) {
        debug!("scheduler reset");
        self.deactivate();
        self.imu_filter.reset();
        self.localization.reset();
        self.wheels.reset();
        self.head.reset();
        self.lift.reset();
        self.grip.reset();
        self.steering.reset();
        self.follower.clear();
        self.dock.reset();
        self.pickplace.reset();
        self.anim.reset();
        self.testmode.reset();
        self.active = ActiveBehavior::None;
        self.leds = [Rgba::OFF; NUM_LEDS];
        self.prev_pose = Pose2D::default();
        self.faults = RobotFault::empty();
        self.protocol_errors = 0;
        self.rx.clear();
        self.hal.clear_faults();
        for id in [
            MotorId::LeftWheel,
            MotorId::RightWheel,
            MotorId::Lift,
            MotorId::Head,
            MotorId::Grip,
        ] {
            self.hal.motor_set_power(id, 0.0);
            self.hal.motor_reset_position(id);
        }
        for ch in 0..NUM_LEDS {
            self.hal.set_led(ch, Rgba::OFF);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mule_common::msg::DockAction;
    use mule_hal::sim::SimHal;

    fn scheduler() -> Scheduler<SimHal> {
        Scheduler::new(SimHal::default(), ControlConfig::default())
    }

    #[test]
    fn tick_counter_is_monotone() {
        let mut s = scheduler();
        let mut last = s.tick_count();
        for _ in 0..50 {
            s.step(None, None);
            let now = s.tick_count();
            assert!(now.wrapping_sub(last) == 1);
            last = now;
        }
    }

    #[test]
    fn at_most_one_behavior_is_active() {
        let mut s = scheduler();
        s.dispatch(Command::PickAndPlace {
            marker_id: 1,
            action: DockAction::PickupLow,
            dx_mm: 0.0,
            dy_mm: 0.0,
            dtheta_rad: 0.0,
        });
        assert_eq!(s.active(), ActiveBehavior::PickAndPlace);

        s.dispatch(Command::StartDock {
            marker_id: 2,
            action: DockAction::PickupLow,
            marker_width_mm: 25.0,
            speed_override_mmps: 0.0,
        });
        assert_eq!(s.active(), ActiveBehavior::Docking);
        assert!(!s.pickplace().is_active());

        s.dispatch(Command::StartTestMode {
            id: TestModeId::LedCycle,
            p1: 0,
            p2: 0,
            p3: 0,
        });
        assert_eq!(s.active(), ActiveBehavior::TestMode);
        assert!(!s.dock().is_active());
    }

    #[test]
    fn reset_is_idempotent() {
        let mut s = scheduler();
        s.dispatch(Command::SetLiftHeight { height_mm: 90.0 });
        for _ in 0..100 {
            s.step(None, None);
        }
        s.dispatch(Command::Reset);
        let state_once = format!("{:?}", s.robot_state());
        let active_once = s.active();
        s.dispatch(Command::Reset);
        assert_eq!(format!("{:?}", s.robot_state()), state_once);
        assert_eq!(s.active(), active_once);
    }

    #[test]
    fn set_pose_round_trips() {
        let mut s = scheduler();
        s.step(None, None);
        let p = Pose2D::new(250.0, -40.0, 0.4);
        s.set_pose(p);
        assert_eq!(s.pose(), p);
        // One tick of a stationary robot stays put (up to drift).
        s.step(None, None);
        assert!(s.pose().position().distance(p.position()) < 1.0);
    }

    #[test]
    fn commands_flow_through_the_ring() {
        let mut ring = mule_common::link::CommandRing::new();
        let (mut tx, mut rx) = ring.split();
        let mut s = scheduler();
        tx.enqueue(Command::SetHeadAngle { angle_rad: 0.3 }).unwrap();
        s.step(Some(&mut rx), None);
        assert!((s.head().target() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn commands_flow_through_the_host_pipe() {
        let mut s = scheduler();
        let frame =
            msg::encode_command(&Command::SetLiftHeight { height_mm: 58.0 }).unwrap();
        // Split across two writes to exercise reassembly.
        s.hal_mut().supervisor_send(&frame[..2]);
        s.step(None, None);
        s.hal_mut().supervisor_send(&frame[2..]);
        s.step(None, None);
        let expected = crate::lift::angle_for_height(58.0);
        assert!((s.lift().target_angle() - expected).abs() < 1e-9);
    }

    #[test]
    fn malformed_frame_counts_protocol_error() {
        let mut s = scheduler();
        // Valid length byte, unknown tag.
        s.hal_mut().supervisor_send(&[1, 0x7F]);
        s.step(None, None);
        assert_eq!(s.protocol_errors(), 1);
        assert!(s.faults().contains(RobotFault::PROTOCOL));
    }

    #[test]
    fn status_snapshots_reach_the_ring() {
        let mut ring = mule_common::link::StatusRing::new();
        let (mut tx, mut rx) = ring.split();
        let mut s = scheduler();
        s.step(None, Some(&mut tx));
        let got = rx.dequeue().expect("one snapshot per tick");
        match got {
            Status::RobotState(state) => assert_eq!(state.tick, 0),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn status_frames_reach_the_host_pipe() {
        let mut s = scheduler();
        s.step(None, None);
        let mut buf = [0u8; 256];
        let n = s.hal_mut().supervisor_recv(&mut buf);
        assert!(n > 0);
        let (body, _) = msg::split_frame(&buf[..n]).expect("whole frame");
        assert!(matches!(
            msg::decode_status(body),
            Ok(Status::RobotState(_))
        ));
    }

    #[test]
    fn speed_clamp_invariant_holds_under_absurd_commands() {
        let mut s = scheduler();
        s.dispatch(Command::DriveWheels {
            left_mmps: 10_000.0,
            right_mmps: -10_000.0,
            left_accel_mmps2: 0.0,
            right_accel_mmps2: 0.0,
        });
        for _ in 0..100 {
            s.step(None, None);
            let l = s.wheels().state(WheelSide::Left).commanded_speed_mmps;
            let r = s.wheels().state(WheelSide::Right).commanded_speed_mmps;
            assert!(l.abs() <= MAX_WHEEL_SPEED_MMPS);
            assert!(r.abs() <= MAX_WHEEL_SPEED_MMPS);
        }
        assert!(s.faults().contains(RobotFault::SPEED_CLAMP));
    }

    #[test]
    fn joint_clamp_invariant_holds() {
        let mut s = scheduler();
        s.dispatch(Command::SetHeadAngle { angle_rad: 9.0 });
        s.dispatch(Command::SetLiftHeight { height_mm: 900.0 });
        s.step(None, None);
        assert!(s.head().target() <= HEAD_MAX_ANGLE_RAD);
        assert!(s.lift().target_angle() <= mule_common::consts::LIFT_MAX_ANGLE_RAD);
        assert!(s.faults().contains(RobotFault::HEAD_RANGE));
        assert!(s.faults().contains(RobotFault::LIFT_RANGE));
    }

    #[test]
    fn heading_stays_normalized() {
        let mut s = scheduler();
        s.dispatch(Command::DriveWheels {
            left_mmps: -100.0,
            right_mmps: 100.0,
            left_accel_mmps2: 0.0,
            right_accel_mmps2: 0.0,
        });
        for _ in 0..3_000 {
            s.step(None, None);
            let h = s.pose().heading_rad;
            assert!(h > -core::f64::consts::PI && h <= core::f64::consts::PI);
        }
    }

    #[test]
    fn set_led_reports_back_through_hal() {
        let mut s = scheduler();
        s.dispatch(Command::SetLed {
            channel: 1,
            rgba: Rgba::GREEN,
        });
        s.step(None, None);
        assert_eq!(s.hal().led(1), Rgba::GREEN);
    }

    #[test]
    fn path_round_trip_is_boot_equivalent() {
        let mut s = scheduler();
        let boot = format!("{:?}", s.follower());
        s.dispatch(Command::ClearPath);
        s.dispatch(Command::AppendPathSegment(msg::PathSegmentMsg::Line {
            x0_mm: 0.0,
            y0_mm: 0.0,
            x1_mm: 100.0,
            y1_mm: 0.0,
            speed: msg::SpeedSpec {
                target_speed_mmps: 100.0,
                accel_mmps2: 200.0,
                decel_mmps2: 500.0,
            },
        }));
        s.dispatch(Command::StartPath);
        assert_eq!(s.active(), ActiveBehavior::PathFollow);
        s.dispatch(Command::ClearPath);
        assert_eq!(s.active(), ActiveBehavior::None);
        assert_eq!(format!("{:?}", s.follower()), boot);
    }
}
