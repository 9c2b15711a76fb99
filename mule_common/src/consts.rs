//! Calibrated geometric constants and compile-time capacities.
//!
//! Everything here is a calibration value for the MULE mechanism or a
//! fixed-size capacity for the preallocated runtime storage. No constant
//! in this module may be changed at runtime.

// ─── Control timing ─────────────────────────────────────────────────

/// Control period [µs]. One scheduler tick per period.
pub const CONTROL_PERIOD_US: u32 = 5_000;

/// Control period [s].
pub const CONTROL_DT_S: f64 = CONTROL_PERIOD_US as f64 * 1e-6;

/// Control ticks per second.
pub const TICKS_PER_SEC: u32 = 1_000_000 / CONTROL_PERIOD_US;

/// Main executions per long execution (vision hand-off, bulk host I/O).
pub const MAIN_EXECS_PER_LONG_EXEC: u32 = 4;

// ─── Drive geometry ─────────────────────────────────────────────────

/// Drive wheel radius [mm].
pub const WHEEL_RADIUS_MM: f64 = 14.0;

/// Distance between the two tread centerlines [mm].
pub const TRACK_WIDTH_MM: f64 = 46.0;

/// Maximum commandable wheel speed [mm/s]. Commands beyond this clamp.
pub const MAX_WHEEL_SPEED_MMPS: f64 = 220.0;

/// Maximum wheel acceleration used when a command passes 0 [mm/s²].
pub const MAX_WHEEL_ACCEL_MMPS2: f64 = 2_000.0;

// ─── Lift kinematics ────────────────────────────────────────────────
//
// The lift is a parallel four-bar; gripper height follows
// `height = LIFT_PIVOT_HEIGHT_MM + LIFT_ARM_LENGTH_MM · sin(angle)`.

/// Lift arm length from shoulder pivot to gripper pivot [mm].
pub const LIFT_ARM_LENGTH_MM: f64 = 66.0;

/// Height of the lift shoulder pivot above the ground [mm].
pub const LIFT_PIVOT_HEIGHT_MM: f64 = 45.0;

/// Gripper height for docking to an object on the ground [mm].
pub const LIFT_HEIGHT_LOW_DOCK_MM: f64 = 32.0;

/// Gripper height for carrying an object while driving [mm].
pub const LIFT_HEIGHT_CARRY_MM: f64 = 58.0;

/// Gripper height for docking to an object on top of another [mm].
pub const LIFT_HEIGHT_HIGH_DOCK_MM: f64 = 92.0;

/// Lift angle hard stop, low side [rad].
pub const LIFT_MIN_ANGLE_RAD: f64 = -0.30;

/// Lift angle hard stop, high side [rad].
pub const LIFT_MAX_ANGLE_RAD: f64 = 0.86;

/// Maximum lift angular velocity [rad/s].
pub const LIFT_MAX_SPEED_RADPS: f64 = 2.5;

// ─── Head geometry ──────────────────────────────────────────────────

/// Head angle hard stop, low side (looking down) [rad].
pub const HEAD_MIN_ANGLE_RAD: f64 = -0.44;

/// Head angle hard stop, high side (looking up) [rad].
pub const HEAD_MAX_ANGLE_RAD: f64 = 0.78;

/// Maximum head angular velocity [rad/s].
pub const HEAD_MAX_SPEED_RADPS: f64 = 4.0;

/// Forward offset of the camera from the head tilt axis [mm].
pub const HEAD_CAM_OFFSET_MM: f64 = 12.0;

// ─── IMU filter ─────────────────────────────────────────────────────

/// Gyro Z rates below this magnitude are dead-band candidates [rad/s].
pub const GYRO_DEADBAND_RADPS: f64 = 0.012;

/// Rate must stay below the dead-band for this many ticks before
/// integration is suppressed.
pub const GYRO_DEADBAND_TICKS: u32 = 40;

/// Gyro rates beyond this magnitude are treated as invalid samples [rad/s].
pub const GYRO_MAX_VALID_RADPS: f64 = 20.0;

// ─── Gripper ────────────────────────────────────────────────────────

/// Power applied while engaging the gripper.
pub const GRIPPER_ENGAGE_POWER: f64 = -0.5;

/// Power applied while disengaging the gripper.
pub const GRIPPER_DISENGAGE_POWER: f64 = 0.5;

/// Duration of the gripper actuation pulse [ticks] (600 ms).
pub const GRIPPER_PULSE_TICKS: u32 = 120;

// ─── Capacities (preallocated, compile-time) ────────────────────────

/// Maximum number of segments a path can hold.
pub const MAX_PATH_SEGMENTS: usize = 8;

/// Maximum number of keyframes an animation track can hold.
pub const MAX_KEYFRAMES: usize = 16;

/// Number of addressable LED channels.
pub const NUM_LEDS: usize = 4;

/// Command ring capacity (usable slots are capacity − 1).
pub const COMMAND_RING_CAPACITY: usize = 17;

/// Status ring capacity (usable slots are capacity − 1).
pub const STATUS_RING_CAPACITY: usize = 9;

/// Largest wire frame, including length byte and tag [bytes].
pub const MAX_FRAME_LEN: usize = 64;

/// Host byte-pipe capacity, each direction [bytes].
pub const HOST_PIPE_CAPACITY: usize = 1024;
