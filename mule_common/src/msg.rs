//! Supervisor ⇄ robot message framing.
//!
//! A length-prefixed byte stream: each frame is `[len][tag][payload]`,
//! where `len` counts the tag plus payload and every payload is a fixed
//! little-endian struct. Encode and decode never allocate; frames build
//! into a `heapless` buffer sized by [`MAX_FRAME_LEN`].
//!
//! Floats travel as `f32`; the control core computes in `f64` and the
//! conversion happens here, at the wire boundary. Malformed frames decode
//! to a typed [`MsgError`] — the caller drops the frame and bumps the
//! protocol-error counter, per the error-handling contract.

use heapless::Vec;
use static_assertions::const_assert;
use thiserror::Error;

use crate::consts::MAX_FRAME_LEN;
use crate::faults::RobotFault;

// One length byte can address the whole frame body.
const_assert!(MAX_FRAME_LEN <= u8::MAX as usize + 1);

/// Wire frame buffer (length byte + tag + payload).
pub type FrameBuf = Vec<u8, MAX_FRAME_LEN>;

/// Errors produced by the wire codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MsgError {
    /// Tag byte does not name a known message.
    #[error("unknown message tag {0:#04x}")]
    UnknownTag(u8),
    /// Payload shorter than the fixed struct requires.
    #[error("truncated payload: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    /// Encoded frame would exceed [`MAX_FRAME_LEN`].
    #[error("frame overflows the wire buffer")]
    Overflow,
    /// A field value is outside its enumerated range.
    #[error("invalid field value in message {tag:#04x}")]
    InvalidField { tag: u8 },
}

// ─── Wire tags ──────────────────────────────────────────────────────

/// Message tag bytes. Inbound commands occupy 0x01–0x1F, outbound
/// status 0x80–0x9F.
pub mod tag {
    pub const DRIVE_WHEELS: u8 = 0x01;
    pub const DRIVE_ARC: u8 = 0x02;
    pub const POINT_TURN: u8 = 0x03;
    pub const START_PATH: u8 = 0x04;
    pub const APPEND_PATH_SEGMENT: u8 = 0x05;
    pub const CLEAR_PATH: u8 = 0x06;
    pub const SET_HEAD_ANGLE: u8 = 0x07;
    pub const SET_LIFT_HEIGHT: u8 = 0x08;
    pub const START_DOCK: u8 = 0x09;
    pub const CANCEL_DOCK: u8 = 0x0A;
    pub const PICK_AND_PLACE: u8 = 0x0B;
    pub const PLAY_ANIMATION: u8 = 0x0C;
    pub const STOP_ANIMATION: u8 = 0x0D;
    pub const SET_LED: u8 = 0x0E;
    pub const START_TEST_MODE: u8 = 0x0F;
    pub const RESET: u8 = 0x10;
    pub const MARKER_OBSERVATION: u8 = 0x11;

    pub const ROBOT_STATE: u8 = 0x80;
    pub const ACTION_COMPLETED: u8 = 0x81;
    pub const TEST_MODE_TELEMETRY: u8 = 0x82;
}

// ─── Shared wire enums ──────────────────────────────────────────────

/// An LED colour, one byte per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const OFF: Self = Self::new(0, 0, 0, 0);
    pub const RED: Self = Self::new(255, 0, 0, 255);
    pub const GREEN: Self = Self::new(0, 255, 0, 255);
    pub const BLUE: Self = Self::new(0, 0, 255, 255);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Manipulation action requested of docking / pick-and-place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DockAction {
    /// Pick an object off the ground.
    PickupLow = 0,
    /// Pick an object resting on another object.
    PickupHigh = 1,
    /// Place the carried object onto a ground-level target.
    PlaceLow = 2,
    /// Place the carried object on top of an observed object.
    PlaceHigh = 3,
    /// Place at an odometry-relative pose; no vision involved.
    PlaceOnGround = 4,
}

impl DockAction {
    /// Convert from the wire byte. `None` for out-of-range values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::PickupLow),
            1 => Some(Self::PickupHigh),
            2 => Some(Self::PlaceLow),
            3 => Some(Self::PlaceHigh),
            4 => Some(Self::PlaceOnGround),
            _ => None,
        }
    }

    /// True for the actions that deposit an object.
    #[inline]
    pub const fn is_place(&self) -> bool {
        matches!(self, Self::PlaceLow | Self::PlaceHigh | Self::PlaceOnGround)
    }
}

/// Kind field of an `ActionCompleted` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActionKind {
    PathFollow = 0,
    PointTurn = 1,
    Dock = 2,
    PickAndPlace = 3,
    Animation = 4,
    TestMode = 5,
}

impl ActionKind {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::PathFollow),
            1 => Some(Self::PointTurn),
            2 => Some(Self::Dock),
            3 => Some(Self::PickAndPlace),
            4 => Some(Self::Animation),
            5 => Some(Self::TestMode),
            _ => None,
        }
    }
}

/// Diagnostic test mode identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum TestModeId {
    #[default]
    None = 0,
    /// Open/closed-loop wheel ramp. p1 = flag bitset, p2 = power step
    /// [%], p3 = speed [mm/s] or power [%] depending on flags.
    DirectDrive = 1,
    /// Lift sweep between the low and high anchors. p1 = flag bitset,
    /// p2 = power [%] (open-loop variant), p3 = dwell [ticks].
    LiftSweep = 2,
    /// Head sweep between the hard stops. Parameters as for LiftSweep.
    HeadSweep = 3,
    /// In-place rotation against the IMU. p1 = flag bitset (bit 0 =
    /// alternate direction), p2 = angular speed [centirad/s], p3 =
    /// angular accel [centirad/s²].
    ImuTurn = 4,
    /// Cycle LED channels through red/green/blue. p1 = hold [ticks].
    LedCycle = 5,
    /// Canned path-follow demo. p1 = flag bitset (bit 0 = reverse).
    PathFollowDemo = 6,
    /// Pick-and-place demo against a fixed marker id in p1.
    PickPlaceDemo = 7,
}

impl TestModeId {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::DirectDrive),
            2 => Some(Self::LiftSweep),
            3 => Some(Self::HeadSweep),
            4 => Some(Self::ImuTurn),
            5 => Some(Self::LedCycle),
            6 => Some(Self::PathFollowDemo),
            7 => Some(Self::PickPlaceDemo),
            _ => None,
        }
    }
}

// ─── Path segment wire form ─────────────────────────────────────────

/// Speed fields shared by every path segment. The sign of
/// `target_speed_mmps` encodes driving direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSpec {
    pub target_speed_mmps: f64,
    pub accel_mmps2: f64,
    pub decel_mmps2: f64,
}

/// A path segment as it travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegmentMsg {
    Line {
        x0_mm: f64,
        y0_mm: f64,
        x1_mm: f64,
        y1_mm: f64,
        speed: SpeedSpec,
    },
    Arc {
        cx_mm: f64,
        cy_mm: f64,
        radius_mm: f64,
        start_angle_rad: f64,
        sweep_rad: f64,
        speed: SpeedSpec,
    },
    PointTurn {
        target_heading_rad: f64,
        speed: SpeedSpec,
    },
}

const SEGMENT_KIND_LINE: u8 = 0;
const SEGMENT_KIND_ARC: u8 = 1;
const SEGMENT_KIND_POINT_TURN: u8 = 2;

// ─── Inbound commands ───────────────────────────────────────────────

/// A decoded supervisor command (plus the inbound vision observation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    DriveWheels {
        left_mmps: f64,
        right_mmps: f64,
        left_accel_mmps2: f64,
        right_accel_mmps2: f64,
    },
    DriveArc {
        speed_mmps: f64,
        curvature_per_mm: f64,
        accel_mmps2: f64,
    },
    PointTurn {
        target_heading_rad: f64,
        angular_vel_radps: f64,
        accel_radps2: f64,
        decel_radps2: f64,
    },
    StartPath,
    AppendPathSegment(PathSegmentMsg),
    ClearPath,
    SetHeadAngle {
        angle_rad: f64,
    },
    SetLiftHeight {
        height_mm: f64,
    },
    StartDock {
        marker_id: u8,
        action: DockAction,
        marker_width_mm: f64,
        speed_override_mmps: f64,
    },
    CancelDock,
    PickAndPlace {
        marker_id: u8,
        action: DockAction,
        /// Ground-placement pose relative to the robot; ignored for
        /// the vision-guided actions.
        dx_mm: f64,
        dy_mm: f64,
        dtheta_rad: f64,
    },
    PlayAnimation {
        id: u8,
        tag: u8,
    },
    StopAnimation,
    SetLed {
        channel: u8,
        rgba: Rgba,
    },
    StartTestMode {
        id: TestModeId,
        p1: i32,
        p2: i32,
        p3: i32,
    },
    Reset,
    MarkerObservation {
        marker_id: u8,
        x_mm: f64,
        y_mm: f64,
        theta_rad: f64,
    },
}

// ─── Outbound status ────────────────────────────────────────────────

/// Per-tick robot state snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RobotStateMsg {
    pub tick: u32,
    pub x_mm: f64,
    pub y_mm: f64,
    pub heading_rad: f64,
    pub left_speed_mmps: f64,
    pub right_speed_mmps: f64,
    pub lift_height_mm: f64,
    pub head_angle_rad: f64,
    pub gyro_z_radps: f64,
    pub battery_v: f64,
    pub flags: u16,
}

impl RobotStateMsg {
    /// Fault word decoded from the flag field.
    #[inline]
    pub fn faults(&self) -> RobotFault {
        RobotFault::from_bits_truncate(self.flags)
    }
}

/// A decoded robot → supervisor message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    RobotState(RobotStateMsg),
    ActionCompleted {
        kind: ActionKind,
        success: bool,
        /// Action-specific detail; pick-and-place records the failing
        /// step here, zero otherwise.
        detail: u8,
    },
    TestModeTelemetry {
        mode: TestModeId,
        v1: f64,
        v2: f64,
        v3: f64,
    },
}

// ─── Byte-level helpers ─────────────────────────────────────────────

struct Writer<'a> {
    buf: &'a mut FrameBuf,
}

impl<'a> Writer<'a> {
    fn put_u8(&mut self, v: u8) -> Result<(), MsgError> {
        self.buf.push(v).map_err(|_| MsgError::Overflow)
    }

    fn put_u16(&mut self, v: u16) -> Result<(), MsgError> {
        for b in v.to_le_bytes() {
            self.put_u8(b)?;
        }
        Ok(())
    }

    fn put_u32(&mut self, v: u32) -> Result<(), MsgError> {
        for b in v.to_le_bytes() {
            self.put_u8(b)?;
        }
        Ok(())
    }

    fn put_i32(&mut self, v: i32) -> Result<(), MsgError> {
        self.put_u32(v as u32)
    }

    fn put_f32(&mut self, v: f64) -> Result<(), MsgError> {
        self.put_u32((v as f32).to_bits())
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MsgError> {
        if self.pos + n > self.buf.len() {
            return Err(MsgError::Truncated {
                need: self.pos + n,
                have: self.buf.len(),
            });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u8(&mut self) -> Result<u8, MsgError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, MsgError> {
        let s = self.take(2)?;
        Ok(u16::from_le_bytes([s[0], s[1]]))
    }

    fn u32(&mut self) -> Result<u32, MsgError> {
        let s = self.take(4)?;
        Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    fn i32(&mut self) -> Result<i32, MsgError> {
        Ok(self.u32()? as i32)
    }

    fn f32(&mut self) -> Result<f64, MsgError> {
        Ok(f32::from_bits(self.u32()?) as f64)
    }
}

// ─── Framing ────────────────────────────────────────────────────────

/// Split one frame off the front of `stream`.
///
/// Returns the frame body (tag + payload) and the number of stream bytes
/// consumed, or `None` when the stream does not yet hold a whole frame.
pub fn split_frame(stream: &[u8]) -> Option<(&[u8], usize)> {
    let len = *stream.first()? as usize;
    if len == 0 {
        // A zero-length frame carries no tag; swallow the byte.
        return Some((&stream[1..1], 1));
    }
    if stream.len() < 1 + len {
        return None;
    }
    Some((&stream[1..1 + len], 1 + len))
}

fn begin_frame(buf: &mut FrameBuf, tag: u8) -> Result<(), MsgError> {
    // Length byte is patched in finish_frame.
    buf.push(0).map_err(|_| MsgError::Overflow)?;
    buf.push(tag).map_err(|_| MsgError::Overflow)
}

fn finish_frame(buf: &mut FrameBuf) -> Result<(), MsgError> {
    let body_len = buf.len() - 1;
    if body_len > u8::MAX as usize {
        return Err(MsgError::Overflow);
    }
    buf[0] = body_len as u8;
    Ok(())
}

fn put_speed(w: &mut Writer<'_>, s: &SpeedSpec) -> Result<(), MsgError> {
    w.put_f32(s.target_speed_mmps)?;
    w.put_f32(s.accel_mmps2)?;
    w.put_f32(s.decel_mmps2)
}

fn read_speed(r: &mut Reader<'_>) -> Result<SpeedSpec, MsgError> {
    Ok(SpeedSpec {
        target_speed_mmps: r.f32()?,
        accel_mmps2: r.f32()?,
        decel_mmps2: r.f32()?,
    })
}

/// Encode a command into a length-prefixed frame.
pub fn encode_command(cmd: &Command) -> Result<FrameBuf, MsgError> {
    let mut buf = FrameBuf::new();
    {
        let tag_byte = command_tag(cmd);
        begin_frame(&mut buf, tag_byte)?;
        let mut w = Writer { buf: &mut buf };
        match *cmd {
            Command::DriveWheels {
                left_mmps,
                right_mmps,
                left_accel_mmps2,
                right_accel_mmps2,
            } => {
                w.put_f32(left_mmps)?;
                w.put_f32(right_mmps)?;
                w.put_f32(left_accel_mmps2)?;
                w.put_f32(right_accel_mmps2)?;
            }
            Command::DriveArc {
                speed_mmps,
                curvature_per_mm,
                accel_mmps2,
            } => {
                w.put_f32(speed_mmps)?;
                w.put_f32(curvature_per_mm)?;
                w.put_f32(accel_mmps2)?;
            }
            Command::PointTurn {
                target_heading_rad,
                angular_vel_radps,
                accel_radps2,
                decel_radps2,
            } => {
                w.put_f32(target_heading_rad)?;
                w.put_f32(angular_vel_radps)?;
                w.put_f32(accel_radps2)?;
                w.put_f32(decel_radps2)?;
            }
            Command::StartPath | Command::ClearPath | Command::CancelDock
            | Command::StopAnimation | Command::Reset => {}
            Command::AppendPathSegment(ref seg) => match *seg {
                PathSegmentMsg::Line {
                    x0_mm,
                    y0_mm,
                    x1_mm,
                    y1_mm,
                    ref speed,
                } => {
                    w.put_u8(SEGMENT_KIND_LINE)?;
                    put_speed(&mut w, speed)?;
                    w.put_f32(x0_mm)?;
                    w.put_f32(y0_mm)?;
                    w.put_f32(x1_mm)?;
                    w.put_f32(y1_mm)?;
                }
                PathSegmentMsg::Arc {
                    cx_mm,
                    cy_mm,
                    radius_mm,
                    start_angle_rad,
                    sweep_rad,
                    ref speed,
                } => {
                    w.put_u8(SEGMENT_KIND_ARC)?;
                    put_speed(&mut w, speed)?;
                    w.put_f32(cx_mm)?;
                    w.put_f32(cy_mm)?;
                    w.put_f32(radius_mm)?;
                    w.put_f32(start_angle_rad)?;
                    w.put_f32(sweep_rad)?;
                }
                PathSegmentMsg::PointTurn {
                    target_heading_rad,
                    ref speed,
                } => {
                    w.put_u8(SEGMENT_KIND_POINT_TURN)?;
                    put_speed(&mut w, speed)?;
                    w.put_f32(target_heading_rad)?;
                }
            },
            Command::SetHeadAngle { angle_rad } => w.put_f32(angle_rad)?,
            Command::SetLiftHeight { height_mm } => w.put_f32(height_mm)?,
            Command::StartDock {
                marker_id,
                action,
                marker_width_mm,
                speed_override_mmps,
            } => {
                w.put_u8(marker_id)?;
                w.put_u8(action as u8)?;
                w.put_f32(marker_width_mm)?;
                w.put_f32(speed_override_mmps)?;
            }
            Command::PickAndPlace {
                marker_id,
                action,
                dx_mm,
                dy_mm,
                dtheta_rad,
            } => {
                w.put_u8(marker_id)?;
                w.put_u8(action as u8)?;
                w.put_f32(dx_mm)?;
                w.put_f32(dy_mm)?;
                w.put_f32(dtheta_rad)?;
            }
            Command::PlayAnimation { id, tag } => {
                w.put_u8(id)?;
                w.put_u8(tag)?;
            }
            Command::SetLed { channel, rgba } => {
                w.put_u8(channel)?;
                w.put_u8(rgba.r)?;
                w.put_u8(rgba.g)?;
                w.put_u8(rgba.b)?;
                w.put_u8(rgba.a)?;
            }
            Command::StartTestMode { id, p1, p2, p3 } => {
                w.put_u8(id as u8)?;
                w.put_i32(p1)?;
                w.put_i32(p2)?;
                w.put_i32(p3)?;
            }
            Command::MarkerObservation {
                marker_id,
                x_mm,
                y_mm,
                theta_rad,
            } => {
                w.put_u8(marker_id)?;
                w.put_f32(x_mm)?;
                w.put_f32(y_mm)?;
                w.put_f32(theta_rad)?;
            }
        }
    }
    finish_frame(&mut buf)?;
    Ok(buf)
}

const fn command_tag(cmd: &Command) -> u8 {
    match cmd {
        Command::DriveWheels { .. } => tag::DRIVE_WHEELS,
        Command::DriveArc { .. } => tag::DRIVE_ARC,
        Command::PointTurn { .. } => tag::POINT_TURN,
        Command::StartPath => tag::START_PATH,
        Command::AppendPathSegment(_) => tag::APPEND_PATH_SEGMENT,
        Command::ClearPath => tag::CLEAR_PATH,
        Command::SetHeadAngle { .. } => tag::SET_HEAD_ANGLE,
        Command::SetLiftHeight { .. } => tag::SET_LIFT_HEIGHT,
        Command::StartDock { .. } => tag::START_DOCK,
        Command::CancelDock => tag::CANCEL_DOCK,
        Command::PickAndPlace { .. } => tag::PICK_AND_PLACE,
        Command::PlayAnimation { .. } => tag::PLAY_ANIMATION,
        Command::StopAnimation => tag::STOP_ANIMATION,
        Command::SetLed { .. } => tag::SET_LED,
        Command::StartTestMode { .. } => tag::START_TEST_MODE,
        Command::Reset => tag::RESET,
        Command::MarkerObservation { .. } => tag::MARKER_OBSERVATION,
    }
}

/// Decode a command from a frame body (tag + payload).
pub fn decode_command(body: &[u8]) -> Result<Command, MsgError> {
    let mut r = Reader::new(body);
    let t = r.u8()?;
    let cmd = match t {
        tag::DRIVE_WHEELS => Command::DriveWheels {
            left_mmps: r.f32()?,
            right_mmps: r.f32()?,
            left_accel_mmps2: r.f32()?,
            right_accel_mmps2: r.f32()?,
        },
        tag::DRIVE_ARC => Command::DriveArc {
            speed_mmps: r.f32()?,
            curvature_per_mm: r.f32()?,
            accel_mmps2: r.f32()?,
        },
        tag::POINT_TURN => Command::PointTurn {
            target_heading_rad: r.f32()?,
            angular_vel_radps: r.f32()?,
            accel_radps2: r.f32()?,
            decel_radps2: r.f32()?,
        },
        tag::START_PATH => Command::StartPath,
        tag::APPEND_PATH_SEGMENT => {
            let kind = r.u8()?;
            let speed = read_speed(&mut r)?;
            let seg = match kind {
                SEGMENT_KIND_LINE => PathSegmentMsg::Line {
                    x0_mm: r.f32()?,
                    y0_mm: r.f32()?,
                    x1_mm: r.f32()?,
                    y1_mm: r.f32()?,
                    speed,
                },
                SEGMENT_KIND_ARC => PathSegmentMsg::Arc {
                    cx_mm: r.f32()?,
                    cy_mm: r.f32()?,
                    radius_mm: r.f32()?,
                    start_angle_rad: r.f32()?,
                    sweep_rad: r.f32()?,
                    speed,
                },
                SEGMENT_KIND_POINT_TURN => PathSegmentMsg::PointTurn {
                    target_heading_rad: r.f32()?,
                    speed,
                },
                _ => return Err(MsgError::InvalidField { tag: t }),
            };
            Command::AppendPathSegment(seg)
        }
        tag::CLEAR_PATH => Command::ClearPath,
        tag::SET_HEAD_ANGLE => Command::SetHeadAngle { angle_rad: r.f32()? },
        tag::SET_LIFT_HEIGHT => Command::SetLiftHeight { height_mm: r.f32()? },
        tag::START_DOCK => Command::StartDock {
            marker_id: r.u8()?,
            action: DockAction::from_u8(r.u8()?).ok_or(MsgError::InvalidField { tag: t })?,
            marker_width_mm: r.f32()?,
            speed_override_mmps: r.f32()?,
        },
        tag::CANCEL_DOCK => Command::CancelDock,
        tag::PICK_AND_PLACE => Command::PickAndPlace {
            marker_id: r.u8()?,
            action: DockAction::from_u8(r.u8()?).ok_or(MsgError::InvalidField { tag: t })?,
            dx_mm: r.f32()?,
            dy_mm: r.f32()?,
            dtheta_rad: r.f32()?,
        },
        tag::PLAY_ANIMATION => Command::PlayAnimation {
            id: r.u8()?,
            tag: r.u8()?,
        },
        tag::STOP_ANIMATION => Command::StopAnimation,
        tag::SET_LED => Command::SetLed {
            channel: r.u8()?,
            rgba: Rgba::new(r.u8()?, r.u8()?, r.u8()?, r.u8()?),
        },
        tag::START_TEST_MODE => Command::StartTestMode {
            id: TestModeId::from_u8(r.u8()?).ok_or(MsgError::InvalidField { tag: t })?,
            p1: r.i32()?,
            p2: r.i32()?,
            p3: r.i32()?,
        },
        tag::RESET => Command::Reset,
        tag::MARKER_OBSERVATION => Command::MarkerObservation {
            marker_id: r.u8()?,
            x_mm: r.f32()?,
            y_mm: r.f32()?,
            theta_rad: r.f32()?,
        },
        other => return Err(MsgError::UnknownTag(other)),
    };
    Ok(cmd)
}

/// Encode a status message into a length-prefixed frame.
pub fn encode_status(status: &Status) -> Result<FrameBuf, MsgError> {
    let mut buf = FrameBuf::new();
    {
        let tag_byte = match status {
            Status::RobotState(_) => tag::ROBOT_STATE,
            Status::ActionCompleted { .. } => tag::ACTION_COMPLETED,
            Status::TestModeTelemetry { .. } => tag::TEST_MODE_TELEMETRY,
        };
        begin_frame(&mut buf, tag_byte)?;
        let mut w = Writer { buf: &mut buf };
        match *status {
            Status::RobotState(ref s) => {
                w.put_u32(s.tick)?;
                w.put_f32(s.x_mm)?;
                w.put_f32(s.y_mm)?;
                w.put_f32(s.heading_rad)?;
                w.put_f32(s.left_speed_mmps)?;
                w.put_f32(s.right_speed_mmps)?;
                w.put_f32(s.lift_height_mm)?;
                w.put_f32(s.head_angle_rad)?;
                w.put_f32(s.gyro_z_radps)?;
                w.put_f32(s.battery_v)?;
                w.put_u16(s.flags)?;
            }
            Status::ActionCompleted {
                kind,
                success,
                detail,
            } => {
                w.put_u8(kind as u8)?;
                w.put_u8(success as u8)?;
                w.put_u8(detail)?;
            }
            Status::TestModeTelemetry { mode, v1, v2, v3 } => {
                w.put_u8(mode as u8)?;
                w.put_f32(v1)?;
                w.put_f32(v2)?;
                w.put_f32(v3)?;
            }
        }
    }
    finish_frame(&mut buf)?;
    Ok(buf)
}

/// Decode a status message from a frame body (tag + payload).
pub fn decode_status(body: &[u8]) -> Result<Status, MsgError> {
    let mut r = Reader::new(body);
    let t = r.u8()?;
    let status = match t {
        tag::ROBOT_STATE => Status::RobotState(RobotStateMsg {
            tick: r.u32()?,
            x_mm: r.f32()?,
            y_mm: r.f32()?,
            heading_rad: r.f32()?,
            left_speed_mmps: r.f32()?,
            right_speed_mmps: r.f32()?,
            lift_height_mm: r.f32()?,
            head_angle_rad: r.f32()?,
            gyro_z_radps: r.f32()?,
            battery_v: r.f32()?,
            flags: r.u16()?,
        }),
        tag::ACTION_COMPLETED => Status::ActionCompleted {
            kind: ActionKind::from_u8(r.u8()?).ok_or(MsgError::InvalidField { tag: t })?,
            success: r.u8()? != 0,
            detail: r.u8()?,
        },
        tag::TEST_MODE_TELEMETRY => Status::TestModeTelemetry {
            mode: TestModeId::from_u8(r.u8()?).ok_or(MsgError::InvalidField { tag: t })?,
            v1: r.f32()?,
            v2: r.f32()?,
            v3: r.f32()?,
        },
        other => return Err(MsgError::UnknownTag(other)),
    };
    Ok(status)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(cmd: Command) {
        let frame = encode_command(&cmd).unwrap();
        let (body, consumed) = split_frame(&frame).unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(decode_command(body).unwrap(), cmd);
    }

    #[test]
    fn drive_wheels_round_trip() {
        round_trip(Command::DriveWheels {
            left_mmps: 120.0,
            right_mmps: -80.0,
            left_accel_mmps2: 200.0,
            right_accel_mmps2: 200.0,
        });
    }

    #[test]
    fn tagless_commands_round_trip() {
        for cmd in [
            Command::StartPath,
            Command::ClearPath,
            Command::CancelDock,
            Command::StopAnimation,
            Command::Reset,
        ] {
            round_trip(cmd);
        }
    }

    #[test]
    fn segment_variants_round_trip() {
        let speed = SpeedSpec {
            target_speed_mmps: -100.0,
            accel_mmps2: 200.0,
            decel_mmps2: 500.0,
        };
        round_trip(Command::AppendPathSegment(PathSegmentMsg::Line {
            x0_mm: 0.0,
            y0_mm: 0.0,
            x1_mm: 300.0,
            y1_mm: 0.0,
            speed,
        }));
        round_trip(Command::AppendPathSegment(PathSegmentMsg::Arc {
            cx_mm: 100.0,
            cy_mm: 50.0,
            radius_mm: 40.0,
            start_angle_rad: 0.5,
            sweep_rad: -1.0,
            speed,
        }));
        round_trip(Command::AppendPathSegment(PathSegmentMsg::PointTurn {
            target_heading_rad: 1.57,
            speed,
        }));
    }

    #[test]
    fn dock_and_pick_round_trip() {
        round_trip(Command::StartDock {
            marker_id: 3,
            action: DockAction::PickupHigh,
            marker_width_mm: 25.0,
            speed_override_mmps: 0.0,
        });
        round_trip(Command::PickAndPlace {
            marker_id: 3,
            action: DockAction::PlaceOnGround,
            dx_mm: 100.0,
            dy_mm: -10.0,
            dtheta_rad: 0.0,
        });
    }

    #[test]
    fn test_mode_round_trip() {
        round_trip(Command::StartTestMode {
            id: TestModeId::DirectDrive,
            p1: 0b101,
            p2: 10,
            p3: -60,
        });
    }

    #[test]
    fn status_round_trips() {
        let state = Status::RobotState(RobotStateMsg {
            tick: 12_345,
            x_mm: 250.5,
            y_mm: -3.25,
            heading_rad: 0.05,
            left_speed_mmps: 99.5,
            right_speed_mmps: 100.5,
            lift_height_mm: 58.0,
            head_angle_rad: 0.1,
            gyro_z_radps: 0.01,
            battery_v: 4.05,
            flags: RobotFault::LEFT_WHEEL_STALL.bits(),
        });
        let frame = encode_status(&state).unwrap();
        let (body, _) = split_frame(&frame).unwrap();
        let decoded = decode_status(body).unwrap();
        if let Status::RobotState(s) = decoded {
            assert_eq!(s.tick, 12_345);
            assert!(s.faults().contains(RobotFault::LEFT_WHEEL_STALL));
        } else {
            panic!("wrong variant");
        }

        let done = Status::ActionCompleted {
            kind: ActionKind::PathFollow,
            success: true,
            detail: 0,
        };
        let frame = encode_status(&done).unwrap();
        let (body, _) = split_frame(&frame).unwrap();
        assert_eq!(decode_status(body).unwrap(), done);
    }

    #[test]
    fn unknown_tag_rejected() {
        assert_eq!(decode_command(&[0x7F]), Err(MsgError::UnknownTag(0x7F)));
    }

    #[test]
    fn truncated_payload_rejected() {
        let frame = encode_command(&Command::SetLiftHeight { height_mm: 58.0 }).unwrap();
        let (body, _) = split_frame(&frame).unwrap();
        let short = &body[..body.len() - 1];
        assert!(matches!(
            decode_command(short),
            Err(MsgError::Truncated { .. })
        ));
    }

    #[test]
    fn invalid_enum_field_rejected() {
        // StartDock with action byte 9.
        let body = [tag::START_DOCK, 1, 9, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            decode_command(&body),
            Err(MsgError::InvalidField { .. })
        ));
    }

    #[test]
    fn split_frame_waits_for_whole_frame() {
        let frame = encode_command(&Command::Reset).unwrap();
        assert!(split_frame(&frame[..1]).is_none());
        assert!(split_frame(&[]).is_none());
    }

    #[test]
    fn split_frame_skips_zero_length() {
        let (body, consumed) = split_frame(&[0u8, 0x10]).unwrap();
        assert!(body.is_empty());
        assert_eq!(consumed, 1);
    }
}
