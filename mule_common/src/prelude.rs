//! Prelude module for common re-exports.
//!
//! `use mule_common::prelude::*;` pulls in the types nearly every
//! consumer needs without listing individual paths.

// ─── Math ───────────────────────────────────────────────────────────
pub use crate::math::{Pose2D, Vec2, angle_diff, normalize_angle};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{CONTROL_DT_S, MAX_PATH_SEGMENTS, TICKS_PER_SEC};

// ─── Faults ─────────────────────────────────────────────────────────
pub use crate::faults::RobotFault;

// ─── Wire protocol ──────────────────────────────────────────────────
pub use crate::msg::{
    ActionKind, Command, DockAction, MsgError, PathSegmentMsg, Rgba, RobotStateMsg, SpeedSpec,
    Status, TestModeId,
};

// ─── Host link ──────────────────────────────────────────────────────
pub use crate::link::{CommandConsumer, CommandProducer, CommandRing, StatusProducer, StatusRing};
