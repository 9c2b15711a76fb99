//! Fault bitflags carried in every `RobotState` status packet.
//!
//! Transient flags clear on their own when the sensor recovers; sticky
//! flags persist until the supervisor issues `Reset`.

use bitflags::bitflags;

bitflags! {
    /// Robot-level fault word.
    ///
    /// Transient: IMU_STALE, IMU_RANGE. Everything else is sticky.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RobotFault: u16 {
        /// IMU sample missing or repeated this tick.
        const IMU_STALE          = 0x0001;
        /// IMU rate outside the plausible range.
        const IMU_RANGE          = 0x0002;
        /// Left wheel stalled (commanded power without motion).
        const LEFT_WHEEL_STALL   = 0x0004;
        /// Right wheel stalled.
        const RIGHT_WHEEL_STALL  = 0x0008;
        /// Lift target clamped to its hard stops.
        const LIFT_RANGE         = 0x0010;
        /// Head target clamped to its hard stops.
        const HEAD_RANGE         = 0x0020;
        /// Wheel speed command clamped to the maximum.
        const SPEED_CLAMP        = 0x0040;
        /// Malformed inbound frame dropped.
        const PROTOCOL           = 0x0080;
        /// Docking target lost (observation too stale).
        const DOCK_LOST          = 0x0100;
        /// Path traversal aborted (stall mid-segment).
        const PATH_ABORTED       = 0x0200;
        /// Peripheral fault latched by the HAL.
        const HAL_PERIPHERAL     = 0x0400;
    }
}

impl RobotFault {
    /// Mask of flags that clear automatically when the sensor recovers.
    pub const TRANSIENT_MASK: Self =
        Self::from_bits_truncate(Self::IMU_STALE.bits() | Self::IMU_RANGE.bits());

    /// True if any sticky (non-transient) flag is raised.
    #[inline]
    pub const fn has_sticky(&self) -> bool {
        self.intersects(Self::TRANSIENT_MASK.complement())
    }
}

impl Default for RobotFault {
    fn default() -> Self {
        Self::empty()
    }
}
