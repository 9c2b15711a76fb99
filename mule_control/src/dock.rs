//! Docking: close the loop on a dock-pose error to approach a marker.
//!
//! The target pose lives in the robot frame `(x ahead, y left, θ)` and
//! is updated asynchronously by vision. Between observations — and for
//! the odometry-only target used by ground placement — the pose is
//! extrapolated from the robot's own motion. The steering intent is a
//! proportional-plus-integral correction on the transverse error (y, θ)
//! riding on a forward speed that decays linearly as x closes on the
//! stop distance.
//!
//! A vision observation older than the freshness window is only
//! extrapolated; past the lost window the controller gives up, commands
//! zero, and reports `LostTarget`.

use mule_common::consts::TRACK_WIDTH_MM;
use mule_common::math::Pose2D;

use crate::config::DockConfig;
use crate::steering::SteeringController;

/// Where the dock target comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockSource {
    /// Marker observations from the vision collaborator; subject to
    /// the freshness and lost windows.
    Vision,
    /// A pose seeded once and dead-reckoned; never goes stale.
    Odometry,
}

/// Docking controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DockState {
    #[default]
    Inactive,
    /// Driving the error down.
    Approaching,
    /// Errors inside the lock windows at the stop distance.
    Locked,
    /// Vision went stale past the lost window.
    LostTarget,
}

/// Events the docking controller reports to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockEvent {
    Locked,
    LostTarget,
}

/// Vision-servoed approach controller.
#[derive(Debug, Clone)]
pub struct DockingController {
    config: DockConfig,
    state: DockState,
    source: DockSource,
    marker_id: u8,
    /// Dock pose in the robot frame; valid while a target is held.
    target: Option<Pose2D>,
    /// Ticks since the last vision observation.
    obs_age_ticks: u32,
    integral_y: f64,
    lock_ticks: u32,
    speed_override_mmps: f64,
}

impl DockingController {
    pub fn new(config: DockConfig) -> Self {
        Self {
            config,
            state: DockState::Inactive,
            source: DockSource::Vision,
            marker_id: 0,
            target: None,
            obs_age_ticks: 0,
            integral_y: 0.0,
            lock_ticks: 0,
            speed_override_mmps: 0.0,
        }
    }

    /// Begin a vision-guided approach to `marker_id`.
    pub fn start(&mut self, marker_id: u8, speed_override_mmps: f64) {
        self.state = DockState::Approaching;
        self.source = DockSource::Vision;
        self.marker_id = marker_id;
        self.target = None;
        self.obs_age_ticks = 0;
        self.integral_y = 0.0;
        self.lock_ticks = 0;
        self.speed_override_mmps = speed_override_mmps;
    }

    /// Begin an odometry-only approach to a robot-relative pose.
    pub fn start_relative(&mut self, x_mm: f64, y_mm: f64, theta_rad: f64) {
        self.start(0, 0.0);
        self.source = DockSource::Odometry;
        self.target = Some(Pose2D::new(x_mm, y_mm, theta_rad));
    }

    /// Accept a vision observation. Ignored unless an approach to this
    /// marker is active.
    pub fn observe(&mut self, marker_id: u8, x_mm: f64, y_mm: f64, theta_rad: f64) {
        if self.source != DockSource::Vision || marker_id != self.marker_id {
            return;
        }
        if matches!(self.state, DockState::Approaching | DockState::LostTarget) {
            self.target = Some(Pose2D::new(x_mm, y_mm, theta_rad));
            self.obs_age_ticks = 0;
            if self.state == DockState::LostTarget {
                self.state = DockState::Approaching;
            }
        }
    }

    /// Cancel the approach and drop the target.
    pub fn cancel(&mut self) {
        self.state = DockState::Inactive;
        self.target = None;
    }

    #[inline]
    pub fn state(&self) -> DockState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.state, DockState::Approaching | DockState::Locked)
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state == DockState::Locked
    }

    /// True once a target pose is held (seen or seeded).
    #[inline]
    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Current robot-frame dock pose, while one is held.
    #[inline]
    pub fn target(&self) -> Option<Pose2D> {
        self.target
    }

    /// Run one tick.
    ///
    /// `motion_delta` is the robot's displacement this tick, expressed
    /// in the previous tick's robot frame; it dead-reckons the target
    /// between observations.
    pub fn update(
        &mut self,
        motion_delta: Pose2D,
        steering: &mut SteeringController,
        dt_s: f64,
    ) -> Option<DockEvent> {
        if !matches!(self.state, DockState::Approaching | DockState::Locked) {
            return None;
        }

        // Dead-reckon the target through our own motion.
        if let Some(target) = self.target {
            self.target = Some(target.relative_to(motion_delta));
        }

        if self.source == DockSource::Vision && self.state == DockState::Approaching {
            self.obs_age_ticks = self.obs_age_ticks.saturating_add(1);
            if self.obs_age_ticks > self.config.lost_window_ticks {
                self.state = DockState::LostTarget;
                self.target = None;
                steering.stop();
                return Some(DockEvent::LostTarget);
            }
        }

        let Some(target) = self.target else {
            // Vision approach that has not seen the marker yet: hold
            // still and wait.
            steering.drive_arc(0.0, 0.0, 0.0);
            return None;
        };

        let x = target.x_mm;
        let y = target.y_mm;
        let theta = target.heading_rad;

        // Lock detection: transverse errors inside their windows while
        // the remaining approach distance is gone.
        if x <= self.config.stop_distance_mm
            && y.abs() <= self.config.lock_y_tol_mm
            && theta.abs() <= self.config.lock_theta_tol_rad
        {
            self.lock_ticks = self.lock_ticks.saturating_add(1);
            if self.lock_ticks >= self.config.lock_dwell_ticks && self.state != DockState::Locked {
                self.state = DockState::Locked;
                steering.drive_arc(0.0, 0.0, 0.0);
                return Some(DockEvent::Locked);
            }
        } else {
            self.lock_ticks = 0;
        }

        if self.state == DockState::Locked {
            steering.drive_arc(0.0, 0.0, 0.0);
            return None;
        }

        // Forward speed decays linearly over the slow-down zone and
        // stops at the stop distance.
        let nominal = if self.speed_override_mmps > 0.0 {
            self.speed_override_mmps
        } else {
            self.config.approach_speed_mmps
        };
        let remaining = x - self.config.stop_distance_mm;
        if remaining <= 0.0 {
            // At the stop distance: align in place until the angular
            // error is inside the lock window.
            let omega = (2.0 * theta).clamp(-0.5, 0.5);
            let half = omega * TRACK_WIDTH_MM * 0.5;
            steering.drive_wheels(-half, half, 0.0, 0.0);
            return None;
        }
        let scale = (remaining / self.config.slow_distance_mm).min(1.0);
        let speed = (nominal * scale).max(10.0);

        // P+I on the transverse error.
        self.integral_y += y * dt_s;
        let limit = self.config.max_correction / self.config.ki_y.max(1e-9);
        self.integral_y = self.integral_y.clamp(-limit, limit);
        let curvature = (self.config.ky * y
            + self.config.ktheta * theta.clamp(-0.5, 0.5)
            + self.config.ki_y * self.integral_y)
            .clamp(-self.config.max_correction, self.config.max_correction);

        steering.drive_arc(speed, curvature, 0.0);
        None
    }

    /// Return to the boot state.
    pub fn reset(&mut self) {
        let config = self.config;
        *self = Self::new(config);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
