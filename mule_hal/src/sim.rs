//! Physics simulation backend.
//!
//! `SimHal` stands in for the real peripherals in tests and on the
//! desktop: each motor is a first-order lag toward its free speed, the
//! body follows differential-drive kinematics from the two wheel speeds,
//! and the gyro reads the body's true yaw rate. Joint motors clamp at
//! mechanical stops slightly beyond the software limits.
//!
//! Test hooks (`set_motor_blocked`, `fail_imu_for`, the supervisor side
//! of the host pipe, `true_pose`) let the suites inject faults and check
//! ground truth without reaching into the controllers.

use heapless::Deque;
use tracing::debug;

use mule_common::consts::{
    HEAD_MAX_ANGLE_RAD, HEAD_MIN_ANGLE_RAD, HOST_PIPE_CAPACITY, LIFT_MAX_ANGLE_RAD,
    LIFT_MIN_ANGLE_RAD, NUM_LEDS, TRACK_WIDTH_MM, WHEEL_RADIUS_MM,
};
use mule_common::math::Pose2D;
use mule_common::msg::Rgba;

use crate::{Hal, HalFault, ImuSample, MOTOR_COUNT, MotorId};

/// Mechanical overtravel beyond the software joint limits [rad].
const JOINT_OVERTRAVEL_RAD: f64 = 0.03;

/// Gravity along the IMU z axis [mm/s²].
const GRAVITY_MMPS2: f64 = 9_810.0;

/// Tunable physical parameters of the simulated mechanism.
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    /// Motor first-order time constant [s].
    pub motor_tau_s: f64,
    /// Wheel shaft speed at full power [rad/s].
    pub wheel_free_speed_radps: f64,
    /// Lift shaft speed at full power [rad/s].
    pub lift_free_speed_radps: f64,
    /// Head shaft speed at full power [rad/s].
    pub head_free_speed_radps: f64,
    /// Gripper shaft speed at full power [rad/s].
    pub grip_free_speed_radps: f64,
    /// Constant gyro Z bias [rad/s].
    pub gyro_bias_radps: f64,
    /// Nominal battery voltage [V].
    pub battery_v: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            motor_tau_s: 0.04,
            wheel_free_speed_radps: 18.0,
            lift_free_speed_radps: 3.8,
            head_free_speed_radps: 5.0,
            grip_free_speed_radps: 2.0,
            gyro_bias_radps: 0.0,
            battery_v: 4.10,
        }
    }
}

/// Simulated peripheral backend.
pub struct SimHal {
    config: SimConfig,

    power: [f64; MOTOR_COUNT],
    speed: [f64; MOTOR_COUNT],
    position: [f64; MOTOR_COUNT],
    blocked: [bool; MOTOR_COUNT],

    /// Ground-truth body pose.
    true_pose: Pose2D,
    /// Ground-truth yaw rate this tick [rad/s].
    yaw_rate_radps: f64,

    leds: [Rgba; NUM_LEDS],
    micro: u64,

    imu_outage_ticks: u32,
    last_imu: ImuSample,

    faults: HalFault,

    to_host: Deque<u8, HOST_PIPE_CAPACITY>,
    from_host: Deque<u8, HOST_PIPE_CAPACITY>,
}

impl SimHal {
    /// Create a simulator at the mat origin.
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            power: [0.0; MOTOR_COUNT],
            speed: [0.0; MOTOR_COUNT],
            position: [0.0; MOTOR_COUNT],
            blocked: [false; MOTOR_COUNT],
            true_pose: Pose2D::default(),
            yaw_rate_radps: 0.0,
            leds: [Rgba::OFF; NUM_LEDS],
            micro: 0,
            imu_outage_ticks: 0,
            last_imu: ImuSample {
                acc_mmps2: [0.0, 0.0, GRAVITY_MMPS2],
                temperature_degc: 30.0,
                fresh: true,
                ..ImuSample::default()
            },
            faults: HalFault::empty(),
            to_host: Deque::new(),
            from_host: Deque::new(),
        }
    }

    fn free_speed(&self, id: usize) -> f64 {
        match id {
            0 | 1 => self.config.wheel_free_speed_radps,
            2 => self.config.lift_free_speed_radps,
            3 => self.config.head_free_speed_radps,
            _ => self.config.grip_free_speed_radps,
        }
    }

    // ── Test hooks ──

    /// Freeze one motor shaft (simulated stall) regardless of power.
    pub fn set_motor_blocked(&mut self, id: MotorId, blocked: bool) {
        self.blocked[id as usize] = blocked;
    }

    /// Suppress fresh IMU samples for the next `ticks` reads.
    pub fn fail_imu_for(&mut self, ticks: u32) {
        self.imu_outage_ticks = ticks;
    }

    /// Ground-truth body pose.
    pub fn true_pose(&self) -> Pose2D {
        self.true_pose
    }

    /// Push bytes into the robot's inbound host pipe (supervisor side).
    pub fn supervisor_send(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.from_host.push_back(b).is_err() {
                self.faults |= HalFault::HOST_PIPE;
                debug!("sim host pipe overflow (supervisor → robot)");
                break;
            }
        }
    }

    /// Drain bytes the robot sent toward the supervisor.
    pub fn supervisor_recv(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.to_host.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

impl Default for SimHal {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Hal for SimHal {
    fn advance(&mut self, dt_s: f64) {
        if dt_s <= 0.0 {
            return;
        }
        let alpha = dt_s / (self.config.motor_tau_s + dt_s);

        for i in 0..MOTOR_COUNT {
            if self.blocked[i] {
                self.speed[i] = 0.0;
                continue;
            }
            let target = self.power[i] * self.free_speed(i);
            self.speed[i] += alpha * (target - self.speed[i]);
            self.position[i] += self.speed[i] * dt_s;
        }

        // Joint motors stop mechanically a little beyond the software
        // limits.
        for (idx, lo, hi) in [
            (
                MotorId::Lift as usize,
                LIFT_MIN_ANGLE_RAD - JOINT_OVERTRAVEL_RAD,
                LIFT_MAX_ANGLE_RAD + JOINT_OVERTRAVEL_RAD,
            ),
            (
                MotorId::Head as usize,
                HEAD_MIN_ANGLE_RAD - JOINT_OVERTRAVEL_RAD,
                HEAD_MAX_ANGLE_RAD + JOINT_OVERTRAVEL_RAD,
            ),
        ] {
            if self.position[idx] < lo {
                self.position[idx] = lo;
                self.speed[idx] = 0.0;
            } else if self.position[idx] > hi {
                self.position[idx] = hi;
                self.speed[idx] = 0.0;
            }
        }

        // Differential-drive body kinematics.
        let v_left = self.speed[MotorId::LeftWheel as usize] * WHEEL_RADIUS_MM;
        let v_right = self.speed[MotorId::RightWheel as usize] * WHEEL_RADIUS_MM;
        let forward = 0.5 * (v_left + v_right);
        self.yaw_rate_radps = (v_right - v_left) / TRACK_WIDTH_MM;

        let heading = self.true_pose.heading_rad + self.yaw_rate_radps * dt_s;
        self.true_pose = Pose2D::new(self.true_pose.x_mm, self.true_pose.y_mm, heading)
            .advanced(forward * dt_s);

        self.micro += (dt_s * 1e6) as u64;
    }

    fn motor_set_power(&mut self, id: MotorId, power: f64) {
        self.power[id as usize] = power.clamp(-1.0, 1.0);
    }

    fn motor_position(&self, id: MotorId) -> f64 {
        self.position[id as usize]
    }

    fn motor_speed(&self, id: MotorId) -> f64 {
        self.speed[id as usize]
    }

    fn motor_reset_position(&mut self, id: MotorId) {
        self.position[id as usize] = 0.0;
    }

    fn imu_read(&mut self) -> ImuSample {
        if self.imu_outage_ticks > 0 {
            self.imu_outage_ticks -= 1;
            self.faults |= HalFault::IMU;
            let mut held = self.last_imu;
            held.fresh = false;
            return held;
        }
        let sample = ImuSample {
            rate_radps: [0.0, 0.0, self.yaw_rate_radps + self.config.gyro_bias_radps],
            acc_mmps2: [0.0, 0.0, GRAVITY_MMPS2],
            temperature_degc: 30.0,
            fresh: true,
        };
        self.last_imu = sample;
        sample
    }

    fn set_led(&mut self, channel: usize, rgba: Rgba) {
        if let Some(led) = self.leds.get_mut(channel) {
            *led = rgba;
        }
    }

    fn led(&self, channel: usize) -> Rgba {
        self.leds.get(channel).copied().unwrap_or(Rgba::OFF)
    }

    fn micro_counter(&self) -> u32 {
        self.micro as u32
    }

    fn battery_voltage(&self) -> f64 {
        // Slight droop under load.
        let load: f64 = self.power.iter().map(|p| p.abs()).sum();
        self.config.battery_v - 0.02 * load
    }

    fn faults(&self) -> HalFault {
        self.faults
    }

    fn clear_faults(&mut self) {
        self.faults = HalFault::empty();
    }

    fn host_send(&mut self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for &b in bytes {
            if self.to_host.push_back(b).is_err() {
                self.faults |= HalFault::HOST_PIPE;
                debug!("sim host pipe overflow (robot → supervisor)");
                break;
            }
            accepted += 1;
        }
        accepted
    }

    fn host_recv(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.from_host.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.005;

    fn settle(hal: &mut SimHal, ticks: u32) {
        for _ in 0..ticks {
            hal.advance(DT);
        }
    }

    #[test]
    fn motor_approaches_free_speed() {
        let mut hal = SimHal::default();
        hal.motor_set_power(MotorId::LeftWheel, 1.0);
        settle(&mut hal, 200); // 1 s ≫ tau
        let s = hal.motor_speed(MotorId::LeftWheel);
        assert!((s - 18.0).abs() < 0.1, "speed {s}");
        assert!(hal.motor_position(MotorId::LeftWheel) > 0.0);
    }

    #[test]
    fn equal_power_drives_straight() {
        let mut hal = SimHal::default();
        hal.motor_set_power(MotorId::LeftWheel, 0.5);
        hal.motor_set_power(MotorId::RightWheel, 0.5);
        settle(&mut hal, 400); // 2 s
        let pose = hal.true_pose();
        assert!(pose.x_mm > 100.0);
        assert!(pose.y_mm.abs() < 1e-6);
        assert!(pose.heading_rad.abs() < 1e-9);
    }

    #[test]
    fn opposite_power_turns_in_place() {
        let mut hal = SimHal::default();
        hal.motor_set_power(MotorId::LeftWheel, -0.3);
        hal.motor_set_power(MotorId::RightWheel, 0.3);
        settle(&mut hal, 100);
        let pose = hal.true_pose();
        assert!(pose.position().length() < 1e-6);
        assert!(pose.heading_rad > 0.1);
        let imu = hal.imu_read();
        assert!(imu.rate_radps[2] > 0.0);
    }

    #[test]
    fn blocked_motor_does_not_move() {
        let mut hal = SimHal::default();
        hal.set_motor_blocked(MotorId::LeftWheel, true);
        hal.motor_set_power(MotorId::LeftWheel, 1.0);
        settle(&mut hal, 100);
        assert_eq!(hal.motor_speed(MotorId::LeftWheel), 0.0);
        assert_eq!(hal.motor_position(MotorId::LeftWheel), 0.0);
    }

    #[test]
    fn lift_stops_at_mechanical_limit() {
        let mut hal = SimHal::default();
        hal.motor_set_power(MotorId::Lift, 1.0);
        settle(&mut hal, 2_000); // 10 s, far past the stop
        let angle = hal.motor_position(MotorId::Lift);
        assert!((angle - (LIFT_MAX_ANGLE_RAD + JOINT_OVERTRAVEL_RAD)).abs() < 1e-9);
        assert_eq!(hal.motor_speed(MotorId::Lift), 0.0);
    }

    #[test]
    fn imu_outage_is_stale_and_faulted() {
        let mut hal = SimHal::default();
        hal.advance(DT);
        assert!(hal.imu_read().fresh);
        hal.fail_imu_for(2);
        assert!(!hal.imu_read().fresh);
        assert!(hal.faults().contains(HalFault::IMU));
        assert!(!hal.imu_read().fresh);
        assert!(hal.imu_read().fresh);
        hal.clear_faults();
        assert!(hal.faults().is_empty());
    }

    #[test]
    fn led_readback() {
        let mut hal = SimHal::default();
        hal.set_led(2, Rgba::GREEN);
        assert_eq!(hal.led(2), Rgba::GREEN);
        assert_eq!(hal.led(0), Rgba::OFF);
        // Out-of-range channel is ignored.
        hal.set_led(99, Rgba::RED);
        assert_eq!(hal.led(99), Rgba::OFF);
    }

    #[test]
    fn host_pipe_round_trip() {
        let mut hal = SimHal::default();
        hal.supervisor_send(&[1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(hal.host_recv(&mut buf), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);

        assert_eq!(hal.host_send(&[9, 8]), 2);
        let mut out = [0u8; 8];
        assert_eq!(hal.supervisor_recv(&mut out), 2);
        assert_eq!(&out[..2], &[9, 8]);
    }

    #[test]
    fn micro_counter_advances() {
        let mut hal = SimHal::default();
        let t0 = hal.micro_counter();
        settle(&mut hal, 10);
        assert_eq!(hal.micro_counter() - t0, 50_000);
    }
}
