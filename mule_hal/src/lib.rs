//! MULE hardware abstraction layer.
//!
//! [`Hal`] is the single seam between the control core and the
//! microcontroller peripherals: motors, encoders, IMU, LEDs, the
//! microsecond timer, and the framed byte pipe to the host. Backends are
//! pluggable; [`sim::SimHal`] is the physics simulation used by the test
//! suites and the sim binary.
//!
//! # Contract
//!
//! No method may block the control thread beyond a small bounded
//! constant, and none may allocate. On a peripheral failure a read
//! returns the last known-good value and the matching sticky bit in
//! [`HalFault`] is raised; the bit stays up until [`Hal::clear_faults`].

use bitflags::bitflags;

use mule_common::msg::Rgba;

pub mod sim;

/// Identifies one of the five driven motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum MotorId {
    LeftWheel = 0,
    RightWheel = 1,
    Lift = 2,
    Head = 3,
    Grip = 4,
}

/// Number of motor channels.
pub const MOTOR_COUNT: usize = 5;

/// One IMU sample, already converted to SI-ish robot units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuSample {
    /// Angular rate about x/y/z [rad/s].
    pub rate_radps: [f64; 3],
    /// Linear acceleration along x/y/z [mm/s²].
    pub acc_mmps2: [f64; 3],
    /// Die temperature [°C].
    pub temperature_degc: f64,
    /// False when the driver had to repeat the previous sample.
    pub fresh: bool,
}

bitflags! {
    /// Sticky peripheral fault bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HalFault: u8 {
        /// IMU stopped producing fresh samples.
        const IMU          = 0x01;
        /// An encoder channel failed.
        const ENCODER      = 0x02;
        /// Motor driver reported a fault.
        const MOTOR_DRIVER = 0x04;
        /// Host pipe overflowed; bytes were dropped.
        const HOST_PIPE    = 0x08;
    }
}

impl Default for HalFault {
    fn default() -> Self {
        Self::empty()
    }
}

/// Uniform facade over the robot's peripherals.
pub trait Hal {
    /// Advance the peripheral layer by one control period.
    ///
    /// Hardware backends latch DMA buffers and sample encoders here; the
    /// simulator integrates its physics. Called once at the top of every
    /// tick, before any read.
    fn advance(&mut self, dt_s: f64);

    /// Command raw open-loop power in [−1, +1]; values outside clamp.
    fn motor_set_power(&mut self, id: MotorId, power: f64);

    /// Accumulated shaft position [rad] since boot or the last reset.
    fn motor_position(&self, id: MotorId) -> f64;

    /// Instantaneous shaft speed [rad/s].
    fn motor_speed(&self, id: MotorId) -> f64;

    /// Zero the position counter of one motor.
    fn motor_reset_position(&mut self, id: MotorId);

    /// Latest IMU sample. `fresh == false` means a zero-order hold.
    fn imu_read(&mut self) -> ImuSample;

    /// Set one LED channel. Out-of-range channels are ignored.
    fn set_led(&mut self, channel: usize, rgba: Rgba);

    /// Last commanded colour of one LED channel.
    fn led(&self, channel: usize) -> Rgba;

    /// Free-running microsecond counter; wraps at 2³².
    fn micro_counter(&self) -> u32;

    /// Battery voltage [V].
    fn battery_voltage(&self) -> f64;

    /// Sticky peripheral fault word.
    fn faults(&self) -> HalFault;

    /// Clear all sticky peripheral faults.
    fn clear_faults(&mut self);

    /// Queue bytes toward the host. Returns how many were accepted;
    /// excess bytes are dropped and the HOST_PIPE fault raised.
    fn host_send(&mut self, bytes: &[u8]) -> usize;

    /// Drain bytes that arrived from the host into `buf`; returns the
    /// number of bytes written.
    fn host_recv(&mut self, buf: &mut [u8]) -> usize;
}
