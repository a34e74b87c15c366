//! Desired-state schema supplied by the host on every configuration change
//!
//! Units follow the operator-facing conventions: exposure times in seconds,
//! motor speed in radians per second, LED duty cycle as a fraction. The
//! reconciler converts to device units.

use serde::{Deserialize, Serialize};

use crate::imu::ImuSensor;

/// The configuration the operator wants the sensor to have
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesiredConfig {
    /// `"<width>x<height>x<disparities>"`
    pub resolution: String,
    pub fps: f32,
    pub gain: f32,
    /// Manual exposure time in seconds
    pub exposure_time: f64,
    pub auto_exposure: bool,
    /// Longest exposure auto-exposure may pick, in seconds
    pub auto_exposure_max_time: f64,
    pub auto_exposure_decay: u32,
    pub auto_exposure_thresh: f32,
    pub white_balance_red: f32,
    pub white_balance_blue: f32,
    pub auto_white_balance: bool,
    pub auto_white_balance_decay: u32,
    pub auto_white_balance_thresh: f32,
    /// Report timestamps in the host clock frame instead of the free-running sensor clock
    pub network_time_sync: bool,
    /// Laser spindle speed in rad/s
    pub motor_speed: f64,
    pub lighting: bool,
    pub flash: bool,
    /// LED duty cycle as a fraction in [0, 1]
    pub led_duty_cycle: f64,
    /// Present only for schema variants that carry an IMU
    pub imu: Option<DesiredImu>,
}

impl Default for DesiredConfig {
    fn default() -> Self {
        Self {
            resolution: "1024x544x128".to_string(),
            fps: 5.0,
            gain: 1.0,
            exposure_time: 0.01,
            auto_exposure: true,
            auto_exposure_max_time: 0.5,
            auto_exposure_decay: 7,
            auto_exposure_thresh: 0.75,
            white_balance_red: 1.0,
            white_balance_blue: 1.0,
            auto_white_balance: true,
            auto_white_balance_decay: 3,
            auto_white_balance_thresh: 0.5,
            network_time_sync: true,
            motor_speed: 0.0,
            lighting: false,
            flash: false,
            led_duty_cycle: 0.0,
            imu: None,
        }
    }
}

/// Desired IMU state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesiredImu {
    pub samples_per_message: u32,
    pub accelerometer: DesiredImuSensor,
    pub gyroscope: DesiredImuSensor,
    pub magnetometer: DesiredImuSensor,
}

impl DesiredImu {
    pub fn sensor(&self, sensor: ImuSensor) -> &DesiredImuSensor {
        match sensor {
            ImuSensor::Accelerometer => &self.accelerometer,
            ImuSensor::Gyroscope => &self.gyroscope,
            ImuSensor::Magnetometer => &self.magnetometer,
        }
    }
}

impl Default for DesiredImu {
    fn default() -> Self {
        Self {
            samples_per_message: 20,
            accelerometer: DesiredImuSensor::default(),
            gyroscope: DesiredImuSensor::default(),
            magnetometer: DesiredImuSensor::default(),
        }
    }
}

/// Desired state of one IMU element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesiredImuSensor {
    pub enabled: bool,
    /// Index into the element's rate table
    pub rate: u32,
    /// Index into the element's range table
    pub range: u32,
}

impl Default for DesiredImuSensor {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 0,
            range: 0,
        }
    }
}
