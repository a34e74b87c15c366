//! IMU sensor configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// The IMU sensors the reconciler manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImuSensor {
    Accelerometer,
    Gyroscope,
    Magnetometer,
}

impl ImuSensor {
    pub const ALL: [ImuSensor; 3] = [Self::Accelerometer, Self::Gyroscope, Self::Magnetometer];

    /// Name the sensor reports for this IMU element
    pub fn name(&self) -> &'static str {
        match self {
            Self::Accelerometer => "accelerometer",
            Self::Gyroscope => "gyroscope",
            Self::Magnetometer => "magnetometer",
        }
    }
}

impl fmt::Display for ImuSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration of one IMU element, as reported by the sensor
///
/// Rate and range are indices into tables the sensor publishes per element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImuSensorConfig {
    pub name: String,
    pub enabled: bool,
    pub rate_table_index: u32,
    pub range_table_index: u32,
}

impl ImuSensorConfig {
    pub fn new(sensor: ImuSensor, enabled: bool, rate_table_index: u32, range_table_index: u32) -> Self {
        Self {
            name: sensor.name().to_string(),
            enabled,
            rate_table_index,
            range_table_index,
        }
    }
}

/// Full IMU configuration returned by the sensor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImuConfig {
    pub samples_per_message: u32,
    pub sensors: Vec<ImuSensorConfig>,
}

impl ImuConfig {
    pub fn get(&self, sensor: ImuSensor) -> Option<&ImuSensorConfig> {
        self.sensors.iter().find(|c| c.name == sensor.name())
    }

    pub fn get_mut(&mut self, sensor: ImuSensor) -> Option<&mut ImuSensorConfig> {
        self.sensors.iter_mut().find(|c| c.name == sensor.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_names() {
        let names: Vec<_> = ImuSensor::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["accelerometer", "gyroscope", "magnetometer"]);
        assert_eq!(ImuSensor::Gyroscope.to_string(), "gyroscope");
    }

    #[test]
    fn test_imu_config_lookup() {
        let mut cfg = ImuConfig {
            samples_per_message: 20,
            sensors: vec![
                ImuSensorConfig::new(ImuSensor::Accelerometer, true, 1, 0),
                ImuSensorConfig::new(ImuSensor::Gyroscope, false, 2, 1),
            ],
        };

        assert_eq!(cfg.get(ImuSensor::Gyroscope).map(|c| c.rate_table_index), Some(2));
        assert!(cfg.get(ImuSensor::Magnetometer).is_none());

        if let Some(accel) = cfg.get_mut(ImuSensor::Accelerometer) {
            accel.enabled = false;
        }
        assert_eq!(cfg.get(ImuSensor::Accelerometer).map(|c| c.enabled), Some(false));
    }
}
