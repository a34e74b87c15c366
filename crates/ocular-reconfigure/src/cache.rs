//! Lazily fetched sensor capability tables
//!
//! The resolution mode table and the IMU configuration are each queried at
//! most once. A failed query leaves the cache empty so the next call asks the
//! sensor again; nothing is retried within a single call.

use ocular_channel::{Channel, ChannelError};
use ocular_core::{DeviceMode, ImuConfig, Resolution};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CapabilityCache {
    modes: Option<Vec<DeviceMode>>,
    imu: Option<ImuConfig>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supported resolution modes, fetched on first use
    pub fn resolution_modes<C: Channel + ?Sized>(
        &mut self,
        channel: &mut C,
    ) -> Result<&[DeviceMode], ChannelError> {
        let modes = match self.modes.take() {
            Some(modes) => modes,
            None => {
                let modes = channel.get_device_modes()?;
                debug!(count = modes.len(), "Cached sensor resolution modes");
                modes
            }
        };
        Ok(self.modes.insert(modes).as_slice())
    }

    /// Whether `resolution` appears in the mode table, fetching it if needed
    pub fn supports<C: Channel + ?Sized>(
        &mut self,
        channel: &mut C,
        resolution: &Resolution,
    ) -> Result<bool, ChannelError> {
        Ok(self
            .resolution_modes(channel)?
            .iter()
            .any(|m| m.matches(resolution)))
    }

    /// IMU configuration, fetched on first use
    ///
    /// Entries are mutated in place as changes are applied, so the cache
    /// tracks what the sensor was last told.
    pub fn imu_config<C: Channel + ?Sized>(
        &mut self,
        channel: &mut C,
    ) -> Result<&mut ImuConfig, ChannelError> {
        let imu = match self.imu.take() {
            Some(imu) => imu,
            None => {
                let imu = channel.get_imu_config()?;
                debug!(
                    sensors = imu.sensors.len(),
                    samples_per_message = imu.samples_per_message,
                    "Cached IMU configuration"
                );
                imu
            }
        };
        Ok(self.imu.insert(imu))
    }

    pub fn has_modes(&self) -> bool {
        self.modes.is_some()
    }

    pub fn has_imu(&self) -> bool {
        self.imu.is_some()
    }

    /// Drop the cached IMU configuration; the next access re-queries the sensor
    pub fn invalidate_imu(&mut self) {
        self.imu = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocular_channel::{Operation, SensorProfile, SimulatedChannel};
    use ocular_core::ImuSensor;

    #[test]
    fn test_modes_fetched_once() {
        let mut sensor = SimulatedChannel::new(SensorProfile::default());
        let journal = sensor.journal();
        let mut cache = CapabilityCache::new();

        assert!(cache.supports(&mut sensor, &Resolution::new(2048, 1088, 256)).unwrap());
        assert!(!cache.supports(&mut sensor, &Resolution::new(999, 999, 1)).unwrap());
        assert_eq!(cache.resolution_modes(&mut sensor).unwrap().len(), 5);

        assert_eq!(journal.count(Operation::GetDeviceModes), 1);
    }

    #[test]
    fn test_modes_failure_leaves_cache_empty() {
        let mut sensor = SimulatedChannel::new(SensorProfile::default());
        let journal = sensor.journal();
        let mut cache = CapabilityCache::new();

        sensor.fail_times(Operation::GetDeviceModes, ChannelError::TimedOut, 1);
        assert_eq!(
            cache.resolution_modes(&mut sensor).unwrap_err(),
            ChannelError::TimedOut
        );
        assert!(!cache.has_modes());

        assert!(cache.resolution_modes(&mut sensor).is_ok());
        assert!(cache.has_modes());
        assert_eq!(journal.count(Operation::GetDeviceModes), 2);
    }

    #[test]
    fn test_imu_cached_and_invalidated() {
        let mut sensor = SimulatedChannel::new(SensorProfile::default());
        let journal = sensor.journal();
        let mut cache = CapabilityCache::new();

        let imu = cache.imu_config(&mut sensor).unwrap();
        if let Some(gyro) = imu.get_mut(ImuSensor::Gyroscope) {
            gyro.enabled = false;
        }

        // Local edits survive until invalidated
        let imu = cache.imu_config(&mut sensor).unwrap();
        assert_eq!(imu.get(ImuSensor::Gyroscope).map(|c| c.enabled), Some(false));
        assert_eq!(journal.count(Operation::GetImuConfig), 1);

        cache.invalidate_imu();
        let imu = cache.imu_config(&mut sensor).unwrap();
        assert_eq!(imu.get(ImuSensor::Gyroscope).map(|c| c.enabled), Some(true));
        assert_eq!(journal.count(Operation::GetImuConfig), 2);
    }
}
