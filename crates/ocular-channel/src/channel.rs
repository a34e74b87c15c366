//! Sensor channel trait and failure statuses

use ocular_core::{
    DataSource, DeviceInfo, DeviceMode, ImageConfig, ImuConfig, ImuSensorConfig, LightingConfig,
    VersionInfo,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure status returned by the sensor or the transport
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelError {
    #[error("Error")]
    Error,
    #[error("Failed")]
    Failed,
    #[error("Unsupported")]
    Unsupported,
    #[error("Unknown command")]
    UnknownCommand,
    #[error("Exception")]
    Exception,
    #[error("Timed out")]
    TimedOut,
}

impl ChannelError {
    /// The sensor explicitly declined the feature, as opposed to a transient failure
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported)
    }
}

/// Channel operations, used to attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    GetVersionInfo,
    GetDeviceInfo,
    GetDeviceModes,
    GetImageConfig,
    SetImageConfig,
    GetEnabledStreams,
    StopStreams,
    StartStreams,
    GetImuConfig,
    SetImuConfig,
    SetLightingConfig,
    SetMotorSpeed,
    NetworkTimeSynchronization,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetVersionInfo => "get_version_info",
            Self::GetDeviceInfo => "get_device_info",
            Self::GetDeviceModes => "get_device_modes",
            Self::GetImageConfig => "get_image_config",
            Self::SetImageConfig => "set_image_config",
            Self::GetEnabledStreams => "get_enabled_streams",
            Self::StopStreams => "stop_streams",
            Self::StartStreams => "start_streams",
            Self::GetImuConfig => "get_imu_config",
            Self::SetImuConfig => "set_imu_config",
            Self::SetLightingConfig => "set_lighting_config",
            Self::SetMotorSpeed => "set_motor_speed",
            Self::NetworkTimeSynchronization => "network_time_synchronization",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Blocking request/response access to one sensor
///
/// Implementations are driven from a single thread; callers that share a
/// sensor between threads must serialize access themselves.
pub trait Channel {
    fn get_version_info(&mut self) -> Result<VersionInfo, ChannelError>;

    fn get_device_info(&mut self) -> Result<DeviceInfo, ChannelError>;

    /// Supported resolution/disparity combinations
    fn get_device_modes(&mut self) -> Result<Vec<DeviceMode>, ChannelError>;

    fn get_image_config(&mut self) -> Result<ImageConfig, ChannelError>;

    fn set_image_config(&mut self, config: &ImageConfig) -> Result<(), ChannelError>;

    fn get_enabled_streams(&mut self) -> Result<DataSource, ChannelError>;

    fn stop_streams(&mut self, streams: DataSource) -> Result<(), ChannelError>;

    fn start_streams(&mut self, streams: DataSource) -> Result<(), ChannelError>;

    fn get_imu_config(&mut self) -> Result<ImuConfig, ChannelError>;

    /// Apply IMU changes. `changes` holds only the elements that differ and may
    /// be empty when only `samples_per_message` changes.
    fn set_imu_config(
        &mut self,
        store_in_flash: bool,
        samples_per_message: u32,
        changes: &[ImuSensorConfig],
    ) -> Result<(), ChannelError>;

    fn set_lighting_config(&mut self, config: &LightingConfig) -> Result<(), ChannelError>;

    fn set_motor_speed(&mut self, rpm: f64) -> Result<(), ChannelError>;

    /// Host-side setting; there is no sensor round trip
    fn network_time_synchronization(&mut self, enabled: bool);
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn get_version_info(&mut self) -> Result<VersionInfo, ChannelError> {
        (**self).get_version_info()
    }

    fn get_device_info(&mut self) -> Result<DeviceInfo, ChannelError> {
        (**self).get_device_info()
    }

    fn get_device_modes(&mut self) -> Result<Vec<DeviceMode>, ChannelError> {
        (**self).get_device_modes()
    }

    fn get_image_config(&mut self) -> Result<ImageConfig, ChannelError> {
        (**self).get_image_config()
    }

    fn set_image_config(&mut self, config: &ImageConfig) -> Result<(), ChannelError> {
        (**self).set_image_config(config)
    }

    fn get_enabled_streams(&mut self) -> Result<DataSource, ChannelError> {
        (**self).get_enabled_streams()
    }

    fn stop_streams(&mut self, streams: DataSource) -> Result<(), ChannelError> {
        (**self).stop_streams(streams)
    }

    fn start_streams(&mut self, streams: DataSource) -> Result<(), ChannelError> {
        (**self).start_streams(streams)
    }

    fn get_imu_config(&mut self) -> Result<ImuConfig, ChannelError> {
        (**self).get_imu_config()
    }

    fn set_imu_config(
        &mut self,
        store_in_flash: bool,
        samples_per_message: u32,
        changes: &[ImuSensorConfig],
    ) -> Result<(), ChannelError> {
        (**self).set_imu_config(store_in_flash, samples_per_message, changes)
    }

    fn set_lighting_config(&mut self, config: &LightingConfig) -> Result<(), ChannelError> {
        (**self).set_lighting_config(config)
    }

    fn set_motor_speed(&mut self, rpm: f64) -> Result<(), ChannelError> {
        (**self).set_motor_speed(rpm)
    }

    fn network_time_synchronization(&mut self, enabled: bool) {
        (**self).network_time_synchronization(enabled)
    }
}
