//! In-memory sensor used by the host binary and by tests
//!
//! The simulated sensor keeps live state, enforces the same constraints the
//! hardware does (no resolution change while streaming, only listed modes),
//! supports failure injection per operation, and records every call it
//! receives in a shared [`Journal`].

use ocular_core::{
    DataSource, DeviceInfo, DeviceMode, ImageConfig, ImagerType, ImuConfig, ImuSensor,
    ImuSensorConfig, LightingConfig, VersionInfo,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

use crate::channel::{Channel, ChannelError, Operation};

/// Static description and initial state of a simulated sensor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorProfile {
    pub name: String,
    pub serial_number: String,
    /// Firmware version, e.g. `0x0305`
    pub firmware_version: u16,
    pub api_version: u16,
    pub imager: ImagerType,
    pub enabled_streams: DataSource,
    pub lighting_supported: bool,
    pub motor_supported: bool,
    pub modes: Vec<DeviceMode>,
    pub image: ImageConfig,
    pub imu: ImuConfig,
}

impl Default for SensorProfile {
    fn default() -> Self {
        let mode = |width, height, disparities| DeviceMode {
            width,
            height,
            disparities,
        };

        Self {
            name: "MultiSense S7".to_string(),
            serial_number: "SIM-0001".to_string(),
            firmware_version: 0x0305,
            api_version: 0x0300,
            imager: ImagerType::Cmv2000Grey,
            enabled_streams: DataSource::LUMA_RECT_LEFT | DataSource::DISPARITY,
            lighting_supported: true,
            motor_supported: true,
            modes: vec![
                mode(2048, 1088, 64),
                mode(2048, 1088, 128),
                mode(2048, 1088, 256),
                mode(1024, 544, 64),
                mode(1024, 544, 128),
            ],
            image: ImageConfig::default(),
            imu: ImuConfig {
                samples_per_message: 20,
                sensors: ImuSensor::ALL
                    .into_iter()
                    .map(|s| ImuSensorConfig::new(s, true, 0, 0))
                    .collect(),
            },
        }
    }
}

/// One call received by the simulated sensor
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetVersionInfo,
    GetDeviceInfo,
    GetDeviceModes,
    GetImageConfig,
    SetImageConfig(ImageConfig),
    GetEnabledStreams,
    StopStreams(DataSource),
    StartStreams(DataSource),
    GetImuConfig,
    SetImuConfig {
        store_in_flash: bool,
        samples_per_message: u32,
        changes: Vec<ImuSensorConfig>,
    },
    SetLightingConfig(LightingConfig),
    SetMotorSpeed(f64),
    NetworkTimeSynchronization(bool),
    /// Event recorded by a collaborator outside the channel, such as a
    /// resolution-change observer, so it can be ordered against sensor calls
    External(String),
}

impl Call {
    pub fn operation(&self) -> Option<Operation> {
        let op = match self {
            Self::GetVersionInfo => Operation::GetVersionInfo,
            Self::GetDeviceInfo => Operation::GetDeviceInfo,
            Self::GetDeviceModes => Operation::GetDeviceModes,
            Self::GetImageConfig => Operation::GetImageConfig,
            Self::SetImageConfig(_) => Operation::SetImageConfig,
            Self::GetEnabledStreams => Operation::GetEnabledStreams,
            Self::StopStreams(_) => Operation::StopStreams,
            Self::StartStreams(_) => Operation::StartStreams,
            Self::GetImuConfig => Operation::GetImuConfig,
            Self::SetImuConfig { .. } => Operation::SetImuConfig,
            Self::SetLightingConfig(_) => Operation::SetLightingConfig,
            Self::SetMotorSpeed(_) => Operation::SetMotorSpeed,
            Self::NetworkTimeSynchronization(_) => Operation::NetworkTimeSynchronization,
            Self::External(_) => return None,
        };
        Some(op)
    }
}

/// Shared, append-only record of calls
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        trace!(?call, "Journal");
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    /// Snapshot of all recorded calls, oldest first
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of recorded calls for an operation
    pub fn count(&self, op: Operation) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| c.operation() == Some(op))
            .count()
    }

    /// Index of the first recorded call matching a predicate
    pub fn position(&self, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .position(predicate)
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    error: ChannelError,
    /// `None` fails every call until cleared
    remaining: Option<u32>,
}

/// An in-memory stereo sensor
#[derive(Debug)]
pub struct SimulatedChannel {
    profile: SensorProfile,
    lighting: LightingConfig,
    motor_rpm: f64,
    time_sync: bool,
    failures: HashMap<Operation, InjectedFailure>,
    journal: Journal,
}

impl SimulatedChannel {
    pub fn new(profile: SensorProfile) -> Self {
        Self {
            profile,
            lighting: LightingConfig::off(),
            motor_rpm: 0.0,
            time_sync: true,
            failures: HashMap::new(),
            journal: Journal::new(),
        }
    }

    /// Handle to the call journal; clones share the same record
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Fail every call to `op` with `error` until cleared
    pub fn fail(&mut self, op: Operation, error: ChannelError) {
        self.failures.insert(
            op,
            InjectedFailure {
                error,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` calls to `op` with `error`
    pub fn fail_times(&mut self, op: Operation, error: ChannelError, times: u32) {
        self.failures.insert(
            op,
            InjectedFailure {
                error,
                remaining: Some(times),
            },
        );
    }

    pub fn image_config(&self) -> &ImageConfig {
        &self.profile.image
    }

    pub fn enabled_streams(&self) -> DataSource {
        self.profile.enabled_streams
    }

    pub fn imu_config(&self) -> &ImuConfig {
        &self.profile.imu
    }

    pub fn lighting(&self) -> LightingConfig {
        self.lighting
    }

    pub fn motor_rpm(&self) -> f64 {
        self.motor_rpm
    }

    pub fn time_sync(&self) -> bool {
        self.time_sync
    }

    fn check(&mut self, op: Operation) -> Result<(), ChannelError> {
        let Some(failure) = self.failures.get_mut(&op) else {
            return Ok(());
        };

        let error = failure.error.clone();
        let expired = match failure.remaining.as_mut() {
            None => false,
            Some(n) if *n > 1 => {
                *n -= 1;
                false
            }
            Some(_) => true,
        };
        if expired {
            self.failures.remove(&op);
        }

        debug!(op = %op, error = %error, "Injected failure");
        Err(error)
    }
}

impl Channel for SimulatedChannel {
    fn get_version_info(&mut self) -> Result<VersionInfo, ChannelError> {
        self.journal.record(Call::GetVersionInfo);
        self.check(Operation::GetVersionInfo)?;
        Ok(VersionInfo {
            sensor_firmware_version: self.profile.firmware_version,
            sensor_firmware_build_date: String::new(),
            api_version: self.profile.api_version,
        })
    }

    fn get_device_info(&mut self) -> Result<DeviceInfo, ChannelError> {
        self.journal.record(Call::GetDeviceInfo);
        self.check(Operation::GetDeviceInfo)?;

        let (imager_width, imager_height) = ocular_core::ImagerSize::from_imager(self.profile.imager)
            .map(|s| s.native_size())
            .unwrap_or((0, 0));

        Ok(DeviceInfo {
            name: self.profile.name.clone(),
            serial_number: self.profile.serial_number.clone(),
            imager_type: self.profile.imager,
            imager_width,
            imager_height,
        })
    }

    fn get_device_modes(&mut self) -> Result<Vec<DeviceMode>, ChannelError> {
        self.journal.record(Call::GetDeviceModes);
        self.check(Operation::GetDeviceModes)?;
        Ok(self.profile.modes.clone())
    }

    fn get_image_config(&mut self) -> Result<ImageConfig, ChannelError> {
        self.journal.record(Call::GetImageConfig);
        self.check(Operation::GetImageConfig)?;
        Ok(self.profile.image.clone())
    }

    fn set_image_config(&mut self, config: &ImageConfig) -> Result<(), ChannelError> {
        self.journal.record(Call::SetImageConfig(config.clone()));
        self.check(Operation::SetImageConfig)?;

        let resolution = config.resolution();
        if resolution != self.profile.image.resolution() {
            if !self.profile.enabled_streams.is_empty() {
                warn!(
                    streams = %self.profile.enabled_streams,
                    "Rejecting resolution change while streams are active"
                );
                return Err(ChannelError::Failed);
            }
            if !self.profile.modes.iter().any(|m| m.matches(&resolution)) {
                warn!(resolution = %resolution, "Rejecting unsupported resolution");
                return Err(ChannelError::Failed);
            }
        }

        self.profile.image = config.clone();
        Ok(())
    }

    fn get_enabled_streams(&mut self) -> Result<DataSource, ChannelError> {
        self.journal.record(Call::GetEnabledStreams);
        self.check(Operation::GetEnabledStreams)?;
        Ok(self.profile.enabled_streams)
    }

    fn stop_streams(&mut self, streams: DataSource) -> Result<(), ChannelError> {
        self.journal.record(Call::StopStreams(streams));
        self.check(Operation::StopStreams)?;
        self.profile.enabled_streams.remove(streams);
        Ok(())
    }

    fn start_streams(&mut self, streams: DataSource) -> Result<(), ChannelError> {
        self.journal.record(Call::StartStreams(streams));
        self.check(Operation::StartStreams)?;
        self.profile.enabled_streams.insert(streams);
        Ok(())
    }

    fn get_imu_config(&mut self) -> Result<ImuConfig, ChannelError> {
        self.journal.record(Call::GetImuConfig);
        self.check(Operation::GetImuConfig)?;
        Ok(self.profile.imu.clone())
    }

    fn set_imu_config(
        &mut self,
        store_in_flash: bool,
        samples_per_message: u32,
        changes: &[ImuSensorConfig],
    ) -> Result<(), ChannelError> {
        self.journal.record(Call::SetImuConfig {
            store_in_flash,
            samples_per_message,
            changes: changes.to_vec(),
        });
        self.check(Operation::SetImuConfig)?;

        if changes
            .iter()
            .any(|c| !self.profile.imu.sensors.iter().any(|s| s.name == c.name))
        {
            return Err(ChannelError::Failed);
        }

        for change in changes {
            if let Some(entry) = self
                .profile
                .imu
                .sensors
                .iter_mut()
                .find(|s| s.name == change.name)
            {
                *entry = change.clone();
            }
        }
        self.profile.imu.samples_per_message = samples_per_message;
        Ok(())
    }

    fn set_lighting_config(&mut self, config: &LightingConfig) -> Result<(), ChannelError> {
        self.journal.record(Call::SetLightingConfig(*config));
        self.check(Operation::SetLightingConfig)?;
        if !self.profile.lighting_supported {
            return Err(ChannelError::Unsupported);
        }
        self.lighting = *config;
        Ok(())
    }

    fn set_motor_speed(&mut self, rpm: f64) -> Result<(), ChannelError> {
        self.journal.record(Call::SetMotorSpeed(rpm));
        self.check(Operation::SetMotorSpeed)?;
        if !self.profile.motor_supported {
            return Err(ChannelError::Unsupported);
        }
        self.motor_rpm = rpm;
        Ok(())
    }

    fn network_time_synchronization(&mut self, enabled: bool) {
        self.journal.record(Call::NetworkTimeSynchronization(enabled));
        self.time_sync = enabled;
    }
}
