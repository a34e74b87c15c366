//! Desired-state reconciliation against a live sensor
//!
//! One [`Reconfigure::reconcile`] call is one cycle:
//! 1. Read the live image config (failure aborts the cycle)
//! 2. Decide whether the resolution must change, validating against the
//!    cached mode table (a failed mode query aborts the cycle; an unlisted
//!    resolution is rejected and the rest of the cycle continues)
//! 3. If it must, pause the enabled streams (failure to pause aborts)
//! 4. Apply image settings in one write and forward the time-sync flag
//! 5. Notify the resolution observer and restart exactly the paused streams
//! 6. Motor speed and lighting, each skipped once the sensor declines it
//! 7. IMU element diff and a single combined write
//!
//! Once streams are paused, steps 4 and 5 always run to completion.

use ocular_channel::{Channel, ChannelError, Operation};
use ocular_core::{
    select_variant, DataSource, DesiredConfig, DesiredImu, DeviceInfo, ImageConfig, ImuSensor,
    LightingConfig, Resolution, Variant, VersionInfo,
};
use serde::{Serialize, Serializer};
use tracing::{debug, error, info, warn};

use crate::cache::CapabilityCache;
use crate::error::{ReconfigureError, ValidationError};
use crate::flags::{CapabilityFlags, Feature};

/// Converts the desired spindle speed (rad/s) to the sensor's RPM
pub const RADIANS_PER_SECOND_TO_RPM: f64 = 9.54929659643;

/// Observer invoked after a resolution change is written and before streams restart
pub type ResolutionHook = Box<dyn FnMut() + Send>;

/// Stream state across a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Idle,
    /// Streams captured here were stopped for a resize and must be restarted
    PausedForResize(DataSource),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    #[default]
    Unchanged,
    Changed { from: Resolution, to: Resolution },
    /// The requested resolution was invalid or unsupported; the previous one was kept
    Rejected { requested: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureOutcome {
    Applied,
    /// Not attempted because the sensor declined it on an earlier call
    #[default]
    Skipped,
    /// The sensor declined it on this call
    Unsupported,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImuOutcome {
    /// The installed schema has no IMU
    #[default]
    NotApplicable,
    Unchanged,
    Written {
        changed_sensors: usize,
        samples_per_message: u32,
    },
    Failed,
}

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub resolution: ResolutionOutcome,
    pub image_config_applied: bool,
    /// Streams restarted after a resize
    pub streams_restarted: Option<DataSource>,
    pub motor: FeatureOutcome,
    pub lighting: FeatureOutcome,
    pub imu: ImuOutcome,
    /// Non-fatal failures, in the order they occurred
    #[serde(serialize_with = "serialize_issues")]
    pub issues: Vec<ReconfigureError>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn reject_resolution(&mut self, requested: &str, reason: ValidationError) {
        self.resolution = ResolutionOutcome::Rejected {
            requested: requested.to_string(),
        };
        self.issues.push(reason.into());
    }
}

#[derive(Serialize)]
struct IssueRecord {
    kind: &'static str,
    message: String,
}

fn serialize_issues<S: Serializer>(issues: &[ReconfigureError], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(issues.iter().map(|issue| IssueRecord {
        kind: issue.kind(),
        message: issue.to_string(),
    }))
}

/// Reconciles desired configuration against one sensor
///
/// Not reentrant: the host must deliver desired-state events one at a time.
pub struct Reconfigure<C: Channel> {
    channel: C,
    variant: Variant,
    version_info: VersionInfo,
    device_info: DeviceInfo,
    cache: CapabilityCache,
    flags: CapabilityFlags,
    state: StreamState,
    on_resolution_changed: Option<ResolutionHook>,
}

impl<C: Channel> Reconfigure<C> {
    /// Query the sensor and install the matching schema variant
    ///
    /// Fails if the sensor cannot be queried or no variant fits its firmware
    /// and imager; there is no disabled-but-constructed state.
    pub fn new(mut channel: C) -> Result<Self, ReconfigureError> {
        let version_info = channel
            .get_version_info()
            .inspect_err(|e| error!(error = %e, "Failed to query version info"))
            .map_err(ReconfigureError::transport(Operation::GetVersionInfo))?;

        let device_info = channel
            .get_device_info()
            .inspect_err(|e| error!(error = %e, "Failed to query device info"))
            .map_err(ReconfigureError::transport(Operation::GetDeviceInfo))?;

        let variant = select_variant(version_info.sensor_firmware_version, device_info.imager_type)
            .inspect_err(|e| error!(error = %e, "No configuration schema for this sensor"))?;

        info!(
            schema = %variant,
            firmware = %format!("{:#06x}", version_info.sensor_firmware_version),
            imager = %device_info.imager_type,
            "Installed configuration schema"
        );

        Ok(Self {
            channel,
            variant,
            version_info,
            device_info,
            cache: CapabilityCache::new(),
            flags: CapabilityFlags::default(),
            state: StreamState::Idle,
            on_resolution_changed: None,
        })
    }

    /// Register the resolution-change observer
    pub fn with_resolution_hook(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_resolution_changed = Some(Box::new(hook));
        self
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn version_info(&self) -> &VersionInfo {
        &self.version_info
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn flags(&self) -> CapabilityFlags {
        self.flags
    }

    pub fn cache(&self) -> &CapabilityCache {
        &self.cache
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Run one reconciliation cycle
    ///
    /// `Err` means the cycle was aborted; failures that only skip a single
    /// setting are collected in the returned report.
    pub fn reconcile(&mut self, desired: &DesiredConfig) -> Result<ReconcileReport, ReconfigureError> {
        self.variant
            .check(desired)
            .inspect_err(|e| error!(error = %e, "Rejecting desired state"))?;

        let mut report = ReconcileReport::default();

        self.configure_camera(desired, &mut report)?;

        if let Some(imu) = &desired.imu {
            self.configure_imu(imu, &mut report);
        }

        Ok(report)
    }

    fn configure_camera(
        &mut self,
        desired: &DesiredConfig,
        report: &mut ReconcileReport,
    ) -> Result<(), ReconfigureError> {
        let mut cfg = self
            .channel
            .get_image_config()
            .inspect_err(|e| error!(error = %e, "Failed to query image config"))
            .map_err(ReconfigureError::transport(Operation::GetImageConfig))?;

        let current = cfg.resolution();
        let target = self.resolution_change(&current, &desired.resolution, report)?;

        if let Some(target) = target {
            self.pause_for_resize()?;

            warn!(
                from = %current,
                to = %target,
                "Changing sensor resolution: reconfiguration may take up to 30 seconds"
            );
            cfg.set_resolution(target);
        }

        apply_image_settings(&mut cfg, desired);

        // Sensor enforces limits per setting
        report.image_config_applied = match self.channel.set_image_config(&cfg) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to set image config");
                report
                    .issues
                    .push(ReconfigureError::transport(Operation::SetImageConfig)(e));
                false
            }
        };

        self.channel
            .network_time_synchronization(desired.network_time_sync);

        if let Some(target) = target {
            if report.image_config_applied {
                report.resolution = ResolutionOutcome::Changed {
                    from: current,
                    to: target,
                };
            }
            report.streams_restarted = self.resume_after_resize(report);
        }

        report.motor = self.apply_motor(desired.motor_speed, report);
        report.lighting = self.apply_lighting(desired, report);

        Ok(())
    }

    /// Decide whether a resize is needed. `Ok(None)` keeps the live resolution.
    fn resolution_change(
        &mut self,
        current: &Resolution,
        requested: &str,
        report: &mut ReconcileReport,
    ) -> Result<Option<Resolution>, ReconfigureError> {
        let target: Resolution = match requested.parse() {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "Rejecting resolution change");
                report.reject_resolution(requested, ValidationError::MalformedResolution(e));
                return Ok(None);
            }
        };

        if target == *current {
            return Ok(None);
        }

        let supported = self
            .cache
            .supports(&mut self.channel, &target)
            .inspect_err(|e| error!(error = %e, "Failed to query sensor modes"))
            .map_err(ReconfigureError::transport(Operation::GetDeviceModes))?;

        if supported {
            return Ok(Some(target));
        }

        let (width, height) = self.variant.imager_size().native_size();
        if target.width > width || target.height > height {
            error!(resolution = %target, width, height, "Resolution exceeds imager size");
            report.reject_resolution(
                requested,
                ValidationError::ExceedsImager {
                    resolution: target,
                    width,
                    height,
                },
            );
        } else {
            error!(
                width = target.width,
                height = target.height,
                disparities = target.disparities,
                "Sensor does not support resolution"
            );
            report.reject_resolution(requested, ValidationError::UnsupportedResolution(target));
        }
        Ok(None)
    }

    /// Idle -> PausedForResize
    fn pause_for_resize(&mut self) -> Result<(), ReconfigureError> {
        let streams = self
            .channel
            .get_enabled_streams()
            .inspect_err(|e| error!(error = %e, "Failed to get enabled streams"))
            .map_err(ReconfigureError::transport(Operation::GetEnabledStreams))?;

        self.channel
            .stop_streams(streams)
            .inspect_err(|e| error!(error = %e, "Failed to stop streams for a resolution change"))
            .map_err(ReconfigureError::transport(Operation::StopStreams))?;

        debug!(streams = %streams, "Paused streams for resolution change");
        self.state = StreamState::PausedForResize(streams);
        Ok(())
    }

    /// PausedForResize -> Idle. Returns the restarted streams on success.
    fn resume_after_resize(&mut self, report: &mut ReconcileReport) -> Option<DataSource> {
        let StreamState::PausedForResize(streams) = std::mem::take(&mut self.state) else {
            return None;
        };

        if let Some(hook) = self.on_resolution_changed.as_mut() {
            hook();
        }

        match self.channel.start_streams(streams) {
            Ok(()) => {
                debug!(streams = %streams, "Restarted streams");
                Some(streams)
            }
            Err(e) => {
                error!(error = %e, "Failed to restart streams after a resolution change");
                report
                    .issues
                    .push(ReconfigureError::transport(Operation::StartStreams)(e));
                None
            }
        }
    }

    fn apply_motor(&mut self, speed: f64, report: &mut ReconcileReport) -> FeatureOutcome {
        if !self.flags.is_supported(Feature::Motor) {
            return FeatureOutcome::Skipped;
        }

        let rpm = RADIANS_PER_SECOND_TO_RPM * speed;
        let result = self.channel.set_motor_speed(rpm);
        self.feature_result(Feature::Motor, Operation::SetMotorSpeed, result, report)
    }

    fn apply_lighting(&mut self, desired: &DesiredConfig, report: &mut ReconcileReport) -> FeatureOutcome {
        if !self.flags.is_supported(Feature::Lighting) {
            return FeatureOutcome::Skipped;
        }

        let leds = if desired.lighting {
            LightingConfig::from_fraction(desired.flash, desired.led_duty_cycle)
        } else {
            LightingConfig::off()
        };

        let result = self.channel.set_lighting_config(&leds);
        self.feature_result(Feature::Lighting, Operation::SetLightingConfig, result, report)
    }

    fn feature_result(
        &mut self,
        feature: Feature,
        operation: Operation,
        result: Result<(), ChannelError>,
        report: &mut ReconcileReport,
    ) -> FeatureOutcome {
        match result {
            Ok(()) => FeatureOutcome::Applied,
            Err(e) if e.is_unsupported() => {
                if self.flags.mark_unsupported(feature) {
                    info!(feature = %feature, "Sensor does not support feature, disabling it");
                }
                report.issues.push(ReconfigureError::UnsupportedFeature(feature));
                FeatureOutcome::Unsupported
            }
            Err(e) => {
                error!(feature = %feature, operation = %operation, error = %e, "Failed to apply feature");
                report.issues.push(ReconfigureError::transport(operation)(e));
                FeatureOutcome::Failed
            }
        }
    }

    fn configure_imu(&mut self, desired: &DesiredImu, report: &mut ReconcileReport) {
        let imu = match self.cache.imu_config(&mut self.channel) {
            Ok(imu) => imu,
            Err(e) => {
                error!(error = %e, "Failed to query IMU config");
                report
                    .issues
                    .push(ReconfigureError::transport(Operation::GetImuConfig)(e));
                report.imu = ImuOutcome::Failed;
                return;
            }
        };

        let mut changes = Vec::new();
        for sensor in ImuSensor::ALL {
            let want = desired.sensor(sensor);
            let Some(entry) = imu.get_mut(sensor) else {
                debug!(sensor = %sensor, "Sensor does not report this IMU element");
                continue;
            };

            if entry.enabled != want.enabled
                || entry.rate_table_index != want.rate
                || entry.range_table_index != want.range
            {
                entry.enabled = want.enabled;
                entry.rate_table_index = want.rate;
                entry.range_table_index = want.range;
                changes.push(entry.clone());
            }
        }

        if changes.is_empty() && imu.samples_per_message == desired.samples_per_message {
            report.imu = ImuOutcome::Unchanged;
            return;
        }

        warn!("IMU configuration changes will take effect after all IMU consumers have disconnected");

        imu.samples_per_message = desired.samples_per_message;
        let samples_per_message = desired.samples_per_message;

        match self
            .channel
            .set_imu_config(false, samples_per_message, &changes)
        {
            Ok(()) => {
                report.imu = ImuOutcome::Written {
                    changed_sensors: changes.len(),
                    samples_per_message,
                };
            }
            Err(e) => {
                error!(error = %e, "Failed to set IMU configuration");
                self.cache.invalidate_imu();
                report
                    .issues
                    .push(ReconfigureError::transport(Operation::SetImuConfig)(e));
                report.imu = ImuOutcome::Failed;
            }
        }
    }
}

fn seconds_to_us(seconds: f64) -> u32 {
    (seconds * 1e6).round().clamp(0.0, u32::MAX as f64) as u32
}

/// Copy every non-resolution image setting from the desired state
fn apply_image_settings(cfg: &mut ImageConfig, desired: &DesiredConfig) {
    cfg.fps = desired.fps;
    cfg.gain = desired.gain;
    cfg.exposure_us = seconds_to_us(desired.exposure_time);
    cfg.auto_exposure = desired.auto_exposure;
    cfg.auto_exposure_max_us = seconds_to_us(desired.auto_exposure_max_time);
    cfg.auto_exposure_decay = desired.auto_exposure_decay;
    cfg.auto_exposure_thresh = desired.auto_exposure_thresh;
    cfg.white_balance_red = desired.white_balance_red;
    cfg.white_balance_blue = desired.white_balance_blue;
    cfg.auto_white_balance = desired.auto_white_balance;
    cfg.auto_white_balance_decay = desired.auto_white_balance_decay;
    cfg.auto_white_balance_thresh = desired.auto_white_balance_thresh;
}
