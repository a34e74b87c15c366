//! Ocular Core - Core types and schema selection for stereo camera configuration
//!
//! This crate provides the foundational types shared by the device channel and
//! the reconciler:
//! - Image, lighting, and IMU configuration as reported by the sensor
//! - Device descriptors (firmware version, imager type)
//! - The desired-state schema supplied by the host
//! - Variant selection from firmware version and imager type

pub mod camera;
pub mod desired;
pub mod device;
pub mod imu;
pub mod lighting;
pub mod variant;

pub use camera::{DataSource, DeviceMode, ImageConfig, Resolution, ResolutionParseError};
pub use desired::{DesiredConfig, DesiredImu, DesiredImuSensor};
pub use device::{DeviceInfo, ImagerType, VersionInfo};
pub use imu::{ImuConfig, ImuSensor, ImuSensorConfig};
pub use lighting::LightingConfig;
pub use variant::{select_variant, ImagerSize, SchemaMismatch, Variant, VariantError};
