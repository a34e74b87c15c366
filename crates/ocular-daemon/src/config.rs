//! Configuration loading and validation

use ocular_channel::SensorProfile;
use ocular_core::{DesiredConfig, DesiredImu, Variant};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Simulated sensor the daemon drives
    #[serde(default)]
    pub sensor: SensorProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Path to the desired-state file
    #[serde(default = "default_desired_path")]
    pub desired_path: PathBuf,
    /// How often the desired-state file is checked for changes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            desired_path: default_desired_path(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_desired_path() -> PathBuf {
    PathBuf::from("./desired.toml")
}

fn default_poll_interval() -> u64 {
    500
}

/// Load configuration from file, falling back to defaults if it does not exist
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        return Ok(Config::default());
    }

    let content = read(path)?;
    let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Save default configuration to file, pointing it at `desired_path`
pub fn save_default_config(path: &Path, desired_path: &Path) -> Result<(), ConfigError> {
    let config = Config {
        daemon: DaemonConfig {
            desired_path: desired_path.to_path_buf(),
            ..DaemonConfig::default()
        },
        ..Config::default()
    };
    write(path, &toml::to_string_pretty(&config)?)
}

/// Default desired state for a schema variant
///
/// The `[imu]` table is present exactly when the variant carries an IMU, so
/// the result always passes the schema check.
pub fn default_desired(variant: Variant) -> DesiredConfig {
    DesiredConfig {
        imu: variant.has_imu().then(DesiredImu::default),
        ..DesiredConfig::default()
    }
}

/// Save the default desired state for `variant`
pub fn save_default_desired(path: &Path, variant: Variant) -> Result<(), ConfigError> {
    write(path, &toml::to_string_pretty(&default_desired(variant))?)
}

/// Parse a desired-state document
pub fn parse_desired(path: &Path, content: &str) -> Result<DesiredConfig, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the desired-state file
pub fn load_desired(path: &Path) -> Result<DesiredConfig, ConfigError> {
    let content = read(path)?;
    parse_desired(path, &content)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, content: &str) -> Result<(), ConfigError> {
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocular_core::{select_variant, ImagerSize, ImagerType};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.daemon.poll_interval_ms, 500);
        assert_eq!(config.sensor.firmware_version, 0x0305);
    }

    #[test]
    fn test_default_config_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ocular.toml");

        let desired_path = temp_dir.path().join("desired.toml");

        save_default_config(&path, &desired_path).unwrap();
        let config = load_config(&path).unwrap();

        assert_eq!(config.daemon.desired_path, desired_path);
        assert_eq!(config.daemon.poll_interval_ms, 500);
        assert_eq!(config.sensor.modes.len(), SensorProfile::default().modes.len());
        assert_eq!(config.sensor.imu, SensorProfile::default().imu);
    }

    #[test]
    fn test_load_sensor_section() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ocular.toml");
        std::fs::write(
            &path,
            r#"
            [daemon]
            poll_interval_ms = 100

            [sensor]
            firmware_version = 0x0150
            imager = "cmv4000_grey"
            motor_supported = false
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.daemon.poll_interval_ms, 100);
        assert_eq!(config.sensor.firmware_version, 0x0150);
        assert_eq!(config.sensor.imager, ImagerType::Cmv4000Grey);
        assert!(!config.sensor.motor_supported);
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("desired.toml");
        std::fs::write(&path, "fps = \"fast\"").unwrap();

        let err = load_desired(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("desired.toml"));
    }

    #[test]
    fn test_missing_desired_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_desired(&temp_dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_default_desired_matches_default_sensor() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("desired.toml");
        let sensor = SensorProfile::default();
        let variant = select_variant(sensor.firmware_version, sensor.imager).unwrap();

        save_default_desired(&path, variant).unwrap();
        let desired = load_desired(&path).unwrap();

        assert!(desired.imu.is_some());
        assert!(variant.check(&desired).is_ok());
        assert_eq!(desired, default_desired(variant));
    }

    #[test]
    fn test_default_desired_stereo_only_has_no_imu() {
        let variant = Variant::StereoOnly(ImagerSize::Cmv2000);
        let desired = default_desired(variant);
        assert!(desired.imu.is_none());
        assert!(variant.check(&desired).is_ok());
    }
}
