//! Device descriptors reported by the sensor at startup

use serde::{Deserialize, Serialize};
use std::fmt;

/// Imager fitted to the stereo head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagerType {
    Cmv2000Grey,
    Cmv2000Color,
    Cmv4000Grey,
    Cmv4000Color,
    /// Imager code this host does not recognize
    Unknown(u32),
}

impl fmt::Display for ImagerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cmv2000Grey => write!(f, "CMV2000_GREY"),
            Self::Cmv2000Color => write!(f, "CMV2000_COLOR"),
            Self::Cmv4000Grey => write!(f, "CMV4000_GREY"),
            Self::Cmv4000Color => write!(f, "CMV4000_COLOR"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Firmware and API versions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Sensor firmware version, encoded as 0xMMmm
    pub sensor_firmware_version: u16,
    /// Build date string reported by the firmware
    #[serde(default)]
    pub sensor_firmware_build_date: String,
    /// Version of the host-side API
    pub api_version: u16,
}

/// Hardware description of the sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub serial_number: String,
    pub imager_type: ImagerType,
    pub imager_width: u32,
    pub imager_height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imager_display() {
        assert_eq!(ImagerType::Cmv4000Color.to_string(), "CMV4000_COLOR");
        assert_eq!(ImagerType::Unknown(9).to_string(), "unknown(9)");
    }
}
