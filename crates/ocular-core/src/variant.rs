//! Configuration-schema variant selection
//!
//! The schema a sensor accepts depends on its firmware generation and imager:
//! - firmware <= 0x0202: block-matching stereo only
//! - 0x0202 < firmware < 0x0300: block-matching stereo with IMU
//! - firmware >= 0x0300: SGM stereo with IMU
//!
//! Only CMV2000 and CMV4000 imagers are supported; anything else is a startup
//! failure rather than something to discover on the first configuration event.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::desired::DesiredConfig;
use crate::device::ImagerType;

/// Last firmware release without IMU support
pub const LAST_STEREO_ONLY_FIRMWARE: u16 = 0x0202;

/// First firmware release with SGM stereo
pub const FIRST_SGM_FIRMWARE: u16 = 0x0300;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariantError {
    #[error("unsupported imager type \"{imager}\" (firmware {firmware:#06x})")]
    UnsupportedImager { imager: ImagerType, firmware: u16 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaMismatch {
    #[error("schema {0} requires an IMU section")]
    MissingImu(Variant),
    #[error("schema {0} has no IMU, but an IMU section was supplied")]
    UnexpectedImu(Variant),
}

/// Imager geometry family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagerSize {
    Cmv2000,
    Cmv4000,
}

impl ImagerSize {
    pub fn from_imager(imager: ImagerType) -> Option<Self> {
        match imager {
            ImagerType::Cmv2000Grey | ImagerType::Cmv2000Color => Some(Self::Cmv2000),
            ImagerType::Cmv4000Grey | ImagerType::Cmv4000Color => Some(Self::Cmv4000),
            ImagerType::Unknown(_) => None,
        }
    }

    /// Native (width, height) of the imager in pixels
    pub fn native_size(&self) -> (u32, u32) {
        match self {
            Self::Cmv2000 => (2048, 1088),
            Self::Cmv4000 => (2048, 2048),
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Self::Cmv2000 => "cmv2000",
            Self::Cmv4000 => "cmv4000",
        }
    }
}

/// The configuration schema installed for this sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "schema", content = "imager", rename_all = "snake_case")]
pub enum Variant {
    StereoOnly(ImagerSize),
    StereoPlusImu(ImagerSize),
    StereoImuSgm(ImagerSize),
}

impl Variant {
    pub fn imager_size(&self) -> ImagerSize {
        match self {
            Self::StereoOnly(s) | Self::StereoPlusImu(s) | Self::StereoImuSgm(s) => *s,
        }
    }

    pub fn has_imu(&self) -> bool {
        !matches!(self, Self::StereoOnly(_))
    }

    /// Schema name, e.g. `sl_bm_cmv2000_imu`
    pub fn schema_name(&self) -> String {
        match self {
            Self::StereoOnly(s) => format!("sl_bm_{}", s.tag()),
            Self::StereoPlusImu(s) => format!("sl_bm_{}_imu", s.tag()),
            Self::StereoImuSgm(s) => format!("sl_sgm_{}_imu", s.tag()),
        }
    }

    /// Check that a desired state carries exactly the sections this schema has
    pub fn check(&self, desired: &DesiredConfig) -> Result<(), SchemaMismatch> {
        match (self.has_imu(), desired.imu.is_some()) {
            (true, false) => Err(SchemaMismatch::MissingImu(*self)),
            (false, true) => Err(SchemaMismatch::UnexpectedImu(*self)),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.schema_name())
    }
}

/// Pick the schema variant for a firmware version and imager
pub fn select_variant(firmware_version: u16, imager: ImagerType) -> Result<Variant, VariantError> {
    let size = ImagerSize::from_imager(imager).ok_or(VariantError::UnsupportedImager {
        imager,
        firmware: firmware_version,
    })?;

    let variant = if firmware_version <= LAST_STEREO_ONLY_FIRMWARE {
        Variant::StereoOnly(size)
    } else if firmware_version < FIRST_SGM_FIRMWARE {
        Variant::StereoPlusImu(size)
    } else {
        Variant::StereoImuSgm(size)
    };

    Ok(variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::DesiredImu;

    #[test]
    fn test_stereo_only() {
        let v = select_variant(0x0150, ImagerType::Cmv2000Grey).unwrap();
        assert_eq!(v, Variant::StereoOnly(ImagerSize::Cmv2000));
        assert_eq!(v.schema_name(), "sl_bm_cmv2000");
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(
            select_variant(0x0202, ImagerType::Cmv4000Grey).unwrap(),
            Variant::StereoOnly(ImagerSize::Cmv4000)
        );
        assert_eq!(
            select_variant(0x0203, ImagerType::Cmv4000Grey).unwrap(),
            Variant::StereoPlusImu(ImagerSize::Cmv4000)
        );
        assert_eq!(
            select_variant(0x02ff, ImagerType::Cmv2000Color).unwrap(),
            Variant::StereoPlusImu(ImagerSize::Cmv2000)
        );
        assert_eq!(
            select_variant(0x0300, ImagerType::Cmv2000Color).unwrap(),
            Variant::StereoImuSgm(ImagerSize::Cmv2000)
        );
    }

    #[test]
    fn test_sgm() {
        let v = select_variant(0x0305, ImagerType::Cmv4000Color).unwrap();
        assert_eq!(v, Variant::StereoImuSgm(ImagerSize::Cmv4000));
        assert_eq!(v.schema_name(), "sl_sgm_cmv4000_imu");
        assert!(v.has_imu());
    }

    #[test]
    fn test_unknown_imager_is_fatal() {
        let err = select_variant(0x0200, ImagerType::Unknown(7)).unwrap_err();
        assert_eq!(
            err,
            VariantError::UnsupportedImager {
                imager: ImagerType::Unknown(7),
                firmware: 0x0200
            }
        );
    }

    #[test]
    fn test_schema_check() {
        let stereo = Variant::StereoOnly(ImagerSize::Cmv2000);
        let imu = Variant::StereoPlusImu(ImagerSize::Cmv2000);

        let plain = DesiredConfig::default();
        let with_imu = DesiredConfig {
            imu: Some(DesiredImu::default()),
            ..DesiredConfig::default()
        };

        assert!(stereo.check(&plain).is_ok());
        assert!(imu.check(&with_imu).is_ok());
        assert_eq!(stereo.check(&with_imu), Err(SchemaMismatch::UnexpectedImu(stereo)));
        assert_eq!(imu.check(&plain), Err(SchemaMismatch::MissingImu(imu)));
    }
}
