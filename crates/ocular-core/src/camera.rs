//! Camera image configuration, resolution modes, and stream sources

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionParseError {
    #[error("malformed resolution string: \"{0}\"")]
    Malformed(String),
}

/// Output resolution of the stereo pipeline: image size plus disparity search range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    pub disparities: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32, disparities: u32) -> Self {
        Self {
            width,
            height,
            disparities,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.disparities)
    }
}

/// Parses `"<width>x<height>x<disparities>"`, e.g. `"1024x544x128"`
impl FromStr for Resolution {
    type Err = ResolutionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ResolutionParseError::Malformed(s.to_string());

        let mut parts = s.trim().split('x');
        let mut next = || -> Result<u32, ResolutionParseError> {
            parts
                .next()
                .ok_or_else(malformed)?
                .trim()
                .parse::<u32>()
                .map_err(|_| malformed())
        };

        let width = next()?;
        let height = next()?;
        let disparities = next()?;

        if parts.next().is_some() {
            return Err(malformed());
        }

        Ok(Self::new(width, height, disparities))
    }
}

/// One row of the sensor's supported-resolution table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceMode {
    pub width: u32,
    pub height: u32,
    pub disparities: u32,
}

impl DeviceMode {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height, self.disparities)
    }

    pub fn matches(&self, resolution: &Resolution) -> bool {
        self.resolution() == *resolution
    }
}

bitflags::bitflags! {
    /// Bitmask of data streams the sensor can publish
    ///
    /// Serializes as flag names, e.g. `"LUMA_RECT_LEFT | DISPARITY"`; bits
    /// without a name are kept as hex.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DataSource: u32 {
        const LUMA_LEFT = 1 << 2;
        const LUMA_RIGHT = 1 << 3;
        const LUMA_RECT_LEFT = 1 << 4;
        const LUMA_RECT_RIGHT = 1 << 5;
        const DISPARITY = 1 << 8;
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.bits())
    }
}

/// Image configuration as held by the sensor
///
/// Exposure times are in microseconds. Auto-exposure decay/threshold and
/// auto white balance decay/threshold only take effect while the matching
/// auto mode is enabled; the sensor enforces per-setting limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
    pub disparities: u32,
    pub fps: f32,
    pub gain: f32,
    pub exposure_us: u32,
    pub auto_exposure: bool,
    pub auto_exposure_max_us: u32,
    pub auto_exposure_decay: u32,
    pub auto_exposure_thresh: f32,
    pub white_balance_red: f32,
    pub white_balance_blue: f32,
    pub auto_white_balance: bool,
    pub auto_white_balance_decay: u32,
    pub auto_white_balance_thresh: f32,
}

impl ImageConfig {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height, self.disparities)
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.width = resolution.width;
        self.height = resolution.height;
        self.disparities = resolution.disparities;
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 544,
            disparities: 128,
            fps: 5.0,
            gain: 1.0,
            exposure_us: 10_000,
            auto_exposure: true,
            auto_exposure_max_us: 500_000,
            auto_exposure_decay: 7,
            auto_exposure_thresh: 0.75,
            white_balance_red: 1.0,
            white_balance_blue: 1.0,
            auto_white_balance: true,
            auto_white_balance_decay: 3,
            auto_white_balance_thresh: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        let r: Resolution = "1024x544x128".parse().unwrap();
        assert_eq!(r, Resolution::new(1024, 544, 128));
        assert_eq!(r.to_string(), "1024x544x128");
    }

    #[test]
    fn test_parse_resolution_rejects_malformed() {
        for s in ["", "1024x544", "1024x544x", "axbxc", "1024x544x128x2", "-1x2x3"] {
            assert!(
                matches!(s.parse::<Resolution>(), Err(ResolutionParseError::Malformed(_))),
                "expected {s:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_device_mode_matches() {
        let mode = DeviceMode {
            width: 2048,
            height: 1088,
            disparities: 64,
        };
        assert!(mode.matches(&Resolution::new(2048, 1088, 64)));
        assert!(!mode.matches(&Resolution::new(2048, 1088, 128)));
    }

    #[test]
    fn test_data_source_bits() {
        let mut streams = DataSource::LUMA_LEFT | DataSource::DISPARITY;
        assert!(streams.contains(DataSource::DISPARITY));
        assert!(!streams.contains(DataSource::LUMA_RIGHT));

        streams.remove(DataSource::DISPARITY);
        assert_eq!(streams, DataSource::LUMA_LEFT);

        streams.remove(DataSource::LUMA_LEFT);
        assert!(streams.is_empty());
    }

    #[test]
    fn test_data_source_keeps_unnamed_bits() {
        let streams = DataSource::from_bits_retain((1 << 25) | (1 << 8));
        assert!(streams.contains(DataSource::DISPARITY));
        assert_eq!(streams.to_string(), "0x02000100");
    }

    #[test]
    fn test_data_source_toml_names() {
        #[derive(Serialize, Deserialize)]
        struct Doc {
            streams: DataSource,
        }

        let doc: Doc = toml::from_str(r#"streams = "LUMA_RECT_LEFT | DISPARITY""#).unwrap();
        assert_eq!(doc.streams, DataSource::LUMA_RECT_LEFT | DataSource::DISPARITY);

        let text = toml::to_string(&doc).unwrap();
        let back: Doc = toml::from_str(&text).unwrap();
        assert_eq!(back.streams, doc.streams);
    }

    #[test]
    fn test_image_config_set_resolution() {
        let mut cfg = ImageConfig::default();
        cfg.set_resolution(Resolution::new(2048, 1088, 256));
        assert_eq!(cfg.resolution(), Resolution::new(2048, 1088, 256));
    }
}
