//! Sticky feature-support flags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Optional sensor features that may be declined at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Lighting,
    Motor,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lighting => f.write_str("lighting"),
            Self::Motor => f.write_str("motor"),
        }
    }
}

/// Which optional features are still worth attempting
///
/// Both start supported. Once a feature is marked unsupported it stays that
/// way; there is no way to set it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityFlags {
    lighting_supported: bool,
    motor_supported: bool,
}

impl Default for CapabilityFlags {
    fn default() -> Self {
        Self {
            lighting_supported: true,
            motor_supported: true,
        }
    }
}

impl CapabilityFlags {
    pub fn is_supported(&self, feature: Feature) -> bool {
        match feature {
            Feature::Lighting => self.lighting_supported,
            Feature::Motor => self.motor_supported,
        }
    }

    /// Returns `true` if this call flipped the flag
    pub fn mark_unsupported(&mut self, feature: Feature) -> bool {
        let flag = match feature {
            Feature::Lighting => &mut self.lighting_supported,
            Feature::Motor => &mut self.motor_supported,
        };
        std::mem::replace(flag, false)
    }
}
