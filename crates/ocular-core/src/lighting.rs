//! Illumination configuration

use serde::{Deserialize, Serialize};

/// LED configuration sent to the sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LightingConfig {
    /// Strobe the LEDs in sync with image exposure
    pub flash: bool,
    /// LED duty cycle in percent, clamped to [0, 100]
    pub duty_cycle: f32,
}

impl LightingConfig {
    /// LEDs off, no flash
    pub fn off() -> Self {
        Self {
            flash: false,
            duty_cycle: 0.0,
        }
    }

    /// Build from a duty cycle given as a fraction in [0, 1]
    ///
    /// NaN and infinite fractions turn the LEDs off.
    pub fn from_fraction(flash: bool, fraction: f64) -> Self {
        let percent = if fraction.is_finite() {
            (fraction * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            flash,
            duty_cycle: percent as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fraction() {
        let leds = LightingConfig::from_fraction(true, 0.25);
        assert!(leds.flash);
        assert_eq!(leds.duty_cycle, 25.0);
    }

    #[test]
    fn test_from_fraction_clamps() {
        assert_eq!(LightingConfig::from_fraction(false, 1.5).duty_cycle, 100.0);
        assert_eq!(LightingConfig::from_fraction(false, -0.5).duty_cycle, 0.0);
    }

    #[test]
    fn test_from_fraction_non_finite_is_off() {
        for fraction in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(LightingConfig::from_fraction(true, fraction).duty_cycle, 0.0);
        }
    }

    #[test]
    fn test_off() {
        assert_eq!(LightingConfig::off(), LightingConfig::default());
    }
}
