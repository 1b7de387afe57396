//! Conversion between the lighting network's and the accessory fabric's color encodings.
//!
//! | Component  | Lighting           | Accessory         |
//! |------------|--------------------|-------------------|
//! | hue        | `0..=65535`        | `0.0..=360.0` deg |
//! | saturation | `0..=65535`        | `0.0..=100.0` %   |
//! | brightness | `0..=65535`        | `0.0..=100.0` %   |
//! | kelvin     | `2500..=9000`      | not exposed       |
//!
//! Both directions are pure. Converting towards the lighting side always
//! produces the default temperature.

use crate::types::{AccessoryColor, Hsbk, Kelvin};

const U16_MAX: f64 = u16::MAX as f64;

/// Convert a lighting color to its accessory representation.
///
/// # Examples
///
/// ```
/// use light_bridge::{Hsbk, color};
///
/// let converted = color::to_accessory(&Hsbk::new(65535, 0, 65535));
/// assert_eq!(converted.hue, 360.0);
/// assert_eq!(converted.saturation, 0.0);
/// assert_eq!(converted.brightness, 100.0);
/// ```
pub fn to_accessory(color: &Hsbk) -> AccessoryColor {
    AccessoryColor {
        hue: scale_from_u16(color.hue, AccessoryColor::HUE_MAX),
        saturation: scale_from_u16(color.saturation, AccessoryColor::PERCENT_MAX),
        brightness: scale_from_u16(color.brightness, AccessoryColor::PERCENT_MAX),
    }
}

/// Convert an accessory color to its lighting representation.
///
/// Out-of-range components are clamped to their domain first.
///
/// # Examples
///
/// ```
/// use light_bridge::{AccessoryColor, color};
///
/// let converted = color::to_lighting(&AccessoryColor::new(180.0, 50.0, 75.0));
/// assert_eq!(converted.hue, 32768);
/// assert_eq!(converted.saturation, 32768);
/// assert_eq!(converted.brightness, 49151);
/// assert_eq!(converted.kelvin.kelvin(), 3500);
/// ```
pub fn to_lighting(color: &AccessoryColor) -> Hsbk {
    let color = color.clamped();
    Hsbk {
        hue: scale_to_u16(color.hue, AccessoryColor::HUE_MAX),
        saturation: scale_to_u16(color.saturation, AccessoryColor::PERCENT_MAX),
        brightness: scale_to_u16(color.brightness, AccessoryColor::PERCENT_MAX),
        kelvin: Kelvin::new(),
    }
}

fn scale_from_u16(value: u16, max: f64) -> f64 {
    f64::from(value) * max / U16_MAX
}

// `value` is already clamped to `0..=max`, so the cast cannot saturate.
fn scale_to_u16(value: f64, max: f64) -> u16 {
    (U16_MAX * value / max).round() as u16
}

impl From<&Hsbk> for AccessoryColor {
    fn from(color: &Hsbk) -> Self {
        to_accessory(color)
    }
}

impl From<&AccessoryColor> for Hsbk {
    fn from(color: &AccessoryColor) -> Self {
        to_lighting(color)
    }
}
