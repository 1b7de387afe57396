//! Accessory-side color representation.

use serde::{Deserialize, Serialize};

/// A color as the accessory fabric encodes it.
///
/// - Hue: angle on the color wheel (0-360 degrees)
/// - Saturation: intensity of the color (0-100 percent)
/// - Brightness: output level (0-100 percent)
///
/// There is no temperature component.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct AccessoryColor {
    pub hue: f64,
    pub saturation: f64,
    pub brightness: f64,
}

impl AccessoryColor {
    pub const HUE_MAX: f64 = 360.0;
    pub const PERCENT_MAX: f64 = 100.0;

    pub fn new(hue: f64, saturation: f64, brightness: f64) -> Self {
        AccessoryColor {
            hue,
            saturation,
            brightness,
        }
    }

    /// Returns a copy with every component clamped into its domain.
    ///
    /// # Examples
    ///
    /// ```
    /// use light_bridge::AccessoryColor;
    ///
    /// let color = AccessoryColor::new(400.0, -5.0, 50.0).clamped();
    /// assert_eq!(color, AccessoryColor::new(360.0, 0.0, 50.0));
    /// ```
    pub fn clamped(&self) -> Self {
        AccessoryColor {
            hue: self.hue.clamp(0.0, Self::HUE_MAX),
            saturation: self.saturation.clamp(0.0, Self::PERCENT_MAX),
            brightness: self.brightness.clamp(0.0, Self::PERCENT_MAX),
        }
    }
}
