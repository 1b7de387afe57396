//! Lighting-side color representation.

use serde::{Deserialize, Serialize};

use super::Kelvin;

/// A color as the lighting network encodes it.
///
/// Hue, saturation and brightness each span the full `u16` range; the
/// temperature is a validated [`Kelvin`].
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Hsbk {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: Kelvin,
}

impl Hsbk {
    /// Create a color with the default temperature.
    ///
    /// # Examples
    ///
    /// ```
    /// use light_bridge::Hsbk;
    ///
    /// let color = Hsbk::new(65535, 0, 32768);
    /// assert_eq!(color.kelvin.kelvin(), 3500);
    /// ```
    pub fn new(hue: u16, saturation: u16, brightness: u16) -> Self {
        Hsbk {
            hue,
            saturation,
            brightness,
            kelvin: Kelvin::new(),
        }
    }

    pub fn with_kelvin(mut self, kelvin: Kelvin) -> Self {
        self.kelvin = kelvin;
        self
    }
}
