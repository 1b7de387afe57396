//! Color temperature control.

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Color temperature in Kelvin, with valid values from 2500K to 9000K.
///
/// The accessory fabric never exposes a temperature, so every color relayed
/// from that side carries [`Kelvin::DEFAULT`] (3500K).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "u16", into = "u16")]
pub struct Kelvin {
    pub(crate) kelvin: u16,
}

impl Default for Kelvin {
    fn default() -> Self {
        Self::new()
    }
}

impl Kelvin {
    pub const MIN: u16 = 2500;
    pub const MAX: u16 = 9000;
    pub const DEFAULT: u16 = 3500;

    /// Create a new Kelvin with the default value (3500K).
    ///
    /// # Examples
    ///
    /// ```
    /// use light_bridge::Kelvin;
    ///
    /// assert_eq!(Kelvin::new().kelvin(), 3500);
    /// ```
    pub fn new() -> Self {
        Kelvin {
            kelvin: Self::DEFAULT,
        }
    }

    /// Get the kelvin value.
    pub fn kelvin(&self) -> u16 {
        self.kelvin
    }

    /// Create a new Kelvin with the given value.
    ///
    /// Returns `None` if value is outside the valid range (2500-9000).
    ///
    /// # Examples
    ///
    /// ```
    /// use light_bridge::Kelvin;
    ///
    /// assert!(Kelvin::create(2499).is_none());
    /// assert!(Kelvin::create(2500).is_some());
    /// assert!(Kelvin::create(9000).is_some());
    /// assert!(Kelvin::create(9001).is_none());
    /// ```
    pub fn create(kelvin: u16) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&kelvin) {
            Some(Kelvin { kelvin })
        } else {
            None
        }
    }
}

impl From<Kelvin> for u16 {
    fn from(kelvin: Kelvin) -> Self {
        kelvin.kelvin
    }
}

impl TryFrom<u16> for Kelvin {
    type Error = Error;

    fn try_from(kelvin: u16) -> Result<Self, Self::Error> {
        Kelvin::create(kelvin).ok_or(Error::InvalidKelvin(kelvin))
    }
}
