//! Accessory pairing PIN.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Pairing PIN handed to every accessory transport, exactly eight ASCII digits.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pin(String);

impl Pin {
    const LEN: usize = 8;

    /// Get the PIN digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Pin {
    type Err = Error;

    /// Parse and validate a PIN.
    ///
    /// # Examples
    ///
    /// ```
    /// use light_bridge::Pin;
    ///
    /// assert!("00102003".parse::<Pin>().is_ok());
    /// assert!("1234567".parse::<Pin>().is_err());
    /// assert!("1234-567".parse::<Pin>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Error> {
        if s.len() == Self::LEN && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Pin(s.to_string()))
        } else {
            Err(Error::InvalidPin(s.to_string()))
        }
    }
}

impl TryFrom<String> for Pin {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pin> for String {
    fn from(pin: Pin) -> Self {
        pin.0
    }
}

// Keep the PIN out of logs.
impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(********)")
    }
}
