use crate::types::{DeviceId, SubscriptionId};

/// All error types that can occur while bridging lights into the accessory fabric.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request to the lighting network failed.
    #[error("lighting {action} error: {reason}")]
    Lighting { action: String, reason: String },

    /// The accessory transport rejected an operation.
    #[error("accessory {action} error: {reason}")]
    Accessory { action: String, reason: String },

    /// The lighting network does not know the requested device.
    #[error("device {0} not found")]
    DeviceNotFound(DeviceId),

    /// The subscription has already been closed.
    #[error("subscription {0} is closed")]
    SubscriptionClosed(SubscriptionId),

    /// No client connection to the lighting network is established.
    #[error("not connected to the lighting network")]
    NotConnected,

    /// A lighting request did not complete within the configured timeout.
    #[error("{0} timed out")]
    Timeout(String),

    /// The pairing PIN is not exactly eight digits.
    #[error("invalid pairing pin {0:?}; expected exactly 8 digits")]
    InvalidPin(String),

    /// The color temperature is outside the supported range.
    #[error("kelvin {0} is outside 2500-9000")]
    InvalidKelvin(u16),
}

impl Error {
    /// Create a new lighting network error
    pub fn lighting(action: &str, reason: impl ToString) -> Self {
        Error::Lighting {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new accessory transport error
    pub fn accessory(action: &str, reason: impl ToString) -> Self {
        Error::Accessory {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn timeout(action: &str) -> Self {
        Error::Timeout(action.to_string())
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
