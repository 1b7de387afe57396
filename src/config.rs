//! Bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::types::{DeliveryMode, Pin};

/// Tunables for discovery, relaying and shutdown.
///
/// Only the pairing PIN is required; every other field has the default the
/// bridge was designed around.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use light_bridge::BridgeConfig;
///
/// let config = BridgeConfig::new("12345678".parse().unwrap())
///     .with_request_timeout(Duration::from_secs(5));
/// assert_eq!(config.discovery_interval, Duration::from_secs(30));
/// assert_eq!(config.manufacturer, "LIFX");
/// ```
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub pin: Pin,
    pub manufacturer: String,
    pub delivery_mode: DeliveryMode,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub discovery_interval: Duration,
    /// Delay before the single reconnect attempt at startup.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub connect_retry_backoff: Duration,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub request_timeout: Option<Duration>,
    /// Fade applied to every color set relayed from the accessory fabric.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub transition: Duration,
    pub identify_toggles: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub identify_interval: Duration,
    /// How long the process lingers after teardown before exiting.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub shutdown_grace: Duration,
}

impl BridgeConfig {
    pub const DEFAULT_MANUFACTURER: &'static str = "LIFX";
    pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(30);
    pub const CONNECT_RETRY_BACKOFF: Duration = Duration::from_secs(2);
    pub const TRANSITION: Duration = Duration::from_secs(1);
    pub const IDENTIFY_TOGGLES: u32 = 4;
    pub const IDENTIFY_INTERVAL: Duration = Duration::from_secs(1);
    pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

    pub fn new(pin: Pin) -> Self {
        BridgeConfig {
            pin,
            manufacturer: Self::DEFAULT_MANUFACTURER.to_string(),
            delivery_mode: DeliveryMode::Reliable,
            discovery_interval: Self::DISCOVERY_INTERVAL,
            connect_retry_backoff: Self::CONNECT_RETRY_BACKOFF,
            request_timeout: None,
            transition: Self::TRANSITION,
            identify_toggles: Self::IDENTIFY_TOGGLES,
            identify_interval: Self::IDENTIFY_INTERVAL,
            shutdown_grace: Self::SHUTDOWN_GRACE,
        }
    }

    pub fn with_manufacturer(mut self, manufacturer: &str) -> Self {
        self.manufacturer = manufacturer.to_string();
        self
    }

    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    pub fn with_connect_retry_backoff(mut self, backoff: Duration) -> Self {
        self.connect_retry_backoff = backoff;
        self
    }

    /// A zero timeout leaves requests unbounded.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_transition(mut self, transition: Duration) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_identify(mut self, toggles: u32, interval: Duration) -> Self {
        self.identify_toggles = toggles;
        self.identify_interval = interval;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pin() -> Pin {
        "31415926".parse().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::new(pin());
        assert_eq!(config.delivery_mode, DeliveryMode::Reliable);
        assert_eq!(config.connect_retry_backoff, Duration::from_secs(2));
        assert_eq!(config.transition, Duration::from_secs(1));
        assert_eq!(config.identify_toggles, 4);
        assert_eq!(config.identify_interval, Duration::from_secs(1));
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_zero_timeout_is_unbounded() {
        let config = BridgeConfig::new(pin()).with_request_timeout(Duration::ZERO);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_serializes_durations_as_millis() {
        let config = BridgeConfig::new(pin()).with_request_timeout(Duration::from_millis(1500));
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["discovery_interval"], json!(30_000));
        assert_eq!(value["request_timeout"], json!(1500));
        assert_eq!(value["delivery_mode"], json!("reliable"));
        assert_eq!(value["pin"], json!("31415926"));

        let back: BridgeConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back.request_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(back.pin, pin());
    }

    #[test]
    fn test_rejects_invalid_pin_on_load() {
        let mut value = serde_json::to_value(BridgeConfig::new(pin())).unwrap();
        value["pin"] = json!("1234");
        assert!(serde_json::from_value::<BridgeConfig>(value).is_err());
    }
}
