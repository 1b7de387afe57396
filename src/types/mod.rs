//! Value types shared by the bridge and both transports.

mod accessory_color;
mod delivery;
mod hsbk;
mod ids;
mod kelvin;
mod pin;

pub use accessory_color::AccessoryColor;
pub use delivery::DeliveryMode;
pub use hsbk::Hsbk;
pub use ids::{DeviceId, SubscriptionId};
pub use kelvin::Kelvin;
pub use pin::Pin;
