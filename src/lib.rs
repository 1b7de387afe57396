//! # light_bridge
//!
//! An async bridge that mirrors smart lights found on a local lighting network
//! into a home-automation accessory fabric, keeping power and color in sync in
//! both directions.
//!
//! ## Quick Start
//!
//! ```
//! use light_bridge::sim::{SimAccessoryServer, SimNetwork};
//! use light_bridge::{BridgeConfig, DeviceId, DiscoveryController};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), light_bridge::Error> {
//! let network = SimNetwork::new();
//! let server = SimAccessoryServer::new();
//! let config = BridgeConfig::new("03145154".parse()?);
//!
//! let mut controller = DiscoveryController::new(network.clone(), config, server);
//! controller.start().await?;
//!
//! // Every light announced on the network is now bridged.
//! network.add_light(DeviceId::new(0xd073d5000001), "Living Room");
//!
//! controller.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Discovery**: [`DiscoveryController`] owns the lighting client and bridges
//!   devices as they appear and disappear
//! - **Registry**: [`Registry`] tracks exactly one record per live device
//! - **Two-way sync**: [`Bridge`] relays light updates to the accessory and
//!   accessory changes back to the light
//! - **Color model**: [`color`] converts between the 16-bit light model and the
//!   degree/percent accessory model
//! - **Simulation**: the [`sim`] module implements both transports in memory
//!
//! ## Transports
//!
//! The bridge is generic over the two sides it connects. A lighting network
//! implements [`LightingConnector`], [`LightingClient`] and [`LightDevice`]; an
//! accessory fabric implements [`AccessoryServer`], [`Accessory`] and
//! [`AccessoryTransport`].
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`](https://docs.rs/log) facade. Install any
//! compatible logger in the binary to see them.

mod bridge;
pub mod color;
mod config;
mod discovery;
mod errors;
mod registry;
pub mod sim;
pub mod transport;
mod types;

// Re-export public API
pub use bridge::{Bridge, BridgedLight};
pub use config::BridgeConfig;
pub use discovery::{DiscoveryController, LightOf};
pub use errors::Error;
pub use registry::{Registry, Ticket};
pub use transport::{
    Accessory, AccessoryEvent, AccessoryHandler, AccessoryInfo, AccessoryServer,
    AccessoryTransport, ClientEvent, LightDevice, LightEvent, LightingClient, LightingConnector,
    Subscription,
};
pub use types::{AccessoryColor, DeliveryMode, DeviceId, Hsbk, Kelvin, Pin, SubscriptionId};
