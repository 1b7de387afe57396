//! Collaborator interfaces for the two device ecosystems.
//!
//! The bridge does not speak either wire protocol itself. A lighting adapter
//! implements [`LightingConnector`], [`LightingClient`] and [`LightDevice`];
//! an accessory adapter implements [`AccessoryServer`], [`Accessory`] and
//! [`AccessoryTransport`]. The [`crate::sim`] module provides in-memory
//! implementations of both.
//!
//! Events from either side are closed enums. Adapters map anything they do
//! not understand onto the `Unrecognized` arm instead of dropping it silently.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use strum_macros::Display;
use tokio::sync::mpsc;

use crate::errors::Error;
use crate::types::{DeliveryMode, DeviceId, Hsbk, Pin, SubscriptionId};

type Result<T> = std::result::Result<T, Error>;

/// Client-level notifications from the lighting network.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ClientEvent {
    /// A device answered discovery for the first time.
    NewDevice(DeviceId),
    /// A device stopped answering and was expired by the client.
    ExpiredDevice(DeviceId),
    /// Anything the adapter could not map, with a description for logging.
    Unrecognized(String),
}

/// Per-device notifications from the lighting network.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum LightEvent {
    UpdateColor,
    UpdatePower,
    UpdateLabel(String),
    Unrecognized(String),
}

/// An open event subscription.
///
/// The stream ends once the issuing side closes the subscription.
#[derive(Debug)]
pub struct Subscription<E> {
    id: SubscriptionId,
    events: mpsc::UnboundedReceiver<E>,
}

impl<E> Subscription<E> {
    pub fn new(id: SubscriptionId, events: mpsc::UnboundedReceiver<E>) -> Self {
        Subscription { id, events }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next event, or `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<E> {
        self.events.recv().await
    }
}

/// Opens client connections to the lighting network.
pub trait LightingConnector: Send + Sync + 'static {
    type Client: LightingClient;

    fn connect(&self, mode: DeliveryMode) -> impl Future<Output = Result<Self::Client>> + Send;
}

/// One logical connection to the lighting network.
pub trait LightingClient: Send + Sync + 'static {
    type Light: LightDevice;

    /// Open a client-level subscription for discovery events.
    fn subscribe(&self) -> impl Future<Output = Result<Subscription<ClientEvent>>> + Send;

    fn close_subscription(&self, id: SubscriptionId) -> impl Future<Output = Result<()>> + Send;

    /// Resolve the handle of a discovered device.
    fn light(&self, id: DeviceId) -> impl Future<Output = Result<Self::Light>> + Send;

    fn set_discovery_interval(&self, interval: Duration);

    /// Bound every request made through this client.
    fn set_timeout(&self, timeout: Duration);

    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Handle to a single light on the lighting network.
pub trait LightDevice: Clone + Send + Sync + 'static {
    fn id(&self) -> DeviceId;

    fn label(&self) -> impl Future<Output = Result<String>> + Send;

    fn power(&self) -> impl Future<Output = Result<bool>> + Send;

    fn set_power(&self, on: bool) -> impl Future<Output = Result<()>> + Send;

    fn color(&self) -> impl Future<Output = Result<Hsbk>> + Send;

    /// Set hue, saturation, brightness and temperature atomically.
    fn set_color(
        &self,
        color: Hsbk,
        transition: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    fn subscribe(&self) -> impl Future<Output = Result<Subscription<LightEvent>>> + Send;

    fn close_subscription(&self, id: SubscriptionId) -> impl Future<Output = Result<()>> + Send;
}

/// Metadata the accessory fabric shows for a bridged light.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInfo {
    pub name: String,
    pub manufacturer: String,
    pub serial_number: String,
}

/// Changes the accessory fabric requests on a light.
#[derive(Debug, Clone, Copy, PartialEq, Display)]
pub enum AccessoryEvent {
    PowerChanged(bool),
    HueChanged(f64),
    SaturationChanged(f64),
    BrightnessChanged(f64),
    Identify,
}

/// Callback an accessory invokes for every [`AccessoryEvent`].
///
/// May be invoked from any thread and must not block.
pub type AccessoryHandler = Box<dyn Fn(AccessoryEvent) + Send + Sync + 'static>;

/// A light bulb accessory.
///
/// Setters update the value the fabric sees and never invoke the handler;
/// only changes made by the fabric do.
pub trait Accessory: Send + Sync + 'static {
    fn info(&self) -> &AccessoryInfo;

    fn is_on(&self) -> bool;
    fn set_on(&self, on: bool);

    fn hue(&self) -> f64;
    fn set_hue(&self, hue: f64);

    fn saturation(&self) -> f64;
    fn set_saturation(&self, saturation: f64);

    fn brightness(&self) -> f64;
    fn set_brightness(&self, brightness: f64);

    /// Replace the handler for fabric-originated changes.
    fn set_handler(&self, handler: AccessoryHandler);

    /// Drop the handler, e.g. when the device goes away.
    fn clear_handler(&self);
}

/// Builds accessories and the network transports that publish them.
pub trait AccessoryServer: Send + Sync + 'static {
    type Accessory: Accessory;
    type Transport: AccessoryTransport;

    fn create_light_bulb(&self, info: AccessoryInfo) -> Arc<Self::Accessory>;

    fn create_transport(
        &self,
        pin: &Pin,
        accessory: Arc<Self::Accessory>,
    ) -> Result<Self::Transport>;

    /// Resolves once the fabric asks the whole process to terminate.
    ///
    /// The host runs its shutdown sequence when this completes, the same way
    /// it does for an interrupt or kill signal.
    fn terminated(&self) -> impl Future<Output = ()> + Send;
}

/// Publishes one accessory to the fabric.
pub trait AccessoryTransport: Send + Sync + 'static {
    /// Serve the accessory until [`AccessoryTransport::stop`] is called.
    fn start(&self) -> impl Future<Output = Result<()>> + Send;

    fn stop(&self) -> impl Future<Output = ()> + Send;
}
