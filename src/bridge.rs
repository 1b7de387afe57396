//! Per-device state synchronisation between a light and its accessory.
//!
//! For every registered device the bridge owns:
//!
//! - one consumer task for the light's event subscription, relaying color and
//!   power updates onto the accessory,
//! - one task serving the accessory transport,
//! - a handler on the accessory that spawns a task per fabric-originated
//!   change and writes it back to the light.
//!
//! Events of one device are consumed in order by its single consumer task.
//! The two directions are not serialised against each other; the last write
//! wins. Nothing suppresses echoes either: a color set from the fabric comes
//! back as a color update from the light, and the accessory only changes if
//! the converted value differs from what it already shows.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::color;
use crate::config::BridgeConfig;
use crate::errors::Error;
use crate::registry::{Registry, Ticket};
use crate::transport::{
    Accessory, AccessoryEvent, AccessoryHandler, AccessoryInfo, AccessoryServer,
    AccessoryTransport, LightDevice, LightEvent, Subscription,
};
use crate::types::{AccessoryColor, DeviceId, SubscriptionId};

type Result<T> = std::result::Result<T, Error>;

/// Everything the bridge holds open for one registered device.
pub struct BridgedLight<L, S: AccessoryServer> {
    light: L,
    label: String,
    accessory: Arc<S::Accessory>,
    transport: Arc<S::Transport>,
    subscription: SubscriptionId,
    event_task: JoinHandle<()>,
    transport_task: JoinHandle<()>,
}

impl<L: LightDevice, S: AccessoryServer> BridgedLight<L, S> {
    pub fn id(&self) -> DeviceId {
        self.light.id()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn light(&self) -> &L {
        &self.light
    }

    pub fn accessory(&self) -> &Arc<S::Accessory> {
        &self.accessory
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Close the light subscription, then stop the accessory transport.
    async fn close(&self) {
        self.accessory.clear_handler();
        if let Err(e) = self.light.close_subscription(self.subscription).await {
            warn!(
                "Closing subscription {} of light {}: {}",
                self.subscription,
                self.id(),
                e
            );
        }
        self.event_task.abort();
        self.transport.stop().await;
        self.transport_task.abort();
    }

    fn snapshot(&self) -> LightSnapshot {
        LightSnapshot {
            id: self.id().to_string(),
            label: (!self.label.is_empty()).then(|| self.label.clone()),
            subscription: self.subscription.value(),
            on: self.accessory.is_on(),
            color: read_color(&*self.accessory),
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize)]
struct LightSnapshot {
    id: String,
    label: Option<String>,
    subscription: u64,
    on: bool,
    color: AccessoryColor,
}

#[derive(Debug, Clone, Copy)]
struct RelaySettings {
    transition: Duration,
    identify_toggles: u32,
    identify_interval: Duration,
}

/// Bridges lights of type `L` into accessories built by `S`.
pub struct Bridge<L, S: AccessoryServer> {
    config: BridgeConfig,
    server: S,
    registry: Registry<BridgedLight<L, S>>,
}

impl<L: LightDevice, S: AccessoryServer> Bridge<L, S> {
    pub fn new(config: BridgeConfig, server: S) -> Self {
        Bridge {
            config,
            server,
            registry: Registry::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn registry(&self) -> &Registry<BridgedLight<L, S>> {
        &self.registry
    }

    /// Claim `id` before registering it, see [`Registry::reserve`].
    pub fn reserve(&self, id: DeviceId) -> Option<Ticket> {
        self.registry.reserve(id)
    }

    /// Drop a reservation whose registration will not happen.
    pub fn cancel(&self, id: DeviceId, ticket: Ticket) {
        self.registry.release(id, ticket);
    }

    /// Reserve and register `light` in one step.
    ///
    /// Registering a device that is already bridged is a no-op.
    pub async fn handle_new_light(self: &Arc<Self>, light: L) -> Result<()> {
        match self.reserve(light.id()) {
            Some(ticket) => self.add_light(ticket, light).await,
            None => Ok(()),
        }
    }

    /// Bridge `light` into the accessory fabric under the reservation `ticket`.
    ///
    /// On error nothing stays open and the reservation is released. If the
    /// device disappeared while this was running, everything opened here is
    /// closed again and `Ok` is returned.
    pub async fn add_light(self: &Arc<Self>, ticket: Ticket, light: L) -> Result<()> {
        let id = light.id();
        match self.open(ticket, light).await {
            Ok(bridged) => match self.registry.register(id, ticket, bridged) {
                Ok(bridged) => {
                    info!("Added light [{}] ({})", bridged.label(), id);
                    Ok(())
                }
                Err(bridged) => {
                    info!("Light {} went away during registration", id);
                    bridged.close().await;
                    Ok(())
                }
            },
            Err(e) => {
                self.registry.release(id, ticket);
                Err(e)
            }
        }
    }

    /// Tear down the bridge for `id`.
    ///
    /// Returns `false` for devices that were never registered.
    pub async fn remove_light(&self, id: DeviceId) -> bool {
        let Some(bridged) = self.registry.unregister(id) else {
            return false;
        };
        info!("Removing light [{}] ({})", bridged.label(), id);
        bridged.close().await;
        true
    }

    /// Tear down every bridged device and cancel pending registrations.
    pub async fn remove_all(&self) {
        let bridged = self.registry.drain();
        if !bridged.is_empty() {
            info!("Removing {} light(s)", bridged.len());
        }
        join_all(bridged.iter().map(|(_, bridged)| bridged.close())).await;
    }

    /// Returns a snapshot of every bridged device.
    pub fn diagnostics(&self) -> Value {
        let lights: Vec<Value> = self
            .registry
            .all()
            .iter()
            .map(|(_, bridged)| serde_json::to_value(bridged.snapshot()).unwrap_or(Value::Null))
            .collect();
        json!({
            "manufacturer": self.config.manufacturer,
            "pending": self.registry.pending(),
            "lights": lights,
        })
    }

    async fn open(self: &Arc<Self>, ticket: Ticket, light: L) -> Result<BridgedLight<L, S>> {
        let id = light.id();
        let subscription = light.subscribe().await.inspect_err(|e| {
            error!("Subscribing to events of light {}: {}", id, e);
        })?;
        let subscription_id = subscription.id();

        let label = light.label().await.unwrap_or_else(|e| {
            warn!("Getting label of light {}: {}", id, e);
            String::new()
        });
        info!("Adding light [{}]", label);

        let accessory = self.server.create_light_bulb(AccessoryInfo {
            name: if label.is_empty() { id.to_string() } else { label.clone() },
            manufacturer: self.config.manufacturer.clone(),
            serial_number: id.to_string(),
        });

        // Failures leave the accessory at its defaults.
        let _ = sync_power(&light, &*accessory).await;
        let _ = sync_color(&light, &*accessory).await;

        accessory.set_handler(accessory_handler(
            light.clone(),
            Arc::downgrade(&accessory),
            self.relay_settings(),
        ));

        let event_task = tokio::spawn(relay_light_events(
            light.clone(),
            Arc::clone(&accessory),
            subscription,
        ));

        let transport = match self
            .server
            .create_transport(&self.config.pin, Arc::clone(&accessory))
        {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                error!("Creating accessory transport for light {}: {}", id, e);
                accessory.clear_handler();
                if let Err(e) = light.close_subscription(subscription_id).await {
                    warn!("Closing subscription {} of light {}: {}", subscription_id, id, e);
                }
                event_task.abort();
                return Err(e);
            }
        };

        let transport_task = tokio::spawn(serve_transport(
            Arc::downgrade(self),
            id,
            ticket,
            Arc::clone(&transport),
        ));

        Ok(BridgedLight {
            light,
            label,
            accessory,
            transport,
            subscription: subscription_id,
            event_task,
            transport_task,
        })
    }

    fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            transition: self.config.transition,
            identify_toggles: self.config.identify_toggles,
            identify_interval: self.config.identify_interval,
        }
    }
}

/// Serve the accessory until stopped. A transport that fails drops its device.
async fn serve_transport<L: LightDevice, S: AccessoryServer>(
    bridge: Weak<Bridge<L, S>>,
    id: DeviceId,
    ticket: Ticket,
    transport: Arc<S::Transport>,
) {
    if let Err(e) = transport.start().await {
        error!("Accessory transport of light {} failed: {}", id, e);
        let Some(bridge) = bridge.upgrade() else {
            return;
        };
        if let Some(bridged) = bridge.registry.release(id, ticket) {
            info!("Dropping light [{}] ({})", bridged.label(), id);
            bridged.accessory.clear_handler();
            if let Err(e) = bridged.light.close_subscription(bridged.subscription).await {
                warn!("Closing subscription {} of light {}: {}", bridged.subscription, id, e);
            }
            bridged.event_task.abort();
        }
    }
}

/// Consume the light's events until its subscription closes.
async fn relay_light_events<L: LightDevice, A: Accessory>(
    light: L,
    accessory: Arc<A>,
    mut subscription: Subscription<LightEvent>,
) {
    let id = light.id();
    while let Some(event) = subscription.recv().await {
        match event {
            LightEvent::UpdateColor => {
                info!("Light: {}, Event: Update Color", id);
                let _ = sync_color(&light, &*accessory).await;
            }
            LightEvent::UpdatePower => {
                info!("Light: {}, Event: Update Power", id);
                let _ = sync_power(&light, &*accessory).await;
            }
            LightEvent::UpdateLabel(label) => {
                // The accessory fabric offers no rename.
                info!("Light: {}, Event: Update Label [{}]", id, label);
            }
            LightEvent::Unrecognized(event) => {
                debug!("Unhandled event on light {}: {}", id, event);
            }
        }
    }
    debug!("Event stream of light {} closed", id);
}

fn accessory_handler<L: LightDevice, A: Accessory>(
    light: L,
    accessory: Weak<A>,
    settings: RelaySettings,
) -> AccessoryHandler {
    let runtime = Handle::current();
    Box::new(move |event| {
        let Some(accessory) = accessory.upgrade() else {
            return;
        };
        let light = light.clone();
        runtime.spawn(async move {
            handle_accessory_event(&light, &*accessory, event, settings).await;
        });
    })
}

async fn handle_accessory_event<L: LightDevice, A: Accessory>(
    light: &L,
    accessory: &A,
    event: AccessoryEvent,
    settings: RelaySettings,
) {
    let id = light.id();
    debug!("Light: {}, Accessory event: {}", id, event);
    let result = match event {
        AccessoryEvent::PowerChanged(on) => light.set_power(on).await,
        AccessoryEvent::HueChanged(_)
        | AccessoryEvent::SaturationChanged(_)
        | AccessoryEvent::BrightnessChanged(_) => {
            // The light only takes full colors, so send every component.
            let current = read_color(accessory);
            let converted = color::to_lighting(&current);
            info!(
                "Light: {}, Hue: {} => {}, Saturation: {} => {}, Brightness: {} => {}",
                id,
                current.hue,
                converted.hue,
                current.saturation,
                converted.saturation,
                current.brightness,
                converted.brightness
            );
            light.set_color(converted, settings.transition).await
        }
        AccessoryEvent::Identify => {
            identify(light, settings.identify_toggles, settings.identify_interval).await;
            Ok(())
        }
    };
    if let Err(e) = result {
        error!("Relaying {} to light {}: {}", event, id, e);
    }
}

/// Blink the light by toggling its power `toggles` times.
async fn identify<L: LightDevice>(light: &L, toggles: u32, interval: Duration) {
    for _ in 0..toggles {
        if let Err(e) = toggle(light).await {
            warn!("Toggling light {}: {}", light.id(), e);
        }
        tokio::time::sleep(interval).await;
    }
}

async fn toggle<L: LightDevice>(light: &L) -> Result<()> {
    let on = light.power().await?;
    light.set_power(!on).await
}

async fn sync_power<L: LightDevice, A: Accessory>(light: &L, accessory: &A) -> Result<()> {
    let on = light.power().await.inspect_err(|e| {
        error!("Getting power state of light {}: {}", light.id(), e);
    })?;
    apply_power(accessory, on);
    Ok(())
}

async fn sync_color<L: LightDevice, A: Accessory>(light: &L, accessory: &A) -> Result<()> {
    let current = light.color().await.inspect_err(|e| {
        error!("Getting color state of light {}: {}", light.id(), e);
    })?;
    let converted = color::to_accessory(&current);
    debug!(
        "Light: {}, Hue: {} => {}, Saturation: {} => {}, Brightness: {} => {}",
        light.id(),
        current.hue,
        converted.hue,
        current.saturation,
        converted.saturation,
        current.brightness,
        converted.brightness
    );
    apply_color(accessory, &converted);
    Ok(())
}

fn read_color<A: Accessory>(accessory: &A) -> AccessoryColor {
    AccessoryColor::new(
        accessory.hue(),
        accessory.saturation(),
        accessory.brightness(),
    )
}

/// Write only the components that differ. Returns whether anything changed.
fn apply_color<A: Accessory>(accessory: &A, color: &AccessoryColor) -> bool {
    let mut changed = false;
    if accessory.hue() != color.hue {
        accessory.set_hue(color.hue);
        changed = true;
    }
    if accessory.saturation() != color.saturation {
        accessory.set_saturation(color.saturation);
        changed = true;
    }
    if accessory.brightness() != color.brightness {
        accessory.set_brightness(color.brightness);
        changed = true;
    }
    changed
}

fn apply_power<A: Accessory>(accessory: &A, on: bool) -> bool {
    if accessory.is_on() == on {
        return false;
    }
    accessory.set_on(on);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimAccessory, SimAccessoryServer, SimLight};
    use crate::types::Hsbk;

    type TestBridge = Bridge<SimLight, SimAccessoryServer>;

    fn config() -> BridgeConfig {
        BridgeConfig::new("12345678".parse().unwrap())
            .with_transition(Duration::from_millis(250))
            .with_identify(4, Duration::from_millis(10))
    }

    fn bridge(server: SimAccessoryServer) -> Arc<TestBridge> {
        Arc::new(Bridge::new(config(), server))
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    fn only_accessory(server: &SimAccessoryServer) -> Arc<SimAccessory> {
        let accessories = server.accessories();
        assert_eq!(accessories.len(), 1);
        Arc::clone(&accessories[0])
    }

    #[tokio::test]
    async fn test_registration_populates_accessory() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(1), "Desk");
        light.device_set_power(true);
        light.device_set_color(Hsbk::new(u16::MAX, 32768, 0));

        bridge.handle_new_light(light.clone()).await.unwrap();

        let accessory = only_accessory(&server);
        assert_eq!(accessory.info().name, "Desk");
        assert_eq!(accessory.info().manufacturer, "LIFX");
        assert_eq!(accessory.info().serial_number, "000000000001");
        assert!(accessory.is_on());
        assert_eq!(accessory.hue(), 360.0);
        assert_eq!(accessory.brightness(), 0.0);
        assert_eq!(light.open_subscriptions(), 1);
        assert_eq!(bridge.registry().len(), 1);
        eventually(|| server.running_transports() == 1).await;
    }

    #[tokio::test]
    async fn test_read_failure_keeps_defaults() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(2), "Hall");
        light.device_set_power(true);
        light.fail_reads(true);

        bridge.handle_new_light(light.clone()).await.unwrap();

        let accessory = only_accessory(&server);
        assert!(!accessory.is_on());
        assert_eq!(accessory.hue(), 0.0);
        assert_eq!(bridge.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_failure_aborts_registration() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(3), "Porch");
        light.fail_subscribe(true);

        assert!(bridge.handle_new_light(light.clone()).await.is_err());
        assert!(bridge.registry().is_empty());
        assert_eq!(bridge.registry().pending(), 0);
        assert!(server.accessories().is_empty());
    }

    #[tokio::test]
    async fn test_transport_creation_failure_skips_device() {
        let server = SimAccessoryServer::new();
        server.fail_transport_creation(true);
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(4), "Garage");

        assert!(bridge.handle_new_light(light.clone()).await.is_err());
        assert!(bridge.registry().is_empty());
        assert_eq!(light.open_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_transport_start_failure_drops_device() {
        let server = SimAccessoryServer::new();
        server.fail_transport_start(true);
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(5), "Attic");

        bridge.handle_new_light(light.clone()).await.unwrap();

        eventually(|| bridge.registry().is_empty() && light.open_subscriptions() == 0).await;
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_noop() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(6), "Den");

        bridge.handle_new_light(light.clone()).await.unwrap();
        bridge.handle_new_light(light.clone()).await.unwrap();

        assert_eq!(bridge.registry().len(), 1);
        assert_eq!(light.open_subscriptions(), 1);
        assert_eq!(server.accessories().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_is_noop() {
        let bridge = bridge(SimAccessoryServer::new());
        assert!(!bridge.remove_light(DeviceId::new(42)).await);
        assert!(bridge.registry().is_empty());
    }

    #[tokio::test]
    async fn test_remove_releases_everything() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(7), "Loft");
        bridge.handle_new_light(light.clone()).await.unwrap();
        eventually(|| server.running_transports() == 1).await;

        assert!(bridge.remove_light(light.id()).await);

        assert!(bridge.registry().is_empty());
        assert_eq!(light.open_subscriptions(), 0);
        eventually(|| server.running_transports() == 0).await;
    }

    #[tokio::test]
    async fn test_disappear_during_registration_leaks_nothing() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(8), "Study");
        light.set_read_delay(Duration::from_millis(100));

        let ticket = bridge.reserve(light.id()).unwrap();
        let registration = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            let light = light.clone();
            async move { bridge.add_light(ticket, light).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!bridge.remove_light(light.id()).await);

        registration.await.unwrap().unwrap();
        assert!(bridge.registry().is_empty());
        assert_eq!(bridge.registry().pending(), 0);
        assert_eq!(light.open_subscriptions(), 0);
        eventually(|| server.running_transports() == 0).await;
    }

    #[tokio::test]
    async fn test_light_updates_reach_accessory() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(9), "Kitchen");
        bridge.handle_new_light(light.clone()).await.unwrap();
        let accessory = only_accessory(&server);

        light.device_set_power(true);
        light.device_set_color(Hsbk::new(0, u16::MAX, u16::MAX));

        eventually(|| {
            accessory.is_on() && accessory.saturation() == 100.0 && accessory.brightness() == 100.0
        })
        .await;
    }

    #[tokio::test]
    async fn test_label_update_does_not_rename() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(10), "Old");
        bridge.handle_new_light(light.clone()).await.unwrap();

        light.device_set_label("New");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(only_accessory(&server).info().name, "Old");
    }

    #[tokio::test]
    async fn test_accessory_power_reaches_light() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(11), "Bath");
        bridge.handle_new_light(light.clone()).await.unwrap();

        only_accessory(&server).remote_set_on(true);

        eventually(|| light.power_state()).await;
    }

    #[tokio::test]
    async fn test_accessory_color_sends_full_tuple() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(12), "Office");
        bridge.handle_new_light(light.clone()).await.unwrap();
        let accessory = only_accessory(&server);

        accessory.remote_set_hue(180.0);
        accessory.remote_set_saturation(50.0);
        accessory.remote_set_brightness(75.0);

        eventually(|| light.color_state() == Hsbk::new(32768, 32768, 49151)).await;
        for (color, transition) in light.color_writes() {
            assert_eq!(color.kelvin.kelvin(), 3500);
            assert_eq!(transition, Duration::from_millis(250));
        }
    }

    #[tokio::test]
    async fn test_relay_converges() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(13), "Nook");
        bridge.handle_new_light(light.clone()).await.unwrap();
        let accessory = only_accessory(&server);

        accessory.remote_set_hue(90.0);
        eventually(|| light.color_state().hue == 16384).await;
        eventually(|| (accessory.hue() - 90.0).abs() <= 360.0 / 65535.0).await;

        let writes = light.color_writes().len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(light.color_writes().len(), writes);
    }

    #[tokio::test]
    async fn test_identify_blinks() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let light = SimLight::new(DeviceId::new(14), "Lamp");
        bridge.handle_new_light(light.clone()).await.unwrap();

        only_accessory(&server).remote_identify();

        eventually(|| light.power_writes().len() == 4).await;
        assert_eq!(light.power_writes(), vec![true, false, true, false]);
        assert!(!light.power_state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_identify_toggles_are_spaced_by_interval() {
        let server = SimAccessoryServer::new();
        let interval = Duration::from_secs(1);
        let bridge = Arc::new(Bridge::new(
            config().with_identify(4, interval),
            server.clone(),
        ));
        let light = SimLight::new(DeviceId::new(15), "Globe");
        bridge.handle_new_light(light.clone()).await.unwrap();

        only_accessory(&server).remote_identify();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let times = light.power_write_times();
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], interval);
        }
    }

    #[tokio::test]
    async fn test_apply_color_is_idempotent() {
        let accessory = SimAccessory::new(AccessoryInfo {
            name: "Spot".into(),
            manufacturer: "LIFX".into(),
            serial_number: "1".into(),
        });
        let color = AccessoryColor::new(120.0, 40.0, 60.0);

        assert!(apply_color(&accessory, &color));
        let writes = accessory.local_writes();
        assert!(!apply_color(&accessory, &color));
        assert_eq!(accessory.local_writes(), writes);
        assert_eq!(read_color(&accessory), color);
    }

    #[tokio::test]
    async fn test_remove_all_and_diagnostics() {
        let server = SimAccessoryServer::new();
        let bridge = bridge(server.clone());
        let lights: Vec<_> = (20..23)
            .map(|id| SimLight::new(DeviceId::new(id), "Strip"))
            .collect();
        for light in &lights {
            bridge.handle_new_light(light.clone()).await.unwrap();
        }

        let diag = bridge.diagnostics();
        assert_eq!(diag["lights"].as_array().unwrap().len(), 3);
        assert_eq!(diag["lights"][0]["id"], "000000000014");
        assert_eq!(diag["lights"][0]["label"], "Strip");

        bridge.remove_all().await;
        assert!(bridge.registry().is_empty());
        assert!(lights.iter().all(|light| light.open_subscriptions() == 0));
    }
}
