//! In-memory implementations of both transports.
//!
//! [`SimNetwork`] plays the lighting network: lights are added and removed by
//! hand and every client subscription receives the matching discovery events.
//! [`SimAccessoryServer`] plays the accessory fabric: `remote_*` methods on a
//! [`SimAccessory`] act like a controller changing a value, which is the only
//! way the bridge's handler gets invoked.
//!
//! Failure switches on each type make error paths reachable in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;

use crate::errors::Error;
use crate::transport::{
    Accessory, AccessoryEvent, AccessoryHandler, AccessoryInfo, AccessoryServer,
    AccessoryTransport, ClientEvent, LightDevice, LightEvent, LightingClient, LightingConnector,
    Subscription,
};
use crate::types::{DeliveryMode, DeviceId, Hsbk, Pin, SubscriptionId};

type Result<T> = std::result::Result<T, Error>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out of events to every open subscription.
#[derive(Debug)]
struct Subscribers<E> {
    next_id: AtomicU64,
    senders: Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<E>>>,
}

impl<E: Clone> Subscribers<E> {
    fn new() -> Self {
        Subscribers {
            next_id: AtomicU64::new(1),
            senders: Mutex::new(HashMap::new()),
        }
    }

    fn open(&self) -> Subscription<E> {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.senders).insert(id, tx);
        Subscription::new(id, rx)
    }

    fn close(&self, id: SubscriptionId) -> Result<()> {
        lock(&self.senders)
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::SubscriptionClosed(id))
    }

    fn close_all(&self) {
        lock(&self.senders).clear();
    }

    fn emit(&self, event: E) {
        lock(&self.senders).retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    fn len(&self) -> usize {
        lock(&self.senders).len()
    }
}

#[derive(Debug)]
struct LightState {
    label: String,
    power: bool,
    color: Hsbk,
    power_writes: Vec<(bool, Instant)>,
    color_writes: Vec<(Hsbk, Duration)>,
}

#[derive(Debug)]
struct LightInner {
    id: DeviceId,
    state: Mutex<LightState>,
    subscribers: Subscribers<LightEvent>,
    read_delay: Mutex<Duration>,
    timeout: Arc<Mutex<Option<Duration>>>,
    fail_reads: AtomicBool,
    fail_subscribe: AtomicBool,
}

/// A simulated light. Clones share the same device.
#[derive(Debug, Clone)]
pub struct SimLight {
    inner: Arc<LightInner>,
}

impl SimLight {
    /// A light that is off, at zero color and default temperature.
    pub fn new(id: DeviceId, label: &str) -> Self {
        Self::with_timeout(id, label, Arc::new(Mutex::new(None)))
    }

    fn with_timeout(id: DeviceId, label: &str, timeout: Arc<Mutex<Option<Duration>>>) -> Self {
        SimLight {
            inner: Arc::new(LightInner {
                id,
                state: Mutex::new(LightState {
                    label: label.to_string(),
                    power: false,
                    color: Hsbk::default(),
                    power_writes: Vec::new(),
                    color_writes: Vec::new(),
                }),
                subscribers: Subscribers::new(),
                read_delay: Mutex::new(Duration::ZERO),
                timeout,
                fail_reads: AtomicBool::new(false),
                fail_subscribe: AtomicBool::new(false),
            }),
        }
    }

    /// Change power at the device, as a wall switch would.
    pub fn device_set_power(&self, on: bool) {
        lock(&self.inner.state).power = on;
        self.inner.subscribers.emit(LightEvent::UpdatePower);
    }

    pub fn device_set_color(&self, color: Hsbk) {
        lock(&self.inner.state).color = color;
        self.inner.subscribers.emit(LightEvent::UpdateColor);
    }

    pub fn device_set_label(&self, label: &str) {
        lock(&self.inner.state).label = label.to_string();
        self.inner
            .subscribers
            .emit(LightEvent::UpdateLabel(label.to_string()));
    }

    /// Emit an arbitrary event on every subscription of this light.
    pub fn emit(&self, event: LightEvent) {
        self.inner.subscribers.emit(event);
    }

    /// Delay every read (label, power, color) by `delay`.
    pub fn set_read_delay(&self, delay: Duration) {
        *lock(&self.inner.read_delay) = delay;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.inner.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn power_state(&self) -> bool {
        lock(&self.inner.state).power
    }

    pub fn color_state(&self) -> Hsbk {
        lock(&self.inner.state).color
    }

    /// Every power value written through [`LightDevice::set_power`].
    pub fn power_writes(&self) -> Vec<bool> {
        lock(&self.inner.state)
            .power_writes
            .iter()
            .map(|(on, _)| *on)
            .collect()
    }

    /// When each power write happened, on the tokio clock.
    pub fn power_write_times(&self) -> Vec<Instant> {
        lock(&self.inner.state)
            .power_writes
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    /// Every color written through [`LightDevice::set_color`], with its transition.
    pub fn color_writes(&self) -> Vec<(Hsbk, Duration)> {
        lock(&self.inner.state).color_writes.clone()
    }

    pub fn open_subscriptions(&self) -> usize {
        self.inner.subscribers.len()
    }

    async fn read<T>(&self, action: &str, read: impl FnOnce(&LightState) -> T) -> Result<T> {
        let delay = *lock(&self.inner.read_delay);
        let timeout = *lock(&self.inner.timeout);
        let wait = tokio::time::sleep(delay);
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait)
                .await
                .map_err(|_| Error::timeout(action))?,
            None => wait.await,
        }
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::lighting(action, "no response"));
        }
        Ok(read(&lock(&self.inner.state)))
    }
}

impl LightDevice for SimLight {
    fn id(&self) -> DeviceId {
        self.inner.id
    }

    async fn label(&self) -> Result<String> {
        self.read("get label", |state| state.label.clone()).await
    }

    async fn power(&self) -> Result<bool> {
        self.read("get power", |state| state.power).await
    }

    async fn set_power(&self, on: bool) -> Result<()> {
        {
            let mut state = lock(&self.inner.state);
            state.power = on;
            state.power_writes.push((on, Instant::now()));
        }
        self.inner.subscribers.emit(LightEvent::UpdatePower);
        Ok(())
    }

    async fn color(&self) -> Result<Hsbk> {
        self.read("get color", |state| state.color).await
    }

    async fn set_color(&self, color: Hsbk, transition: Duration) -> Result<()> {
        {
            let mut state = lock(&self.inner.state);
            state.color = color;
            state.color_writes.push((color, transition));
        }
        self.inner.subscribers.emit(LightEvent::UpdateColor);
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription<LightEvent>> {
        if self.inner.fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::lighting("subscribe", "subscription refused"));
        }
        Ok(self.inner.subscribers.open())
    }

    async fn close_subscription(&self, id: SubscriptionId) -> Result<()> {
        self.inner.subscribers.close(id)
    }
}

#[derive(Debug)]
struct NetworkInner {
    lights: Mutex<HashMap<DeviceId, SimLight>>,
    added: Mutex<Vec<SimLight>>,
    subscribers: Subscribers<ClientEvent>,
    timeout: Arc<Mutex<Option<Duration>>>,
    discovery_interval: Mutex<Option<Duration>>,
    delivery_mode: Mutex<Option<DeliveryMode>>,
    failing_connects: AtomicU32,
    connect_attempts: AtomicU32,
    open_clients: AtomicUsize,
}

/// A simulated lighting network. Clones share the same network.
#[derive(Debug, Clone)]
pub struct SimNetwork {
    inner: Arc<NetworkInner>,
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl SimNetwork {
    pub fn new() -> Self {
        SimNetwork {
            inner: Arc::new(NetworkInner {
                lights: Mutex::new(HashMap::new()),
                added: Mutex::new(Vec::new()),
                subscribers: Subscribers::new(),
                timeout: Arc::new(Mutex::new(None)),
                discovery_interval: Mutex::new(None),
                delivery_mode: Mutex::new(None),
                failing_connects: AtomicU32::new(0),
                connect_attempts: AtomicU32::new(0),
                open_clients: AtomicUsize::new(0),
            }),
        }
    }

    /// Power up a light and announce it to every client subscription.
    pub fn add_light(&self, id: DeviceId, label: &str) -> SimLight {
        let light = SimLight::with_timeout(id, label, Arc::clone(&self.inner.timeout));
        lock(&self.inner.lights).insert(id, light.clone());
        lock(&self.inner.added).push(light.clone());
        self.announce(id);
        light
    }

    /// Unplug a light: it expires and drops every subscription on it.
    pub fn remove_light(&self, id: DeviceId) {
        if let Some(light) = lock(&self.inner.lights).remove(&id) {
            light.inner.subscribers.close_all();
        }
        self.emit(ClientEvent::ExpiredDevice(id));
    }

    /// Announce `id` again, as a later discovery scan would.
    pub fn announce(&self, id: DeviceId) {
        self.emit(ClientEvent::NewDevice(id));
    }

    pub fn emit(&self, event: ClientEvent) {
        debug!("Simulated network event: {:?}", event);
        self.inner.subscribers.emit(event);
    }

    pub fn light(&self, id: DeviceId) -> Option<SimLight> {
        lock(&self.inner.lights).get(&id).cloned()
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_connects(&self, count: u32) {
        self.inner.failing_connects.store(count, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn open_clients(&self) -> usize {
        self.inner.open_clients.load(Ordering::SeqCst)
    }

    pub fn open_client_subscriptions(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Open subscriptions summed over every light ever added.
    pub fn open_light_subscriptions(&self) -> usize {
        lock(&self.inner.added)
            .iter()
            .map(SimLight::open_subscriptions)
            .sum()
    }

    pub fn discovery_interval(&self) -> Option<Duration> {
        *lock(&self.inner.discovery_interval)
    }

    pub fn timeout(&self) -> Option<Duration> {
        *lock(&self.inner.timeout)
    }

    pub fn delivery_mode(&self) -> Option<DeliveryMode> {
        *lock(&self.inner.delivery_mode)
    }
}

impl LightingConnector for SimNetwork {
    type Client = SimClient;

    async fn connect(&self, mode: DeliveryMode) -> Result<SimClient> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self.inner.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.inner
                .failing_connects
                .store(failing - 1, Ordering::SeqCst);
            return Err(Error::lighting("connect", "network unreachable"));
        }
        *lock(&self.inner.delivery_mode) = Some(mode);
        self.inner.open_clients.fetch_add(1, Ordering::SeqCst);
        Ok(SimClient {
            network: self.clone(),
            closed: AtomicBool::new(false),
        })
    }
}

/// Client connection to a [`SimNetwork`].
#[derive(Debug)]
pub struct SimClient {
    network: SimNetwork,
    closed: AtomicBool,
}

impl SimClient {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::NotConnected)
        } else {
            Ok(())
        }
    }
}

impl LightingClient for SimClient {
    type Light = SimLight;

    async fn subscribe(&self) -> Result<Subscription<ClientEvent>> {
        self.ensure_open()?;
        Ok(self.network.inner.subscribers.open())
    }

    async fn close_subscription(&self, id: SubscriptionId) -> Result<()> {
        self.network.inner.subscribers.close(id)
    }

    async fn light(&self, id: DeviceId) -> Result<SimLight> {
        self.ensure_open()?;
        self.network.light(id).ok_or(Error::DeviceNotFound(id))
    }

    fn set_discovery_interval(&self, interval: Duration) {
        *lock(&self.network.inner.discovery_interval) = Some(interval);
    }

    fn set_timeout(&self, timeout: Duration) {
        *lock(&self.network.inner.timeout) = Some(timeout);
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        self.network.inner.open_clients.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct AccessoryState {
    on: bool,
    hue: f64,
    saturation: f64,
    brightness: f64,
}

/// A simulated light bulb accessory.
pub struct SimAccessory {
    info: AccessoryInfo,
    state: Mutex<AccessoryState>,
    handler: Mutex<Option<Arc<dyn Fn(AccessoryEvent) + Send + Sync>>>,
    local_writes: AtomicUsize,
}

impl SimAccessory {
    pub fn new(info: AccessoryInfo) -> Self {
        SimAccessory {
            info,
            state: Mutex::new(AccessoryState::default()),
            handler: Mutex::new(None),
            local_writes: AtomicUsize::new(0),
        }
    }

    /// Number of values written through the [`Accessory`] setters.
    pub fn local_writes(&self) -> usize {
        self.local_writes.load(Ordering::SeqCst)
    }

    pub fn has_handler(&self) -> bool {
        lock(&self.handler).is_some()
    }

    pub fn remote_set_on(&self, on: bool) {
        lock(&self.state).on = on;
        self.notify(AccessoryEvent::PowerChanged(on));
    }

    pub fn remote_set_hue(&self, hue: f64) {
        lock(&self.state).hue = hue;
        self.notify(AccessoryEvent::HueChanged(hue));
    }

    pub fn remote_set_saturation(&self, saturation: f64) {
        lock(&self.state).saturation = saturation;
        self.notify(AccessoryEvent::SaturationChanged(saturation));
    }

    pub fn remote_set_brightness(&self, brightness: f64) {
        lock(&self.state).brightness = brightness;
        self.notify(AccessoryEvent::BrightnessChanged(brightness));
    }

    pub fn remote_identify(&self) {
        self.notify(AccessoryEvent::Identify);
    }

    fn notify(&self, event: AccessoryEvent) {
        let handler = lock(&self.handler).clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    fn write(&self, update: impl FnOnce(&mut AccessoryState)) {
        update(&mut lock(&self.state));
        self.local_writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Accessory for SimAccessory {
    fn info(&self) -> &AccessoryInfo {
        &self.info
    }

    fn is_on(&self) -> bool {
        lock(&self.state).on
    }

    fn set_on(&self, on: bool) {
        self.write(|state| state.on = on);
    }

    fn hue(&self) -> f64 {
        lock(&self.state).hue
    }

    fn set_hue(&self, hue: f64) {
        self.write(|state| state.hue = hue);
    }

    fn saturation(&self) -> f64 {
        lock(&self.state).saturation
    }

    fn set_saturation(&self, saturation: f64) {
        self.write(|state| state.saturation = saturation);
    }

    fn brightness(&self) -> f64 {
        lock(&self.state).brightness
    }

    fn set_brightness(&self, brightness: f64) {
        self.write(|state| state.brightness = brightness);
    }

    fn set_handler(&self, handler: AccessoryHandler) {
        *lock(&self.handler) = Some(Arc::from(handler));
    }

    fn clear_handler(&self) {
        *lock(&self.handler) = None;
    }
}

#[derive(Debug, Default)]
struct TransportShared {
    running: AtomicBool,
    stop: Notify,
}

/// Marks a transport as running for as long as its `start` future lives.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Transport publishing a [`SimAccessory`].
pub struct SimTransport {
    serial_number: String,
    shared: Arc<TransportShared>,
    fail_start: bool,
}

impl AccessoryTransport for SimTransport {
    async fn start(&self) -> Result<()> {
        if self.fail_start {
            return Err(Error::accessory("start", "address in use"));
        }
        self.shared.running.store(true, Ordering::SeqCst);
        let _running = RunningGuard(&self.shared.running);
        debug!("Serving accessory {}", self.serial_number);
        self.shared.stop.notified().await;
        Ok(())
    }

    async fn stop(&self) {
        self.shared.stop.notify_one();
    }
}

#[derive(Default)]
struct ServerInner {
    accessories: Mutex<Vec<Arc<SimAccessory>>>,
    transports: Mutex<Vec<Arc<TransportShared>>>,
    pins: Mutex<Vec<String>>,
    fail_creation: AtomicBool,
    fail_start: AtomicBool,
    terminating: AtomicBool,
    terminate: Notify,
}

/// A simulated accessory fabric. Clones share the same server.
#[derive(Clone, Default)]
pub struct SimAccessoryServer {
    inner: Arc<ServerInner>,
}

impl SimAccessoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every accessory created so far, in creation order.
    pub fn accessories(&self) -> Vec<Arc<SimAccessory>> {
        lock(&self.inner.accessories).clone()
    }

    pub fn accessory(&self, serial_number: &str) -> Option<Arc<SimAccessory>> {
        lock(&self.inner.accessories)
            .iter()
            .rev()
            .find(|accessory| accessory.info.serial_number == serial_number)
            .cloned()
    }

    pub fn running_transports(&self) -> usize {
        lock(&self.inner.transports)
            .iter()
            .filter(|transport| transport.running.load(Ordering::SeqCst))
            .count()
    }

    /// PINs handed to every transport created so far.
    pub fn pins(&self) -> Vec<String> {
        lock(&self.inner.pins).clone()
    }

    pub fn fail_transport_creation(&self, fail: bool) {
        self.inner.fail_creation.store(fail, Ordering::SeqCst);
    }

    pub fn fail_transport_start(&self, fail: bool) {
        self.inner.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Request process termination, as the fabric's termination hook would.
    pub fn terminate(&self) {
        self.inner.terminating.store(true, Ordering::SeqCst);
        self.inner.terminate.notify_waiters();
    }
}

impl AccessoryServer for SimAccessoryServer {
    type Accessory = SimAccessory;
    type Transport = SimTransport;

    fn create_light_bulb(&self, info: AccessoryInfo) -> Arc<SimAccessory> {
        let accessory = Arc::new(SimAccessory::new(info));
        lock(&self.inner.accessories).push(Arc::clone(&accessory));
        accessory
    }

    fn create_transport(&self, pin: &Pin, accessory: Arc<SimAccessory>) -> Result<SimTransport> {
        if self.inner.fail_creation.load(Ordering::SeqCst) {
            return Err(Error::accessory("create transport", "no free port"));
        }
        lock(&self.inner.pins).push(pin.as_str().to_string());
        let shared = Arc::new(TransportShared::default());
        lock(&self.inner.transports).push(Arc::clone(&shared));
        Ok(SimTransport {
            serial_number: accessory.info.serial_number.clone(),
            shared,
            fail_start: self.inner.fail_start.load(Ordering::SeqCst),
        })
    }

    async fn terminated(&self) {
        loop {
            let notified = self.inner.terminate.notified();
            if self.inner.terminating.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remove_light_closes_its_subscriptions() {
        let network = SimNetwork::new();
        let light = network.add_light(DeviceId::new(1), "Lamp");
        let mut subscription = light.subscribe().await.unwrap();
        assert_eq!(network.open_light_subscriptions(), 1);

        network.remove_light(light.id());

        assert_eq!(light.open_subscriptions(), 0);
        assert!(subscription.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_client_events_fan_out() {
        let network = SimNetwork::new();
        let client = network.connect(DeliveryMode::Reliable).await.unwrap();
        let mut first = client.subscribe().await.unwrap();
        let mut second = client.subscribe().await.unwrap();

        network.add_light(DeviceId::new(2), "Bulb");

        let expected = ClientEvent::NewDevice(DeviceId::new(2));
        assert_eq!(first.recv().await, Some(expected.clone()));
        assert_eq!(second.recv().await, Some(expected));
    }

    #[tokio::test]
    async fn test_closed_client_rejects_requests() {
        let network = SimNetwork::new();
        let client = network.connect(DeliveryMode::Reliable).await.unwrap();
        client.close().await.unwrap();
        assert_eq!(client.close().await, Err(Error::NotConnected));
        assert_eq!(network.open_clients(), 0);
        assert!(client.light(DeviceId::new(3)).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let network = SimNetwork::new();
        let client = network.connect(DeliveryMode::Reliable).await.unwrap();
        client.set_timeout(Duration::from_millis(50));
        let light = network.add_light(DeviceId::new(4), "Slow");
        light.set_read_delay(Duration::from_secs(1));

        assert_eq!(light.power().await, Err(Error::timeout("get power")));
    }

    #[tokio::test]
    async fn test_terminate_wakes_waiters() {
        let server = SimAccessoryServer::new();
        let waiter = tokio::spawn({
            let server = server.clone();
            async move { server.terminated().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        server.terminate();

        waiter.await.unwrap();
        // Waiting after the request returns at once.
        server.terminated().await;
    }

    #[tokio::test]
    async fn test_remote_changes_reach_handler_but_local_do_not() {
        let accessory = SimAccessory::new(AccessoryInfo {
            name: "Bulb".into(),
            manufacturer: "LIFX".into(),
            serial_number: "1".into(),
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        accessory.set_handler(Box::new(move |event| lock(&sink).push(event)));

        accessory.set_hue(10.0);
        accessory.remote_set_hue(20.0);
        accessory.remote_identify();

        assert_eq!(
            *lock(&seen),
            vec![AccessoryEvent::HueChanged(20.0), AccessoryEvent::Identify]
        );
        assert_eq!(accessory.hue(), 20.0);
        assert_eq!(accessory.local_writes(), 1);
    }
}
