//! Lighting network connection lifecycle and discovery event loop.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::errors::Error;
use crate::transport::{AccessoryServer, ClientEvent, LightingClient, LightingConnector, Subscription};
use crate::types::SubscriptionId;

type Result<T> = std::result::Result<T, Error>;

/// Light handle type produced by connector `N`.
pub type LightOf<N> = <<N as LightingConnector>::Client as LightingClient>::Light;

struct Connection<C> {
    client: Arc<C>,
    subscription: SubscriptionId,
    shutdown: Arc<Notify>,
    event_task: JoinHandle<()>,
}

/// Owns the connection to the lighting network and feeds discovery events
/// into a [`Bridge`].
///
/// # Example
///
/// ```
/// use light_bridge::sim::{SimAccessoryServer, SimNetwork};
/// use light_bridge::{BridgeConfig, DeviceId, DiscoveryController};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), light_bridge::Error> {
/// let network = SimNetwork::new();
/// let config = BridgeConfig::new("12345678".parse()?);
/// let mut controller = DiscoveryController::new(network.clone(), config, SimAccessoryServer::new());
///
/// controller.start().await?;
/// network.add_light(DeviceId::new(1), "Kitchen");
/// controller.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct DiscoveryController<N: LightingConnector, S: AccessoryServer> {
    connector: N,
    bridge: Arc<Bridge<LightOf<N>, S>>,
    connection: Option<Connection<N::Client>>,
}

impl<N: LightingConnector, S: AccessoryServer> DiscoveryController<N, S> {
    pub fn new(connector: N, config: BridgeConfig, server: S) -> Self {
        DiscoveryController {
            connector,
            bridge: Arc::new(Bridge::new(config, server)),
            connection: None,
        }
    }

    pub fn bridge(&self) -> &Arc<Bridge<LightOf<N>, S>> {
        &self.bridge
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Connect, subscribe to discovery events and start the event loop.
    ///
    /// A failed attempt is retried once after the configured backoff. If the
    /// retry fails too the error is returned and the controller stays
    /// disconnected; no further attempts are made.
    pub async fn start(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let config = self.bridge.config();
        let connection = match self.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(
                    "Connecting to the lighting network failed, retrying in {:?}: {}",
                    config.connect_retry_backoff, e
                );
                tokio::time::sleep(config.connect_retry_backoff).await;
                self.connect().await.inspect_err(|e| {
                    error!("Connecting to the lighting network failed, giving up: {}", e);
                })?
            }
        };

        connection
            .client
            .set_discovery_interval(config.discovery_interval);
        if let Some(timeout) = config.request_timeout {
            connection.client.set_timeout(timeout);
        }

        info!("Initiated lighting client");
        self.connection = Some(connection);
        Ok(())
    }

    /// Tear down every bridged device, then the subscription and the client.
    ///
    /// Safe to call repeatedly and without a prior successful [`start`](Self::start).
    pub async fn stop(&mut self) {
        let connection = self.connection.take();

        if let Some(connection) = &connection {
            connection.shutdown.notify_one();
        }
        if let Some(connection) = connection {
            if let Err(e) = connection.event_task.await {
                warn!("Discovery event loop ended abnormally: {}", e);
            }
            self.bridge.remove_all().await;
            if let Err(e) = connection
                .client
                .close_subscription(connection.subscription)
                .await
            {
                warn!("Closing client subscription: {}", e);
            }
            if let Err(e) = connection.client.close().await {
                warn!("Closing lighting client: {}", e);
            }
            info!("Closed lighting client");
        } else {
            self.bridge.remove_all().await;
        }
    }

    async fn connect(&self) -> Result<Connection<N::Client>> {
        let client = self
            .connector
            .connect(self.bridge.config().delivery_mode)
            .await
            .inspect_err(|e| error!("Creating lighting client: {}", e))?;

        let subscription = match client.subscribe().await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!("Subscribing to client events: {}", e);
                if let Err(e) = client.close().await {
                    warn!("Closing lighting client: {}", e);
                }
                return Err(e);
            }
        };

        let client = Arc::new(client);
        let shutdown = Arc::new(Notify::new());
        let subscription_id = subscription.id();
        let event_task = tokio::spawn(run_discovery_events(
            Arc::clone(&client),
            Arc::clone(&self.bridge),
            subscription,
            Arc::clone(&shutdown),
        ));

        Ok(Connection {
            client,
            subscription: subscription_id,
            shutdown,
            event_task,
        })
    }
}

/// Single consumer of the client-level subscription.
///
/// Reservations and removals happen inline so the registry sees discovery
/// events in order. Handle resolution and registration run in their own task
/// per device so slow device I/O never stalls discovery.
async fn run_discovery_events<C: LightingClient, S: AccessoryServer>(
    client: Arc<C>,
    bridge: Arc<Bridge<C::Light, S>>,
    mut subscription: Subscription<ClientEvent>,
    shutdown: Arc<Notify>,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.notified() => break,
            event = subscription.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            ClientEvent::NewDevice(id) => {
                let Some(ticket) = bridge.reserve(id) else {
                    continue;
                };
                let client = Arc::clone(&client);
                let bridge = Arc::clone(&bridge);
                tokio::spawn(async move {
                    match client.light(id).await {
                        Ok(light) => {
                            if let Err(e) = bridge.add_light(ticket, light).await {
                                warn!("Registering light {}: {}", id, e);
                            }
                        }
                        Err(e) => {
                            // It will be announced again on the next scan.
                            debug!("Resolving light {}: {}", id, e);
                            bridge.cancel(id, ticket);
                        }
                    }
                });
            }
            ClientEvent::ExpiredDevice(id) => {
                bridge.remove_light(id).await;
            }
            ClientEvent::Unrecognized(event) => {
                debug!("Unhandled event on client: {}", event);
            }
        }
    }
    debug!("Discovery event loop stopped");
}
