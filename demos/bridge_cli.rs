//! Run the bridge against a simulated lighting network.
//!
//! A few lights are added, then a background task keeps changing them so the
//! relay can be watched in the log. Ctrl-C, SIGTERM or a termination request
//! from the accessory fabric shut it down.
//!
//! Run with: cargo run --example bridge_cli -- --pin 12344321 --debug

use std::time::Duration;

use clap::Parser;
use light_bridge::sim::{SimAccessoryServer, SimNetwork};
use light_bridge::{
    AccessoryServer, BridgeConfig, DeliveryMode, DeviceId, DiscoveryController, Hsbk, Pin,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Bridge simulated smart lights into an accessory fabric", long_about = None)]
struct Cli {
    /// PIN used for pairing (must be 8 digits long)
    #[arg(long)]
    pin: Pin,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    debug: bool,

    /// Request timeout towards the lights in milliseconds (0: none)
    #[arg(long, default_value = "0")]
    timeout_ms: u64,

    /// Delivery mode of the lighting client (reliable, best-effort)
    #[arg(long, default_value = "reliable")]
    delivery: DeliveryMode,

    /// Number of simulated lights
    #[arg(long, default_value = "3")]
    lights: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();

    let config = BridgeConfig::new(cli.pin)
        .with_delivery_mode(cli.delivery)
        .with_request_timeout(Duration::from_millis(cli.timeout_ms));
    let grace = config.shutdown_grace;

    let network = SimNetwork::new();
    let server = SimAccessoryServer::new();
    let mut controller = DiscoveryController::new(network.clone(), config, server.clone());
    let fabric = server.clone();

    if let Err(e) = controller.start().await {
        log::warn!("Bridge started without a lighting client: {}", e);
    }

    let lights: Vec<_> = (1..=cli.lights)
        .map(|n| network.add_light(DeviceId::new(0xd073d5000000 + n), &format!("Light {}", n)))
        .collect();

    let activity = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let mut step: u16 = 0;
        loop {
            interval.tick().await;
            step = step.wrapping_add(1);
            for light in &lights {
                light.device_set_color(Hsbk::new(step.wrapping_mul(4096), u16::MAX, u16::MAX / 2));
            }
            if let Some(accessory) = server.accessories().first() {
                accessory.remote_set_on(step % 2 == 0);
            }
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => log::info!("Interrupted, shutting down"),
            Err(e) => log::error!("Waiting for Ctrl-C: {}", e),
        },
        _ = terminate_signal() => log::info!("Killed, shutting down"),
        _ = fabric.terminated() => log::info!("Termination requested by the accessory fabric"),
    }

    activity.abort();
    controller.stop().await;
    tokio::time::sleep(grace).await;
    std::process::exit(1);
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            terminate.recv().await;
        }
        Err(e) => {
            log::error!("Installing SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}
