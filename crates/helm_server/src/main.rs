mod api;
mod events;

use std::sync::Arc;

use api::Api;
use clap::Parser;
use helm_component::ComponentRegistry;
use helm_flight::{FlightConfig, FlightManager, TickConfig};
use helm_net::connection::DEFAULT_NATS_URL;
use helm_net::messages::CreateFlightRequest;
use helm_net::subjects::DEFAULT_PREFIX;
use helm_net::{Codec, NatsConnection, Subjects};
use helm_physics::BackendKind;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "helm-server", about = "Starship bridge simulation served over NATS")]
struct Args {
    /// NATS server URL
    #[arg(short, long, env = "NATS_URL", default_value = DEFAULT_NATS_URL)]
    nats_url: String,

    /// NATS subject prefix
    #[arg(short, long, env = "HELM_PREFIX", default_value = DEFAULT_PREFIX)]
    prefix: String,

    /// Default ticks per second for new flights
    #[arg(short, long, env = "HELM_TICK_RATE", default_value_t = 60.0)]
    tick_rate: f64,

    /// Default physics backend for new flights (rapier or point-mass)
    #[arg(long, env = "HELM_PHYSICS", default_value_t = BackendKind::Rapier)]
    physics: BackendKind,

    /// Encoding of broadcast change events (json or msgpack)
    #[arg(long, env = "HELM_EVENT_CODEC", default_value_t = Codec::Json)]
    event_codec: Codec,

    /// Start a flight with this name at boot
    #[arg(long)]
    flight: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let subjects = Subjects::new(args.prefix.as_str())?;
    let defaults = FlightConfig::new()
        .with_tick(TickConfig::fixed(args.tick_rate))
        .with_physics(args.physics);
    defaults.tick.validate()?;

    let registry = Arc::new(ComponentRegistry::standard());
    info!(components = registry.len(), "component registry loaded");
    let flights = Arc::new(FlightManager::new(registry));

    let connection = NatsConnection::connect_to(&args.nats_url).await?;
    let api = Api::new(
        Arc::clone(&flights),
        connection,
        subjects,
        defaults,
        args.event_codec,
    );

    if let Some(name) = args.flight {
        let created = api
            .create(&CreateFlightRequest {
                name: Some(name),
                ..CreateFlightRequest::default()
            })
            .map_err(|e| anyhow::anyhow!("boot flight failed ({}): {}", e.kind, e.message))?;
        info!(flight_id = %created.flight, flight = %created.name, "boot flight started");
    }

    tokio::select! {
        result = api.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
    }

    for (id, result) in flights.stop_all().await {
        match result {
            Ok(report) => info!(
                flight_id = %id,
                worlds = report.worlds,
                bodies = report.bodies,
                "flight stopped"
            ),
            Err(e) => error!(flight_id = %id, error = %e, "flight did not stop cleanly"),
        }
    }
    Ok(())
}
