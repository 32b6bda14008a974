//! vaporns - measurement-driven name resolution table
//!
//! Probing agents post batches of ping measurements; the best address per
//! hostname is kept in a continuously republished lookup table.

mod config;
mod ingest;
mod lookup;
mod probe;
mod store;
mod web;

use config::ServerConfig;
use ingest::IngestionGateway;
use lookup::LookupService;
use probe::{run_miss_handler, MissNotifier, Provisioner};
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("vaporns=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load()?;
    tracing::info!("Starting vaporns on {}...", cfg.listen);
    if cfg.zones.as_slice().is_empty() {
        tracing::info!("Serving all zones");
    } else {
        tracing::info!("Serving zones {}", cfg.zones.as_slice().join(", "));
    }
    tracing::info!(
        "Policy {}, staleness {}s, reverse {}, liveness {}",
        cfg.policy,
        cfg.staleness.as_secs(),
        if cfg.auto_reverse { "on" } else { "off" },
        cfg.liveness.as_str()
    );

    let gateway = Arc::new(IngestionGateway::new(cfg.reconciler(), cfg.build_options()));

    // Miss handling
    let provisioner = cfg
        .provision_url
        .as_deref()
        .map(|url| Provisioner::new(url, cfg.provision_agents.clone()))
        .transpose()?;
    if provisioner.is_some() {
        tracing::info!("Probe provisioning enabled");
    }
    let (misses, miss_rx) = MissNotifier::channel();
    tokio::spawn(run_miss_handler(miss_rx, provisioner));

    let lookup =
        LookupService::new(gateway.clone()).with_miss_notifier(misses, cfg.zones.clone());

    // Start web server
    let server = Server::new(cfg, gateway, lookup);
    server.start().await?;

    Ok(())
}
