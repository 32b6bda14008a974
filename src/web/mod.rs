//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::ingest::IngestionGateway;
use crate::lookup::LookupService;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted (decompressed) batch body.
const MAX_BATCH_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub gateway: Arc<IngestionGateway>,
    pub lookup: LookupService,
    /// Batches rejected as undecodable.
    pub errors: Arc<AtomicU64>,
}

/// HTTP front end for ingestion and lookups.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, gateway: Arc<IngestionGateway>, lookup: LookupService) -> Self {
        Self {
            state: AppState {
                config,
                gateway,
                lookup,
                errors: Arc::new(AtomicU64::new(0)),
            },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        Router::new()
            // Ingestion
            .route(&self.state.config.batch_route(), post(handlers::handle_batch))
            // Lookups
            .route("/api/resolve", get(handlers::handle_resolve))
            .route("/api/reverse", get(handlers::handle_reverse))
            // Status
            .route("/status", get(handlers::handle_status))
            .layer(DefaultBodyLimit::max(MAX_BATCH_BYTES))
            .layer(RequestDecompressionLayer::new())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the server on the configured address.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.state.config.listen;
        let router = self.routes();

        tracing::info!(
            "Listening on {}{} with policy {}",
            addr,
            self.state.config.batch_route(),
            self.state.config.policy
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
