mod config;
mod error;
mod handlers;
mod pricing;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use config::Settings;
use core::clock::SystemClock;
use pricing::{CmcPriceSource, PriceCache};
use state::AppState;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let settings = Settings::load()?;
    tracing::info!(chains = settings.app.chains.len(), "starting quote service");

    let source = Arc::new(CmcPriceSource::new(settings.cmc_api_key.clone()));
    let prices = Arc::new(PriceCache::new(source, settings.price_ttl, Arc::new(SystemClock)));

    let state = AppState {
        config: Arc::new(settings.app),
        prices,
    };

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/supported-assets", get(handlers::supported_assets))
        .route("/quote", get(handlers::quote))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "quote service listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
