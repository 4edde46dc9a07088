mod error;
mod handlers;
mod order_builder;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use core::config::AppConfig;
use core::store::MongoOrderStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = AppConfig::load("Config.toml")?;
    let db = config
        .database
        .clone()
        .ok_or_else(|| anyhow::anyhow!("database config missing"))?;

    let store = MongoOrderStore::connect(&db.mongodb_uri, &db.mongodb_db).await?;
    let evm_chains = state::build_evm_chains(&config)?;

    tracing::info!(chains = config.chains.len(), "starting orderbook");

    let state = AppState {
        store: Arc::new(store),
        config: Arc::new(config),
        evm_chains: Arc::new(evm_chains),
    };

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/orders", post(handlers::create_order))
        .route("/orders/id/{create_id}", get(handlers::get_order_by_id))
        .route("/orders/user/{address}", get(handlers::get_orders_by_user))
        .route("/initiate", post(handlers::initiate))
        .route("/redeem", post(handlers::redeem))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "orderbook listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
