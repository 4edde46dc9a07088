mod config;
mod watcher;

use std::sync::Arc;

use alloy::providers::ProviderBuilder;
use config::WatcherConfig;
use core::config::AppConfig;
use core::contracts;
use core::store::MongoOrderStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use watcher::EvmWatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let app_config = AppConfig::load("Config.toml")?;
    let chain_id = std::env::var("CHAIN_ID").unwrap_or_else(|_| "arbitrum_sepolia".to_string());
    let settings = WatcherConfig::from_app_config(&app_config, &chain_id)?;

    tracing::info!(chain_id = %settings.chain_id, rpc_url = %settings.rpc_url, "starting evm watcher");

    let store = MongoOrderStore::connect(&settings.mongodb_uri, &settings.mongodb_db).await?;
    let provider = ProviderBuilder::new().connect_http(settings.rpc_url.parse()?);

    let atomic_swap_addresses = watcher::parse_addresses(&settings.atomic_swap_addresses)?;
    let registry_address = contracts::parse_address(&settings.registry_address)?;
    let erc20_addresses = watcher::parse_addresses(&settings.erc20_addresses)?;

    let stop = CancellationToken::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ctrl_c_stop.cancel();
    });

    let watcher = EvmWatcher::new(
        Arc::new(store),
        provider,
        core::types::ChainId::from(settings.chain_id.as_str()),
        atomic_swap_addresses,
        registry_address,
        erc20_addresses,
        settings.start_block,
        settings.max_block_span,
        settings.confirmations,
        settings.max_retries,
        settings.retry_delay,
        stop.clone(),
    );

    core::scheduler::run_scheduled(settings.poll_interval, stop, || async {
        watcher.tick().await;
    })
    .await;

    Ok(())
}
