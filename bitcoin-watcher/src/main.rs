mod config;
mod watcher;

use std::sync::Arc;

use bitcoin_chain::indexer::SimpleIndexer;
use config::WatcherConfig;
use core::config::AppConfig;
use core::store::MongoOrderStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use watcher::BitcoinWatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let app_config = AppConfig::load("Config.toml")?;
    let chain_id = std::env::var("CHAIN_ID").unwrap_or_else(|_| "bitcoin_testnet".to_string());
    let watcher_config = WatcherConfig::from_app_config(&app_config, &chain_id)?;

    tracing::info!(chain_id = %watcher_config.chain_id, indexer = %watcher_config.indexer_url, "starting bitcoin watcher");

    let store = MongoOrderStore::connect(&watcher_config.mongodb_uri, &watcher_config.mongodb_db).await?;
    let indexer = SimpleIndexer::new(&watcher_config.indexer_url)?;

    let watcher = BitcoinWatcher::new(
        Arc::new(store),
        indexer,
        core::types::ChainId::from(watcher_config.chain_id.as_str()),
        watcher_config.network,
        watcher_config.confirmations,
    );

    let stop = CancellationToken::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ctrl_c_stop.cancel();
    });

    core::scheduler::run_scheduled(watcher_config.poll_interval, stop, || async {
        watcher.tick().await;
    })
    .await;

    Ok(())
}
