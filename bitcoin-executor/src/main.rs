mod executor;
mod settings;
mod wallet;

use std::sync::Arc;

use bitcoin_chain::indexer::SimpleIndexer;
use core::config::AppConfig;
use core::store::MongoOrderStore;
use core::types::ChainId;
use executor::Executor;
use settings::ExecutorSettings;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use wallet::ExecutorWallet;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let app_config = AppConfig::load("Config.toml")?;
    let chain_id = std::env::var("CHAIN_ID").unwrap_or_else(|_| "bitcoin_testnet".to_string());
    let settings = ExecutorSettings::from_app_config(&app_config, &chain_id)?;

    tracing::info!(chain_id = %settings.chain_id, indexer = %settings.indexer_url, "starting bitcoin executor");

    let store = MongoOrderStore::connect(&settings.mongodb_uri, &settings.mongodb_db).await?;
    let indexer = SimpleIndexer::new(&settings.indexer_url)?;
    let wallet = ExecutorWallet::new(&settings.private_key, settings.network, &settings.indexer_url)?;

    tracing::info!(address = %wallet.address(), "operator wallet ready");

    let executor = Executor::new(
        Arc::new(store),
        wallet,
        indexer,
        ChainId::from(settings.chain_id.as_str()),
        settings.network,
    );

    let stop = CancellationToken::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ctrl_c_stop.cancel();
    });

    core::scheduler::run_scheduled(settings.poll_interval, stop, || async {
        executor.tick().await;
    })
    .await;

    Ok(())
}
