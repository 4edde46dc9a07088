mod config;
mod watcher;

use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use config::WatcherConfig;
use core::config::AppConfig;
use core::contracts;
use core::store::MongoOrderStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use watcher::UdaWatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let app_config = AppConfig::load("Config.toml")?;
    let chain_id = std::env::var("CHAIN_ID").unwrap_or_else(|_| "arbitrum_sepolia".to_string());
    let settings = WatcherConfig::from_app_config(&app_config, &chain_id)?;

    tracing::info!(chain_id = %settings.chain_id, rpc_url = %settings.rpc_url, "starting uda watcher");

    let store = MongoOrderStore::connect(&settings.mongodb_uri, &settings.mongodb_db).await?;

    let signer: PrivateKeySigner = settings.operator_private_key.parse()?;
    let operator_address = alloy::signers::Signer::address(&signer);
    let wallet = EthereumWallet::from(signer);
    let provider = ProviderBuilder::new().wallet(wallet).connect_http(settings.rpc_url.parse()?);

    let registry_address = contracts::parse_address(&settings.registry_address)?;
    let registry = contracts::Registry::new(registry_address, provider.clone());

    tracing::info!(operator = %operator_address, "operator wallet ready");

    let watcher = UdaWatcher::new(
        Arc::new(store),
        provider,
        registry,
        core::types::ChainId::from(settings.chain_id.as_str()),
        settings.retry_delay,
    );

    let stop = CancellationToken::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ctrl_c_stop.cancel();
    });

    core::scheduler::run_scheduled(settings.poll_interval, stop, || async {
        watcher.tick().await;
    })
    .await;

    Ok(())
}
