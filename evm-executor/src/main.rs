mod config;
mod executor;

use std::collections::HashMap;
use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use config::ExecutorSettings;
use core::config::AppConfig;
use core::store::MongoOrderStore;
use executor::{EvmChainHandle, Executor};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let app_config = AppConfig::load("Config.toml")?;
    let settings = ExecutorSettings::from_app_config(&app_config)?;

    tracing::info!(chains = settings.chains.len(), "starting evm executor");

    let store = MongoOrderStore::connect(&settings.mongodb_uri, &settings.mongodb_db).await?;

    let mut chains = HashMap::new();
    for chain in &settings.chains {
        let signer: PrivateKeySigner = chain.operator_private_key.parse()?;
        let operator_address = alloy::signers::Signer::address(&signer);
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new().wallet(wallet).connect_http(chain.rpc_url.parse()?);

        tracing::info!(chain_id = %chain.chain_id, operator = %operator_address, "operator wallet ready");

        chains.insert(chain.chain_id.clone(), EvmChainHandle { provider });
    }

    let executor = Executor::new(Arc::new(store), chains);

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
