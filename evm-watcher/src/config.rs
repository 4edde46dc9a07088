use std::collections::HashSet;
use std::time::Duration;

use core::config::{AppConfig, ChainConfig};
use core::CoreError;

/// Per-chain settings this watcher needs, pulled out of `core::config::AppConfig`
/// for the one EVM chain this process instance watches (§4.2).
pub struct WatcherConfig {
    pub chain_id: String,
    pub rpc_url: String,
    pub start_block: u64,
    pub max_block_span: u64,
    pub confirmations: u64,
    pub atomic_swap_addresses: Vec<String>,
    pub registry_address: String,
    pub erc20_addresses: Vec<String>,
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub poll_interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl WatcherConfig {
    pub fn from_app_config(app: &AppConfig, chain_id: &str) -> Result<Self, CoreError> {
        let chain = app.chain(chain_id)?;
        let ChainConfig::Evm {
            rpc_url,
            htlc_registry_address,
            start_block,
            max_block_span,
            confirmations,
            assets,
            ..
        } = chain
        else {
            return Err(CoreError::Unsupported(format!("{chain_id} is not an EVM chain")));
        };

        let mut atomic_swap_addresses: Vec<String> =
            assets.iter().map(|a| a.atomic_swap_address.clone()).collect::<HashSet<_>>().into_iter().collect();
        atomic_swap_addresses.sort();

        let mut erc20_addresses: Vec<String> =
            assets.iter().map(|a| a.token_address.clone()).collect::<HashSet<_>>().into_iter().collect();
        erc20_addresses.sort();

        let db = app
            .database
            .clone()
            .ok_or_else(|| CoreError::InvalidRequest("database config missing".into()))?;
        let timing = app.timing();

        Ok(WatcherConfig {
            chain_id: chain_id.to_string(),
            rpc_url: rpc_url.clone(),
            start_block: *start_block,
            max_block_span: *max_block_span,
            confirmations: *confirmations,
            atomic_swap_addresses,
            registry_address: htlc_registry_address.clone(),
            erc20_addresses,
            mongodb_uri: db.mongodb_uri,
            mongodb_db: db.mongodb_db,
            poll_interval: timing.poll_interval,
            max_retries: timing.max_retries,
            retry_delay: timing.retry_delay,
        })
    }
}
