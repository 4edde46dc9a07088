use std::time::Duration;

use core::config::{AppConfig, ChainConfig};
use core::CoreError;

/// Per-chain settings this watcher needs, pulled out of `core::config::AppConfig`
/// for the one Bitcoin chain this process instance watches.
pub struct WatcherConfig {
    pub chain_id: String,
    pub indexer_url: String,
    pub network: bitcoin::Network,
    pub confirmations: u64,
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub poll_interval: Duration,
}

impl WatcherConfig {
    pub fn from_app_config(app: &AppConfig, chain_id: &str) -> Result<Self, CoreError> {
        let chain = app.chain(chain_id)?;
        let (indexer_url, network_str, confirmations) = match chain {
            ChainConfig::Bitcoin {
                indexer_url,
                network,
                confirmations,
                ..
            } => (indexer_url.clone(), network.clone(), *confirmations),
            ChainConfig::Evm { .. } => {
                return Err(CoreError::Unsupported(format!("{chain_id} is not a Bitcoin chain")))
            }
        };

        let network = core::bitcoin_htlc::parse_network(&network_str)?;

        let db = app
            .database
            .clone()
            .ok_or_else(|| CoreError::InvalidRequest("database config missing".into()))?;

        Ok(WatcherConfig {
            chain_id: chain_id.to_string(),
            indexer_url,
            network,
            confirmations,
            mongodb_uri: db.mongodb_uri,
            mongodb_db: db.mongodb_db,
            poll_interval: app.timing().poll_interval,
        })
    }
}
