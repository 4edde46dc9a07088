use std::time::Duration;

use core::config::{AppConfig, ChainConfig};
use core::CoreError;

/// Per-chain settings this watcher needs for the one EVM chain whose
/// UDA-source orders it activates (§4.4).
pub struct WatcherConfig {
    pub chain_id: String,
    pub rpc_url: String,
    pub registry_address: String,
    pub operator_private_key: String,
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
            operator_private_key,
            ..
        } = chain
        else {
            return Err(CoreError::Unsupported(format!("{chain_id} is not an EVM chain")));
        };

        let operator_private_key = operator_private_key
            .clone()
            .ok_or_else(|| CoreError::InvalidRequest("operator_private_key missing".into()))?;

        let db = app
            .database
            .clone()
            .ok_or_else(|| CoreError::InvalidRequest("database config missing".into()))?;
        let timing = app.timing();

        Ok(WatcherConfig {
            chain_id: chain_id.to_string(),
            rpc_url: rpc_url.clone(),
            registry_address: htlc_registry_address.clone(),
            operator_private_key,
            mongodb_uri: db.mongodb_uri,
            mongodb_db: db.mongodb_db,
            poll_interval: timing.poll_interval,
            max_retries: timing.max_retries,
            retry_delay: timing.retry_delay,
        })
    }
}
