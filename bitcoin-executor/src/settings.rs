use core::config::{AppConfig, ChainConfig};
use core::CoreError;

/// The subset of `core::config::AppConfig` this operator daemon needs for
/// the one Bitcoin chain it executes against.
pub struct ExecutorSettings {
    pub chain_id: String,
    pub indexer_url: String,
    pub network: bitcoin::Network,
    pub private_key: String,
    pub confirmations: u64,
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub poll_interval: std::time::Duration,
}

impl ExecutorSettings {
    pub fn from_app_config(app: &AppConfig, chain_id: &str) -> Result<Self, CoreError> {
        let chain = app.chain(chain_id)?;
        let (indexer_url, network_str, confirmations, private_key) = match chain {
            ChainConfig::Bitcoin {
                indexer_url,
                network,
                confirmations,
                executor_private_key,
                ..
            } => (
                indexer_url.clone(),
                network.clone(),
                *confirmations,
                executor_private_key
                    .clone()
                    .ok_or_else(|| CoreError::InvalidRequest("executor_private_key missing".into()))?,
            ),
            ChainConfig::Evm { .. } => {
                return Err(CoreError::Unsupported(format!("{chain_id} is not a Bitcoin chain")))
            }
        };

        let network = core::bitcoin_htlc::parse_network(&network_str)?;

        let db = app
            .database
            .clone()
            .ok_or_else(|| CoreError::InvalidRequest("database config missing".into()))?;

        Ok(ExecutorSettings {
            chain_id: chain_id.to_string(),
            indexer_url,
            network,
            private_key,
            confirmations,
            mongodb_uri: db.mongodb_uri,
            mongodb_db: db.mongodb_db,
            poll_interval: app.timing().poll_interval,
        })
    }
}
