use std::time::Duration;

use core::config::{AppConfig, ChainConfig};
use core::CoreError;

/// One EVM chain this operator daemon is willing to act on, i.e. one
/// configured with an `operator_private_key` (§4.5).
pub struct ChainSettings {
    pub chain_id: String,
    pub rpc_url: String,
    pub operator_private_key: String,
}

pub struct ExecutorSettings {
    pub chains: Vec<ChainSettings>,
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub poll_interval: Duration,
}

impl ExecutorSettings {
    /// Unlike the single-chain Bitcoin executor, this operator daemon drives
    /// every configured EVM chain at once (§4.5's chain-switching note
    /// implies one operator identity acting across chains, not one process
    /// per chain).
    pub fn from_app_config(app: &AppConfig) -> Result<Self, CoreError> {
        let mut chains = Vec::new();
        for (id, chain) in &app.chains {
            if let ChainConfig::Evm {
                rpc_url,
                operator_private_key: Some(pk),
                ..
            } = chain
            {
                chains.push(ChainSettings {
                    chain_id: id.clone(),
                    rpc_url: rpc_url.clone(),
                    operator_private_key: pk.clone(),
                });
            }
        }

        if chains.is_empty() {
            return Err(CoreError::InvalidRequest(
                "no EVM chain has operator_private_key configured".into(),
            ));
        }

        let db = app
            .database
            .clone()
            .ok_or_else(|| CoreError::InvalidRequest("database config missing".into()))?;

        Ok(ExecutorSettings {
            chains,
            mongodb_uri: db.mongodb_uri,
            mongodb_db: db.mongodb_db,
            poll_interval: app.timing().poll_interval,
        })
    }
}
