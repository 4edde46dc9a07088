//! Layered configuration: a `Config.toml` (matching the `toml`-based loaders
//! this workspace's Bitcoin watcher/executor already used) with every field
//! overridable from the environment, since §6 specifies the full surface as
//! environment variables (`RPC_URL`, `PRIVATE_KEY`, `HTLC_REGISTRY_ADDRESS`,
//! `CHAIN_ID`, `START_BLOCK`, `MAX_BLOCK_SPAN`, `CONFIRMATIONS`,
//! `MONGODB_URI`, `MONGODB_DB`, `CMC_API_KEY`, `PORT`, `POLL_INTERVAL`,
//! `MAX_RETRIES`, `RETRY_DELAY`).

use std::collections::HashMap;
use std::env;
use std::fs;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::ChainKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub id: String,
    pub atomic_swap_address: String,
    pub token_address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(rename = "cmcId")]
    pub cmc_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChainConfig {
    Evm {
        rpc_url: String,
        chain_id: u64,
        htlc_registry_address: String,
        executor_address: String,
        #[serde(default)]
        relay_private_key: Option<String>,
        /// The operator's own signing key for on-chain actions it initiates
        /// unprompted by a user request: UDA activation (`uda-watcher`) and
        /// counterparty-side initiate/redeem/refund (`evm-executor`).
        /// Distinct from `relay_private_key`, which only ever signs
        /// transactions a user explicitly asked the Orderbook to relay.
        #[serde(default)]
        operator_private_key: Option<String>,
        start_block: u64,
        #[serde(default = "default_max_block_span")]
        max_block_span: u64,
        #[serde(default = "default_confirmations")]
        confirmations: u64,
        source_timelock: u64,
        destination_timelock: u64,
        assets: Vec<AssetConfig>,
    },
    Bitcoin {
        indexer_url: String,
        network: String,
        executor_pubkey: String,
        #[serde(default)]
        executor_private_key: Option<String>,
        #[serde(default = "default_confirmations")]
        confirmations: u64,
        source_timelock: u64,
        destination_timelock: u64,
        assets: Vec<AssetConfig>,
    },
}

fn default_max_block_span() -> u64 {
    2000
}

fn default_confirmations() -> u64 {
    2
}

impl ChainConfig {
    pub fn is_evm(&self) -> bool {
        matches!(self, ChainConfig::Evm { .. })
    }

    pub fn kind(&self) -> ChainKind {
        match self {
            ChainConfig::Evm { .. } => ChainKind::Evm,
            ChainConfig::Bitcoin { .. } => ChainKind::Bitcoin,
        }
    }

    pub fn assets(&self) -> &[AssetConfig] {
        match self {
            ChainConfig::Evm { assets, .. } => assets,
            ChainConfig::Bitcoin { assets, .. } => assets,
        }
    }

    pub fn confirmations(&self) -> u64 {
        match self {
            ChainConfig::Evm { confirmations, .. } => *confirmations,
            ChainConfig::Bitcoin { confirmations, .. } => *confirmations,
        }
    }

    pub fn source_timelock(&self) -> u64 {
        match self {
            ChainConfig::Evm { source_timelock, .. } => *source_timelock,
            ChainConfig::Bitcoin { source_timelock, .. } => *source_timelock,
        }
    }

    pub fn destination_timelock(&self) -> u64 {
        match self {
            ChainConfig::Evm { destination_timelock, .. } => *destination_timelock,
            ChainConfig::Bitcoin { destination_timelock, .. } => *destination_timelock,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub mongodb_uri: String,
    pub mongodb_db: String,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(DatabaseConfig {
            mongodb_uri: require_env("MONGODB_URI")?,
            mongodb_db: env::var("MONGODB_DB").unwrap_or_else(|_| "atomic_swap".to_string()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub poll_interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            poll_interval: Duration::from_secs(15),
            max_retries: 5,
            retry_delay: Duration::from_secs(3),
        }
    }
}

impl TimingConfig {
    pub fn from_env() -> Self {
        let mut timing = TimingConfig::default();
        if let Ok(v) = env::var("POLL_INTERVAL") {
            if let Ok(secs) = v.parse::<u64>() {
                timing.poll_interval = Duration::from_secs(secs);
            }
        }
        if let Ok(v) = env::var("MAX_RETRIES") {
            if let Ok(n) = v.parse::<u32>() {
                timing.max_retries = n;
            }
        }
        if let Ok(v) = env::var("RETRY_DELAY") {
            if let Ok(secs) = v.parse::<u64>() {
                timing.retry_delay = Duration::from_secs(secs);
            }
        }
        timing
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuoteConfig {
    pub cmc_api_key: String,
    pub port: u16,
}

impl QuoteConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(QuoteConfig {
            cmc_api_key: require_env("CMC_API_KEY")?,
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8090),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub chains: HashMap<String, ChainConfig>,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub timing: Option<TimingConfig>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, CoreError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CoreError::Storage(format!("failed to read config {path}: {e}")))?;
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| CoreError::InvalidRequest(format!("invalid TOML config: {e}")))
        } else {
            serde_json::from_str(&contents)
                .map_err(|e| CoreError::InvalidRequest(format!("invalid JSON config: {e}")))
        }
    }

    /// Loads `Config.toml` if present, then overlays environment variables.
    /// Environment variables win, matching the precedence described in
    /// SPEC_FULL.md §10 so container deployments can run purely off env vars
    /// while local development can keep a checked-in file.
    pub fn load(default_path: &str) -> Result<Self, CoreError> {
        let mut config = if std::path::Path::new(default_path).exists() {
            Self::from_file(default_path)?
        } else {
            AppConfig {
                chains: HashMap::new(),
                database: None,
                timing: None,
            }
        };

        if config.database.is_none() {
            if let Ok(db) = DatabaseConfig::from_env() {
                config.database = Some(db);
            }
        }
        if config.timing.is_none() {
            config.timing = Some(TimingConfig::from_env());
        }

        Ok(config)
    }

    pub fn chain(&self, id: &str) -> Result<&ChainConfig, CoreError> {
        self.chains
            .get(id)
            .ok_or_else(|| CoreError::Unsupported(format!("chain not configured: {id}")))
    }

    pub fn asset(&self, chain_id: &str, asset: &str) -> Result<&AssetConfig, CoreError> {
        let chain = self.chain(chain_id)?;
        chain
            .assets()
            .iter()
            .find(|a| a.id.to_lowercase() == asset.to_lowercase())
            .ok_or_else(|| CoreError::Unsupported(format!("asset {asset} not found for chain {chain_id}")))
    }

    pub fn timing(&self) -> TimingConfig {
        self.timing.clone().unwrap_or_default()
    }
}

fn require_env(key: &str) -> Result<String, CoreError> {
    env::var(key).map_err(|_| CoreError::InvalidRequest(format!("missing required environment variable {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
[chains.avalanche_testnet]
kind = "evm"
rpc_url = "https://rpc.example/avax"
chain_id = 43113
htlc_registry_address = "0x0000000000000000000000000000000000aaaa"
executor_address = "0x0000000000000000000000000000000000bbbb"
start_block = 100
source_timelock = 144
destination_timelock = 72

[[chains.avalanche_testnet.assets]]
id = "avax"
atomic_swap_address = "0x0000000000000000000000000000000000cccc"
token_address = "0x0000000000000000000000000000000000dddd"
symbol = "AVAX"
name = "Avalanche"
decimals = 18
cmcId = 5805

[chains.bitcoin_testnet]
kind = "bitcoin"
indexer_url = "https://mempool.example"
network = "testnet"
executor_pubkey = "deadbeef"
source_timelock = 144
destination_timelock = 72

[[chains.bitcoin_testnet.assets]]
id = "btc"
atomic_swap_address = ""
token_address = ""
symbol = "BTC"
name = "Bitcoin"
decimals = 8
cmcId = 1
"#
    }

    #[test]
    fn parses_evm_and_bitcoin_chains_from_toml() {
        let config: AppConfig = toml::from_str(sample_toml()).unwrap();
        assert_eq!(config.chains.len(), 2);

        let evm = config.chain("avalanche_testnet").unwrap();
        assert!(evm.is_evm());
        assert_eq!(evm.kind(), ChainKind::Evm);
        assert_eq!(evm.source_timelock(), 144);
        assert_eq!(evm.confirmations(), default_confirmations());
        assert_eq!(evm.assets().len(), 1);

        let btc = config.chain("bitcoin_testnet").unwrap();
        assert!(!btc.is_evm());
        assert_eq!(btc.kind(), ChainKind::Bitcoin);
    }

    #[test]
    fn asset_lookup_is_case_insensitive_and_scoped_to_chain() {
        let config: AppConfig = toml::from_str(sample_toml()).unwrap();
        assert!(config.asset("avalanche_testnet", "AVAX").is_ok());
        assert!(config.asset("avalanche_testnet", "btc").is_err());
        assert!(config.asset("bitcoin_testnet", "BTC").is_ok());
    }

    #[test]
    fn unknown_chain_is_unsupported() {
        let config: AppConfig = toml::from_str(sample_toml()).unwrap();
        let err = config.chain("solana_devnet").unwrap_err();
        assert!(matches!(err, CoreError::Unsupported(_)));
    }

    #[test]
    fn max_block_span_defaults_when_absent() {
        let config: AppConfig = toml::from_str(sample_toml()).unwrap();
        let evm = config.chain("avalanche_testnet").unwrap();
        match evm {
            ChainConfig::Evm { max_block_span, .. } => assert_eq!(*max_block_span, default_max_block_span()),
            _ => panic!("expected evm chain"),
        }
    }

    #[test]
    fn timing_config_falls_back_to_defaults_without_env() {
        let timing = TimingConfig::default();
        assert_eq!(timing.poll_interval, Duration::from_secs(15));
        assert_eq!(timing.max_retries, 5);
        assert_eq!(timing.retry_delay, Duration::from_secs(3));
    }
}
