//! Shared application state: the Order Store plus one EVM chain handle per
//! configured EVM chain, built once at startup and cloned cheaply into every
//! axum handler.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use core::config::{AppConfig, ChainConfig};
use core::contracts::{self, ReadOnlyProvider, RegistryInstance, SigningProvider};
use core::store::OrderStore;
use core::CoreError;

/// A configured EVM chain's view-only registry handle plus an optional
/// signing provider for the relay endpoints (`/initiate`, `/redeem`). The
/// signer is absent if the chain's `relay_private_key` was not configured,
/// in which case those two endpoints return `Unsupported` for this chain.
#[derive(Clone)]
pub struct EvmChain {
    pub chain_id: u64,
    pub rpc_url: String,
    pub registry: RegistryInstance<ReadOnlyProvider>,
    pub signer: Option<SigningProvider>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub config: Arc<AppConfig>,
    pub evm_chains: Arc<HashMap<String, EvmChain>>,
}

impl AppState {
    pub fn evm_chain(&self, chain_id: &str) -> Result<&EvmChain, CoreError> {
        self.evm_chains
            .get(chain_id)
            .ok_or_else(|| CoreError::Unsupported(format!("no EVM chain handle configured for {chain_id}")))
    }
}

/// Builds one `EvmChain` handle per `ChainConfig::Evm` entry. Bitcoin chains
/// have no registry/signer of this kind — their deposit address is the P2TR
/// address itself, derived on demand from `core::bitcoin_htlc`.
pub fn build_evm_chains(config: &AppConfig) -> anyhow::Result<HashMap<String, EvmChain>> {
    let mut chains = HashMap::new();

    for (id, chain) in &config.chains {
        let ChainConfig::Evm {
            rpc_url,
            chain_id,
            htlc_registry_address,
            relay_private_key,
            ..
        } = chain
        else {
            continue;
        };

        let registry_address = contracts::parse_address(htlc_registry_address)?;
        let read_only: ReadOnlyProvider = ProviderBuilder::new().connect_http(rpc_url.parse()?);
        let registry = contracts::Registry::new(registry_address, read_only);

        let signer = match relay_private_key {
            Some(pk) => {
                let local_signer: PrivateKeySigner = pk.parse()?;
                let wallet = EthereumWallet::from(local_signer);
                let signing: SigningProvider = ProviderBuilder::new().wallet(wallet).connect_http(rpc_url.parse()?);
                Some(signing)
            }
            None => None,
        };

        chains.insert(
            id.clone(),
            EvmChain {
                chain_id: *chain_id,
                rpc_url: rpc_url.clone(),
                registry,
                signer,
            },
        );
    }

    Ok(chains)
}
