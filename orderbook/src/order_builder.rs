//! Turns an incoming `CreateOrder` into a fully-populated `Order`: validates
//! the request, derives each side's `swap_id`/`deposit_address`, and inserts
//! the result into the Order Store (§4.1 "Validates"/"Derives").

use std::str::FromStr;

use bitcoin::key::XOnlyPublicKey;
use core::bitcoin_htlc::{self, BitcoinHtlcParams};
use core::config::{AssetConfig, ChainConfig};
use core::contracts;
use core::types::{Amount, ChainId, CreateOrder, Order, Secret, SecretHash, Swap};
use core::CoreError;

use crate::state::AppState;

pub async fn build_order(state: &AppState, create_order: CreateOrder) -> Result<Order, CoreError> {
    if create_order.source_amount.is_zero() || create_order.destination_amount.is_zero() {
        return Err(CoreError::InvalidRequest("amounts must be greater than zero".into()));
    }

    let from_chain_cfg = state.config.chain(create_order.from.chain.as_str())?;
    let to_chain_cfg = state.config.chain(create_order.to.chain.as_str())?;
    let from_asset = state.config.asset(create_order.from.chain.as_str(), &create_order.from.asset)?;
    let to_asset = state.config.asset(create_order.to.chain.as_str(), &create_order.to.asset)?;

    validate_address(&create_order.initiator_source_address, from_chain_cfg)?;
    validate_address(&create_order.initiator_destination_address, to_chain_cfg)?;

    let existing = state.store.get_by_user(&create_order.initiator_source_address).await?;
    if existing.iter().any(|o| o.create_order.nonce == create_order.nonce) {
        return Err(CoreError::Duplicate(format!(
            "nonce {} already used by {}",
            create_order.nonce, create_order.initiator_source_address
        )));
    }

    let create_id = core::evm_id::create_id(&create_order)?;

    let operator_source = operator_identity(from_chain_cfg)?;
    let operator_destination = operator_identity(to_chain_cfg)?;

    let source_swap = build_leg(
        state,
        &create_order.from.chain,
        from_chain_cfg,
        from_asset,
        &create_order.source_amount,
        &create_order.secret_hash,
        from_chain_cfg.source_timelock(),
        create_order.initiator_source_address.clone(),
        operator_source,
        true,
    )
    .await?;

    let destination_swap = build_leg(
        state,
        &create_order.to.chain,
        to_chain_cfg,
        to_asset,
        &create_order.destination_amount,
        &create_order.secret_hash,
        to_chain_cfg.destination_timelock(),
        operator_destination,
        create_order.initiator_destination_address.clone(),
        false,
    )
    .await?;

    let order = Order {
        create_id,
        created_at: create_order.created_at,
        create_order,
        source_swap,
        destination_swap,
    };

    state.store.insert(order.clone()).await?;
    Ok(order)
}

fn operator_identity(chain: &ChainConfig) -> Result<String, CoreError> {
    match chain {
        ChainConfig::Evm { executor_address, .. } => Ok(executor_address.clone()),
        ChainConfig::Bitcoin { executor_pubkey, .. } => Ok(executor_pubkey.clone()),
    }
}

/// Bitcoin addresses here are x-only public keys embedded directly into the
/// HTLC script, not bech32 addresses — the HTLC's script path spends require
/// a pubkey, not an address.
fn validate_address(address: &str, chain: &ChainConfig) -> Result<(), CoreError> {
    match chain {
        ChainConfig::Evm { .. } => {
            contracts::parse_address(address)?;
        }
        ChainConfig::Bitcoin { .. } => {
            XOnlyPublicKey::from_str(address)
                .map_err(|e| CoreError::InvalidRequest(format!("invalid bitcoin x-only pubkey {address}: {e}")))?;
        }
    }
    Ok(())
}

/// Builds one side of an order. `is_source` decides who plays initiator vs.
/// redeemer (the operator is always the destination-leg initiator and the
/// source-leg redeemer, matching `bitcoin-executor`/`evm-executor`'s own
/// assumption about which leg they open and which they claim) and whether a
/// `deposit_address` applies at all — only the source leg is something a
/// counterparty deposits into; the destination leg is opened directly by the
/// operator.
#[allow(clippy::too_many_arguments)]
async fn build_leg(
    state: &AppState,
    chain_id: &ChainId,
    chain_cfg: &ChainConfig,
    asset: &AssetConfig,
    amount: &Amount,
    secret_hash: &SecretHash,
    timelock: u64,
    initiator: String,
    redeemer: String,
    is_source: bool,
) -> Result<Swap, CoreError> {
    let (swap_id, htlc_address, deposit_address, token_address) = match chain_cfg {
        ChainConfig::Evm { chain_id: evm_chain_id, .. } => {
            let swap_id = core::evm_id::evm_swap_id(
                *evm_chain_id,
                &secret_hash.to_hex(),
                &initiator,
                &redeemer,
                timelock,
                &amount.0.to_string(),
                &asset.atomic_swap_address,
            )?;

            let deposit_address = if is_source {
                Some(derive_uda_address(state, chain_id, asset, amount, secret_hash, timelock, &initiator, &redeemer).await?)
            } else {
                None
            };

            (swap_id, asset.atomic_swap_address.clone(), deposit_address, asset.token_address.clone())
        }
        ChainConfig::Bitcoin { network, .. } => {
            let network = bitcoin_htlc::parse_network(network)?;
            let params = BitcoinHtlcParams {
                secret_hash: secret_hash.0,
                redeemer_pubkey: XOnlyPublicKey::from_str(&redeemer)
                    .map_err(|e| CoreError::InvalidRequest(format!("invalid redeemer pubkey: {e}")))?,
                initiator_pubkey: XOnlyPublicKey::from_str(&initiator)
                    .map_err(|e| CoreError::InvalidRequest(format!("invalid initiator pubkey: {e}")))?,
                timelock: u32::try_from(timelock)
                    .map_err(|_| CoreError::InvalidRequest("timelock does not fit a u32 block height".into()))?,
            };
            let address = bitcoin_htlc::htlc_address(&params, network)
                .map_err(|e| CoreError::InvalidRequest(e.to_string()))?;
            let swap_id = hex::encode(
                bitcoin_htlc::swap_id(&params).map_err(|e| CoreError::InvalidRequest(e.to_string()))?,
            );
            let deposit_address = if is_source { Some(address.to_string()) } else { None };

            (swap_id, address.to_string(), deposit_address, String::new())
        }
    };

    Ok(Swap {
        swap_id,
        chain: chain_id.clone(),
        asset: asset.id.clone(),
        htlc_address,
        token_address,
        initiator,
        redeemer,
        deposit_address,
        amount: amount.clone(),
        filled_amount: Amount::zero(),
        timelock,
        secret_hash: *secret_hash,
        secret: None::<Secret>,
        initiate_tx_hash: None,
        redeem_tx_hash: None,
        refund_tx_hash: None,
        initiate_block_number: None,
        redeem_block_number: None,
        refund_block_number: None,
    })
}

/// Calls the registry's pure `getERC20Address` view so the Orderbook derives
/// the exact same deposit address the UDA watcher will later activate
/// on-chain (§4.4 "The Orderbook derives the same address locally").
#[allow(clippy::too_many_arguments)]
async fn derive_uda_address(
    state: &AppState,
    chain_id: &ChainId,
    asset: &AssetConfig,
    amount: &Amount,
    secret_hash: &SecretHash,
    timelock: u64,
    initiator: &str,
    redeemer: &str,
) -> Result<String, CoreError> {
    let evm_chain = state.evm_chain(chain_id.as_str())?;

    let token = contracts::parse_address(&asset.token_address)?;
    let refund_address = contracts::parse_address(initiator)?;
    let redeemer_address = contracts::parse_address(redeemer)?;
    let timelock = alloy::primitives::U256::from(timelock);
    let amount = contracts::amount_to_u256(amount)?;
    let secret_hash = contracts::parse_secret_hash(&secret_hash.to_hex())?;

    let deposit_address = evm_chain
        .registry
        .getERC20Address(token, refund_address, redeemer_address, timelock, amount, secret_hash)
        .call()
        .await
        .map_err(|e| CoreError::RpcTransient(format!("getERC20Address failed: {e}")))?;

    Ok(format!("{deposit_address:#x}"))
}
