//! Projects `AtomicSwap`/`Registry`/ERC-20 events onto pending orders for one
//! EVM chain (spec §4.2): batched `getLogs` over a configured set of watched
//! `(address, contract_type)` pairs, decoded against the fixed ABIs in
//! `core::contracts`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use core::contracts::{self, AtomicSwap, ReadOnlyProvider, Registry, IERC20};
use core::store::OrderStore;
use core::types::ChainId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct EvmWatcher {
    store: Arc<dyn OrderStore>,
    provider: ReadOnlyProvider,
    chain_id: ChainId,
    atomic_swap_addresses: Vec<Address>,
    registry_address: Address,
    erc20_addresses: Vec<Address>,
    max_block_span: u64,
    confirmations: u64,
    max_retries: u32,
    retry_delay: Duration,
    last_processed: AtomicU64,
    stop: CancellationToken,
}

#[allow(clippy::too_many_arguments)]
impl EvmWatcher {
    pub fn new(
        store: Arc<dyn OrderStore>,
        provider: ReadOnlyProvider,
        chain_id: ChainId,
        atomic_swap_addresses: Vec<Address>,
        registry_address: Address,
        erc20_addresses: Vec<Address>,
        start_block: u64,
        max_block_span: u64,
        confirmations: u64,
        max_retries: u32,
        retry_delay: Duration,
        stop: CancellationToken,
    ) -> Self {
        EvmWatcher {
            store,
            provider,
            chain_id,
            atomic_swap_addresses,
            registry_address,
            erc20_addresses,
            max_block_span,
            confirmations,
            max_retries,
            retry_delay,
            last_processed: AtomicU64::new(start_block.saturating_sub(1)),
            stop,
        }
    }

    pub async fn tick(&self) {
        let head = match self.provider.get_block_number().await {
            Ok(h) => h,
            Err(e) => {
                warn!(chain = %self.chain_id, error = %e, "failed to fetch current block number");
                return;
            }
        };

        // Trust finality at `confirmations` deep rather than Bitcoin's
        // separate detect-then-confirm pass: a log this watcher has not yet
        // seen at `head - confirmations` is simply not processed until it is.
        let target = head.saturating_sub(self.confirmations);
        let mut last = self.last_processed.load(Ordering::SeqCst);

        while last < target {
            let to = (last + self.max_block_span).min(target);
            let from = last + 1;

            match self.process_batch(from, to).await {
                Ok(()) => {
                    last = to;
                    self.last_processed.store(last, Ordering::SeqCst);
                }
                Err(e) => {
                    warn!(chain = %self.chain_id, from, to, error = %e, "batch failed after exhausting retries, halting watcher");
                    self.stop.cancel();
                    return;
                }
            }
        }
    }

    async fn process_batch(&self, from: u64, to: u64) -> anyhow::Result<()> {
        let mut attempt = 0;
        loop {
            match self.process_batch_once(from, to).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(chain = %self.chain_id, from, to, attempt, error = %e, "getLogs failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn process_batch_once(&self, from: u64, to: u64) -> anyhow::Result<()> {
        for address in &self.atomic_swap_addresses {
            let filter = Filter::new().address(*address).from_block(from).to_block(to);
            let logs = self.provider.get_logs(&filter).await?;
            for log in logs {
                self.project_atomic_swap_log(&log).await;
            }
        }

        {
            let filter = Filter::new().address(self.registry_address).from_block(from).to_block(to);
            let logs = self.provider.get_logs(&filter).await?;
            for log in logs {
                self.project_registry_log(&log);
            }
        }

        for address in &self.erc20_addresses {
            let filter = Filter::new().address(*address).from_block(from).to_block(to);
            let logs = self.provider.get_logs(&filter).await?;
            for log in logs {
                self.project_erc20_log(&log);
            }
        }

        Ok(())
    }

    async fn project_atomic_swap_log(&self, log: &Log) {
        let tx_hash = log.transaction_hash.map(|h| format!("{h:#x}")).unwrap_or_default();
        let block_number = log.block_number;

        if let Ok(decoded) = AtomicSwap::Initiated::decode_log(&log.inner, true) {
            let swap_id = hex::encode(decoded.orderID.as_slice());
            let order = match self.store.get_by_swap_id(&swap_id).await {
                Ok(order) => order,
                Err(e) => {
                    warn!(swap_id, error = %e, "failed to look up order for Initiated event");
                    return;
                }
            };
            let Some((order, side)) = order else {
                debug!(swap_id, "Initiated event matches no known order, skipping (audit)");
                return;
            };

            match self.store.set_initiate_tx(&order.create_id, side, &tx_hash).await {
                Ok(true) => info!(create_id = %order.create_id, ?side, %tx_hash, "evm initiate observed"),
                Ok(false) => {}
                Err(e) => warn!(create_id = %order.create_id, error = %e, "failed to record evm initiate"),
            }
            if let Some(block_number) = block_number {
                if let Err(e) = self.store.set_initiate_block(&order.create_id, side, block_number).await {
                    warn!(create_id = %order.create_id, error = %e, "failed to record evm initiate block");
                }
            }
            return;
        }

        if let Ok(decoded) = AtomicSwap::Redeemed::decode_log(&log.inner, true) {
            let swap_id = hex::encode(decoded.orderID.as_slice());
            let secret_hex = hex::encode(decoded.secret.as_slice());
            let order = match self.store.get_by_swap_id(&swap_id).await {
                Ok(order) => order,
                Err(e) => {
                    warn!(swap_id, error = %e, "failed to look up order for Redeemed event");
                    return;
                }
            };
            let Some((order, side)) = order else {
                debug!(swap_id, "Redeemed event matches no known order, skipping (audit)");
                return;
            };

            match self.store.set_redeem(&order.create_id, side, &tx_hash, block_number, Some(&secret_hex)).await {
                Ok(true) => info!(create_id = %order.create_id, ?side, %tx_hash, "evm redeem observed"),
                Ok(false) => {}
                Err(e) => warn!(create_id = %order.create_id, error = %e, "failed to record evm redeem"),
            }
            return;
        }

        if let Ok(decoded) = AtomicSwap::Refunded::decode_log(&log.inner, true) {
            let swap_id = hex::encode(decoded.orderID.as_slice());
            let order = match self.store.get_by_swap_id(&swap_id).await {
                Ok(order) => order,
                Err(e) => {
                    warn!(swap_id, error = %e, "failed to look up order for Refunded event");
                    return;
                }
            };
            let Some((order, side)) = order else {
                debug!(swap_id, "Refunded event matches no known order, skipping (audit)");
                return;
            };

            match self.store.set_refund(&order.create_id, side, &tx_hash, block_number).await {
                Ok(true) => info!(create_id = %order.create_id, ?side, %tx_hash, "evm refund observed"),
                Ok(false) => {}
                Err(e) => warn!(create_id = %order.create_id, error = %e, "failed to record evm refund"),
            }
            return;
        }

        debug!(chain = %self.chain_id, "log on atomic swap contract did not match any known event");
    }

    fn project_registry_log(&self, log: &Log) {
        if let Ok(decoded) = Registry::UDACreated::decode_log(&log.inner, true) {
            info!(
                chain = %self.chain_id,
                deposit = %decoded.deposit,
                token = %decoded.token,
                secret_hash = %hex::encode(decoded.secretHash.as_slice()),
                "registry deployed an ERC-20 HTLC"
            );
            return;
        }
        if let Ok(decoded) = Registry::NativeUDACreated::decode_log(&log.inner, true) {
            info!(
                chain = %self.chain_id,
                deposit = %decoded.deposit,
                secret_hash = %hex::encode(decoded.secretHash.as_slice()),
                "registry deployed a native HTLC"
            );
        }
    }

    fn project_erc20_log(&self, log: &Log) {
        if let Ok(decoded) = IERC20::Transfer::decode_log(&log.inner, true) {
            debug!(chain = %self.chain_id, from = %decoded.from, to = %decoded.to, value = %decoded.value, "erc20 transfer observed");
            return;
        }
        if let Ok(decoded) = IERC20::Approval::decode_log(&log.inner, true) {
            debug!(chain = %self.chain_id, owner = %decoded.owner, spender = %decoded.spender, "erc20 approval observed");
        }
    }
}

/// Used by `main.rs` to decode the watched config addresses once at startup.
pub fn parse_addresses(addresses: &[String]) -> anyhow::Result<Vec<Address>> {
    addresses.iter().map(|a| contracts::parse_address(a).map_err(anyhow::Error::from)).collect()
}
