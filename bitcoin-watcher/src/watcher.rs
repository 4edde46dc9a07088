//! Detects deposit, redeem and refund events against the two-leaf Taproot
//! HTLC addresses held by pending orders on one Bitcoin chain (spec §4.3):
//!
//! - deposit: the first UTXO paying the HTLC address with value >= the
//!   swap's amount becomes `initiate_tx_hash`; once it has accumulated the
//!   configured number of confirmations, `initiate_block_number` is set.
//! - redeem vs refund: once that UTXO is spent, the spending transaction's
//!   witness is inspected — if its script matches the redeem leaf, the swap
//!   is redeemed and the preimage (witness[1]) becomes the revealed secret;
//!   if it matches the refund leaf, the swap is refunded.

use std::str::FromStr;
use std::sync::Arc;

use bitcoin::secp256k1::XOnlyPublicKey;
use bitcoin_chain::indexer::SimpleIndexer;
use core::bitcoin_htlc::{self, BitcoinHtlcParams};
use core::store::{OrderStore, Side};
use core::types::{ChainId, Order, Swap};
use tracing::{debug, info, warn};

pub struct BitcoinWatcher {
    store: Arc<dyn OrderStore>,
    indexer: SimpleIndexer,
    chain_id: ChainId,
    network: bitcoin::Network,
    confirmations: u64,
}

impl BitcoinWatcher {
    pub fn new(
        store: Arc<dyn OrderStore>,
        indexer: SimpleIndexer,
        chain_id: ChainId,
        network: bitcoin::Network,
        confirmations: u64,
    ) -> Self {
        Self {
            store,
            indexer,
            chain_id,
            network,
            confirmations,
        }
    }

    pub async fn tick(&self) {
        let orders = match self.store.pending_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                warn!(error = %e, "failed to list pending orders");
                return;
            }
        };

        for order in orders {
            for side in [Side::Source, Side::Destination] {
                let swap = match side {
                    Side::Source => &order.source_swap,
                    Side::Destination => &order.destination_swap,
                };
                if swap.chain != self.chain_id {
                    continue;
                }
                if let Err(e) = self.watch_swap(&order, side, swap).await {
                    warn!(create_id = %order.create_id, ?side, error = %e, "error watching bitcoin swap");
                }
            }
        }
    }

    fn htlc_params(&self, swap: &Swap) -> anyhow::Result<BitcoinHtlcParams> {
        Ok(BitcoinHtlcParams {
            secret_hash: swap.secret_hash.0,
            redeemer_pubkey: XOnlyPublicKey::from_str(&swap.redeemer)?,
            initiator_pubkey: XOnlyPublicKey::from_str(&swap.initiator)?,
            timelock: swap.timelock as u32,
        })
    }

    async fn watch_swap(&self, order: &Order, side: Side, swap: &Swap) -> anyhow::Result<()> {
        let params = self.htlc_params(swap)?;

        if swap.refund_tx_hash.is_some() || swap.redeem_tx_hash.is_some() {
            return Ok(());
        }

        let address = bitcoin_htlc::htlc_address(&params, self.network)?;
        let address_str = address.to_string();

        if swap.initiate_tx_hash.is_none() {
            return self.detect_deposit(order, side, swap, &address_str).await;
        }

        if swap.initiate_block_number.is_none() {
            return self.detect_confirmation(order, side, swap, &address_str).await;
        }

        self.detect_spend(order, side, swap, &params, &address_str).await
    }

    async fn detect_deposit(&self, order: &Order, side: Side, swap: &Swap, address: &str) -> anyhow::Result<()> {
        let utxos = self.indexer.get_utxos(address).await?;
        let required = swap.amount.0.clone();

        for utxo in utxos {
            if num_bigint::BigUint::from(utxo.value) >= required {
                let did_set = self.store.set_initiate_tx(&order.create_id, side, &utxo.txid).await?;
                if did_set {
                    info!(create_id = %order.create_id, ?side, txid = %utxo.txid, "bitcoin deposit detected");
                }
                if utxo.status.confirmed {
                    self.maybe_confirm(order, side, utxo.status.block_height).await?;
                }
                return Ok(());
            }
        }
        Ok(())
    }

    async fn detect_confirmation(&self, order: &Order, side: Side, swap: &Swap, address: &str) -> anyhow::Result<()> {
        let Some(txid) = &swap.initiate_tx_hash else {
            return Ok(());
        };
        let utxos = self.indexer.get_utxos(address).await?;
        if let Some(utxo) = utxos.iter().find(|u| &u.txid == txid) {
            if utxo.status.confirmed {
                self.maybe_confirm(order, side, utxo.status.block_height).await?;
            }
        }
        // If the funding UTXO is no longer unspent it was spent before we
        // observed a confirmation; spend detection on the next tick handles
        // that without needing the confirmation to land first.
        Ok(())
    }

    async fn maybe_confirm(&self, order: &Order, side: Side, block_height: u64) -> anyhow::Result<()> {
        if block_height == 0 {
            return Ok(());
        }
        let current_height = self.indexer.get_current_block_height().await?;
        let confirmations = current_height.saturating_sub(block_height) + 1;
        if confirmations >= self.confirmations {
            let did_set = self.store.set_initiate_block(&order.create_id, side, block_height).await?;
            if did_set {
                info!(create_id = %order.create_id, ?side, block_height, "bitcoin deposit confirmed");
            }
        }
        Ok(())
    }

    async fn detect_spend(
        &self,
        order: &Order,
        side: Side,
        swap: &Swap,
        params: &BitcoinHtlcParams,
        address: &str,
    ) -> anyhow::Result<()> {
        let Some(txid) = &swap.initiate_tx_hash else {
            return Ok(());
        };

        let spending = self.indexer.find_spending_tx(address, txid, 0).await?;
        let Some(tx) = spending else { return Ok(()) };

        let Some(input) = tx.vin.iter().find(|i| &i.txid == txid) else {
            return Ok(());
        };
        if input.witness.len() < 3 {
            debug!(create_id = %order.create_id, "spending witness too short to classify");
            return Ok(());
        }

        let redeem_script_hex =
            hex::encode(bitcoin_htlc::redeem_leaf(&params.secret_hash, &params.redeemer_pubkey).into_bytes());
        let refund_script_hex = hex::encode(bitcoin_htlc::refund_leaf(params.timelock, &params.initiator_pubkey).into_bytes());

        let script_slot = &input.witness[input.witness.len() - 2];
        let block_height = if tx.status.confirmed { Some(tx.status.block_height) } else { None };

        if *script_slot == redeem_script_hex {
            let secret_hex = &input.witness[1];
            let did_set = self
                .store
                .set_redeem(&order.create_id, side, &tx.txid, block_height, Some(secret_hex))
                .await?;
            if did_set {
                info!(create_id = %order.create_id, ?side, txid = %tx.txid, "bitcoin redeem detected");
            }
        } else if *script_slot == refund_script_hex {
            let did_set = self.store.set_refund(&order.create_id, side, &tx.txid, block_height).await?;
            if did_set {
                info!(create_id = %order.create_id, ?side, txid = %tx.txid, "bitcoin refund detected");
            }
        } else {
            warn!(create_id = %order.create_id, "spend does not match either known leaf script");
        }

        let _ = swap;
        Ok(())
    }
}
