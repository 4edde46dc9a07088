//! Single-operator decision procedure driving one Bitcoin chain's side of
//! every pending order: initiate the destination HTLC once the counterparty's
//! deposit has confirmed, redeem the source HTLC once the counterparty's
//! secret is revealed, or refund once a timelock the operator itself opened
//! has expired (§4.5).

use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use bitcoin::key::XOnlyPublicKey;
use bitcoin::Address;
use bitcoin_chain::indexer::SimpleIndexer;
use core::bitcoin_htlc::{self, BitcoinHtlcParams};
use core::store::{OrderStore, Side};
use core::types::{Order, Swap};
use num_traits::ToPrimitive;
use tracing::{info, warn};

use crate::wallet::{parse_recipient, ExecutorWallet};

#[derive(Debug, Clone)]
enum Action {
    NoOp,
    Initiate,
    Redeem(core::types::Secret),
    Refund,
}

pub struct Executor {
    store: Arc<dyn OrderStore>,
    wallet: ExecutorWallet,
    indexer: SimpleIndexer,
    chain_id: core::types::ChainId,
    network: bitcoin::Network,
}

impl Executor {
    pub fn new(
        store: Arc<dyn OrderStore>,
        wallet: ExecutorWallet,
        indexer: SimpleIndexer,
        chain_id: core::types::ChainId,
        network: bitcoin::Network,
    ) -> Self {
        Self {
            store,
            wallet,
            indexer,
            chain_id,
            network,
        }
    }

    pub async fn tick(&self) {
        let orders = match self.store.pending_orders().await {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, "failed to load pending orders");
                return;
            }
        };

        let current_height = match self.indexer.get_current_block_height().await {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "failed to fetch current block height");
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
                if let Err(e) = self.drive(&order, side, current_height).await {
                    warn!(create_id = %order.create_id, error = %e, "action failed");
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

    /// Determines the single action, if any, this operator should take on
    /// `side` right now. Both the timelock comparison and the leg the
    /// operator initiates are derived from the order's own persisted state,
    /// never from a constant.
    fn decide(order: &Order, side: Side, current_height: u64) -> Action {
        let mine = match side {
            Side::Source => &order.source_swap,
            Side::Destination => &order.destination_swap,
        };

        if mine.is_redeemed() || mine.is_refunded() {
            return Action::NoOp;
        }

        match side {
            // The operator is the initiator on the destination leg: open the
            // HTLC paying the counterparty once their source deposit has
            // confirmed.
            Side::Destination => {
                if !mine.is_initiated() && order.source_swap.is_confirmed() {
                    return Action::Initiate;
                }
            }
            // The operator is the redeemer on the source leg: claim it with
            // the secret the counterparty revealed when they redeemed the
            // destination leg.
            Side::Source => {
                if mine.is_initiated() && !mine.is_redeemed() {
                    if let Some(secret) = &order.destination_swap.secret {
                        return Action::Redeem(secret.clone());
                    }
                }
            }
        }

        if mine.is_initiated() && !mine.is_redeemed() && !mine.is_refunded() {
            if let Some(initiate_block) = mine.initiate_block_number {
                if current_height >= initiate_block + mine.timelock {
                    return Action::Refund;
                }
            }
        }

        Action::NoOp
    }

    async fn drive(&self, order: &Order, side: Side, current_height: u64) -> anyhow::Result<()> {
        let swap = match side {
            Side::Source => &order.source_swap,
            Side::Destination => &order.destination_swap,
        };

        match Self::decide(order, side, current_height) {
            Action::NoOp => Ok(()),
            Action::Initiate => self.initiate(order, side, swap).await,
            Action::Redeem(secret) => self.redeem(order, side, swap, &secret).await,
            Action::Refund => self.refund(order, side, swap).await,
        }
    }

    async fn initiate(&self, order: &Order, side: Side, swap: &Swap) -> anyhow::Result<()> {
        let params = self.htlc_params(swap)?;
        let address = bitcoin_htlc::htlc_address(&params, self.network)?;
        let amount = swap
            .amount
            .0
            .to_u64()
            .ok_or_else(|| anyhow!("htlc amount does not fit a u64 satoshi value"))?;
        let tx_hash = self.wallet.initiate(&params, &address, amount).await?;

        if self.store.set_initiate_tx(&order.create_id, side, &tx_hash).await? {
            info!(create_id = %order.create_id, %tx_hash, "initiated destination htlc");
        }
        Ok(())
    }

    async fn redeem(&self, order: &Order, side: Side, swap: &Swap, secret: &core::types::Secret) -> anyhow::Result<()> {
        let params = self.htlc_params(swap)?;
        let address = bitcoin_htlc::htlc_address(&params, self.network)?;
        let tx_hash = self.wallet.redeem(&params, &address, &secret.0).await?;

        if self
            .store
            .set_redeem(&order.create_id, side, &tx_hash, None, Some(&secret.to_hex()))
            .await?
        {
            info!(create_id = %order.create_id, %tx_hash, "redeemed source htlc");
        }
        Ok(())
    }

    async fn refund(&self, order: &Order, side: Side, swap: &Swap) -> anyhow::Result<()> {
        let params = self.htlc_params(swap)?;
        let address = bitcoin_htlc::htlc_address(&params, self.network)?;
        let refund_to = refund_recipient(order, side, self.network);
        let tx_hash = self.wallet.refund(&params, &address, refund_to).await?;

        if self.store.set_refund(&order.create_id, side, &tx_hash, None).await? {
            info!(create_id = %order.create_id, %tx_hash, "refunded htlc after timelock expiry");
        }
        Ok(())
    }
}

/// Bitcoin orders may name an explicit refund destination (the
/// `bitcoin_optional_recipient` on the create request); otherwise the refund
/// pays back to the wallet's own address, which is only reachable when the
/// operator, not the user, opened this leg's HTLC.
fn refund_recipient(order: &Order, side: Side, network: bitcoin::Network) -> Option<String> {
    if side == Side::Source {
        return None;
    }
    order
        .create_order
        .bitcoin_optional_recipient
        .as_ref()
        .and_then(|addr| parse_recipient(addr, network).ok())
        .map(|addr: Address| addr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::types::{AssetKey, ChainId, CreateOrder, Secret, SecretHash};

    fn swap(chain: &str) -> Swap {
        Swap {
            swap_id: "swap-1".into(),
            chain: ChainId::from(chain),
            asset: "btc".into(),
            htlc_address: "addr".into(),
            token_address: "".into(),
            initiator: "i".into(),
            redeemer: "r".into(),
            deposit_address: None,
            amount: core::types::Amount::from_u64(1000),
            filled_amount: core::types::Amount::zero(),
            timelock: 100,
            secret_hash: SecretHash([1u8; 32]),
            secret: None,
            initiate_tx_hash: None,
            redeem_tx_hash: None,
            refund_tx_hash: None,
            initiate_block_number: None,
            redeem_block_number: None,
            refund_block_number: None,
        }
    }

    fn order() -> Order {
        Order {
            create_id: "cid-1".into(),
            create_order: CreateOrder {
                from: AssetKey::parse("bitcoin_testnet:btc").unwrap(),
                to: AssetKey::parse("avalanche_testnet:avax").unwrap(),
                source_amount: core::types::Amount::from_u64(1000),
                destination_amount: core::types::Amount::from_u64(1000),
                nonce: 1,
                initiator_source_address: "user-btc".into(),
                initiator_destination_address: "user-evm".into(),
                secret_hash: SecretHash([1u8; 32]),
                bitcoin_optional_recipient: None,
                created_at: chrono::Utc::now(),
                input_token_price: None,
                output_token_price: None,
            },
            source_swap: swap("bitcoin_testnet"),
            destination_swap: swap("avalanche_testnet"),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn waits_for_source_confirmation_before_initiating_destination() {
        let order = order();
        let action = Executor::decide(&order, Side::Destination, 0);
        assert!(matches!(action, Action::NoOp));
    }

    #[test]
    fn initiates_destination_once_source_confirmed() {
        let mut order = order();
        order.source_swap.initiate_block_number = Some(10);
        let action = Executor::decide(&order, Side::Destination, 10);
        assert!(matches!(action, Action::Initiate));
    }

    #[test]
    fn redeems_source_once_destination_secret_is_revealed() {
        let mut order = order();
        order.source_swap.initiate_tx_hash = Some("0xsrc".into());
        order.destination_swap.secret = Some(Secret([7u8; 32]));
        let action = Executor::decide(&order, Side::Source, 0);
        assert!(matches!(action, Action::Redeem(_)));
    }

    #[test]
    fn refunds_only_after_timelock_expiry_not_on_empty_counterparty_field() {
        let mut order = order();
        order.destination_swap.initiate_tx_hash = Some("0xdst".into());
        order.destination_swap.initiate_block_number = Some(100);
        order.destination_swap.timelock = 50;

        let too_early = Executor::decide(&order, Side::Destination, 120);
        assert!(matches!(too_early, Action::NoOp));

        let expired = Executor::decide(&order, Side::Destination, 150);
        assert!(matches!(expired, Action::Refund));
    }
}
