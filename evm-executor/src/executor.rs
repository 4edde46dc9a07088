//! Operator-side decision procedure driving every configured EVM chain's
//! side of every pending order: initiate the destination HTLC once the
//! counterparty's deposit has confirmed, redeem the source HTLC once the
//! counterparty's secret is revealed on-chain, or refund once a timelock the
//! operator itself opened has expired (§4.5).
//!
//! Unlike the single-chain Bitcoin executor, one process here manages a
//! handle per configured EVM chain; a side whose `chain` isn't in that map
//! (a Bitcoin leg, or an EVM chain this operator doesn't run) is simply
//! skipped, which is what the spec calls "the EVM executor has nothing to
//! do" for a Bitcoin-source order.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::providers::Provider;
use core::contracts::{self, AtomicSwapInstance, SigningProvider};
use core::store::{OrderStore, Side};
use core::types::{Order, Secret, Swap};
use tracing::{info, warn};

#[derive(Debug, Clone)]
enum Action {
    NoOp,
    Initiate,
    Redeem(Secret),
    Refund,
}

pub struct EvmChainHandle {
    pub provider: SigningProvider,
}

pub struct Executor {
    store: Arc<dyn OrderStore>,
    chains: HashMap<String, EvmChainHandle>,
}

impl Executor {
    pub fn new(store: Arc<dyn OrderStore>, chains: HashMap<String, EvmChainHandle>) -> Self {
        Executor { store, chains }
    }

    pub async fn tick(&self) {
        let orders = match self.store.pending_orders().await {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, "failed to load pending orders");
                return;
            }
        };

        for order in orders {
            for side in [Side::Source, Side::Destination] {
                let swap = match side {
                    Side::Source => &order.source_swap,
                    Side::Destination => &order.destination_swap,
                };
                let Some(handle) = self.chains.get(swap.chain.as_str()) else {
                    continue;
                };
                if let Err(e) = self.drive(handle, &order, side, swap).await {
                    warn!(create_id = %order.create_id, error = %e, "action failed");
                }
            }
        }
    }

    /// Both the refund timelock comparison and which leg the operator
    /// initiates are derived from the order's own persisted state, never
    /// from a constant — mirroring `bitcoin-executor::Executor::decide`,
    /// generalized to EVM's relative-block timelocks (§3: "relative blocks
    /// for EVM").
    fn decide(order: &Order, side: Side, current_height: u64) -> Action {
        let mine = match side {
            Side::Source => &order.source_swap,
            Side::Destination => &order.destination_swap,
        };

        if mine.is_redeemed() || mine.is_refunded() {
            return Action::NoOp;
        }

        match side {
            Side::Destination => {
                if !mine.is_initiated() && order.source_swap.is_confirmed() {
                    return Action::Initiate;
                }
            }
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

    async fn drive(&self, handle: &EvmChainHandle, order: &Order, side: Side, swap: &Swap) -> anyhow::Result<()> {
        let current_height = handle.provider.get_block_number().await?;

        match Self::decide(order, side, current_height) {
            Action::NoOp => Ok(()),
            Action::Initiate => self.initiate(handle, order, side, swap).await,
            Action::Redeem(secret) => self.redeem(handle, order, side, swap, &secret).await,
            Action::Refund => self.refund(handle, order, side, swap).await,
        }
    }

    async fn initiate(&self, handle: &EvmChainHandle, order: &Order, side: Side, swap: &Swap) -> anyhow::Result<()> {
        let instance = self.atomic_swap(handle, swap)?;
        let token = contracts::parse_address(&swap.token_address)?;
        let redeemer = contracts::parse_address(&swap.redeemer)?;
        let timelock = alloy::primitives::U256::from(swap.timelock);
        let amount = contracts::amount_to_u256(&swap.amount)?;
        let secret_hash = contracts::parse_secret_hash(&swap.secret_hash.to_hex())?;

        let sent = instance.initiate(token, redeemer, timelock, amount, secret_hash).send().await;
        let pending = match sent {
            Ok(p) => p,
            Err(e) => return self.handle_idempotent_revert(order, "initiate", e),
        };

        let tx_hash = pending.tx_hash().to_string();
        if self.store.set_initiate_tx(&order.create_id, side, &tx_hash).await? {
            info!(create_id = %order.create_id, %tx_hash, "initiated destination htlc");
        }
        Ok(())
    }

    async fn redeem(&self, handle: &EvmChainHandle, order: &Order, side: Side, swap: &Swap, secret: &Secret) -> anyhow::Result<()> {
        let instance = self.atomic_swap(handle, swap)?;
        let order_id = contracts::parse_secret_hash(&swap.swap_id)?;
        let secret_bytes = contracts::parse_secret_hash(&secret.to_hex())?;

        let sent = instance.redeem(order_id, secret_bytes).send().await;
        let pending = match sent {
            Ok(p) => p,
            Err(e) => return self.handle_idempotent_revert(order, "redeem", e),
        };

        let tx_hash = pending.tx_hash().to_string();
        if self
            .store
            .set_redeem(&order.create_id, side, &tx_hash, None, Some(&secret.to_hex()))
            .await?
        {
            info!(create_id = %order.create_id, %tx_hash, "redeemed source htlc");
        }
        Ok(())
    }

    async fn refund(&self, handle: &EvmChainHandle, order: &Order, side: Side, swap: &Swap) -> anyhow::Result<()> {
        let instance = self.atomic_swap(handle, swap)?;
        let order_id = contracts::parse_secret_hash(&swap.swap_id)?;

        let sent = instance.refund(order_id).send().await;
        let pending = match sent {
            Ok(p) => p,
            Err(e) => return self.handle_idempotent_revert(order, "refund", e),
        };

        let tx_hash = pending.tx_hash().to_string();
        if self.store.set_refund(&order.create_id, side, &tx_hash, None).await? {
            info!(create_id = %order.create_id, %tx_hash, "refunded htlc after timelock expiry");
        }
        Ok(())
    }

    fn atomic_swap(&self, handle: &EvmChainHandle, swap: &Swap) -> anyhow::Result<AtomicSwapInstance<SigningProvider>> {
        let address = contracts::parse_address(&swap.htlc_address)?;
        Ok(contracts::AtomicSwap::new(address, handle.provider.clone()))
    }

    /// A revert for an action someone else already completed (the
    /// counterparty's own relay call, a prior crashed attempt of ours that
    /// still mined) is not a failure: the next poll's `decide` will see the
    /// real on-chain outcome once the EVM watcher records it (§5 "the
    /// executor reacts to the revert by treating it as success").
    fn handle_idempotent_revert(&self, order: &Order, action: &str, error: alloy::contract::Error) -> anyhow::Result<()> {
        let revert = core::CoreError::ContractRevert(error.to_string());
        if revert.is_idempotent_success() {
            info!(create_id = %order.create_id, action, "action already completed on-chain, reconciling next poll");
            return Ok(());
        }
        Err(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::types::{AssetKey, ChainId, CreateOrder, SecretHash};

    fn swap(chain: &str) -> Swap {
        Swap {
            swap_id: "swap-1".into(),
            chain: ChainId::from(chain),
            asset: "usdt".into(),
            htlc_address: "0x0000000000000000000000000000000000000001".into(),
            token_address: "0x0000000000000000000000000000000000000002".into(),
            initiator: "0x0000000000000000000000000000000000000003".into(),
            redeemer: "0x0000000000000000000000000000000000000004".into(),
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
                from: AssetKey::parse("arbitrum_sepolia:usdt").unwrap(),
                to: AssetKey::parse("avalanche_testnet:usdt").unwrap(),
                source_amount: core::types::Amount::from_u64(1000),
                destination_amount: core::types::Amount::from_u64(995),
                nonce: 1,
                initiator_source_address: "0xuser1".into(),
                initiator_destination_address: "0xuser2".into(),
                secret_hash: SecretHash([1u8; 32]),
                bitcoin_optional_recipient: None,
                created_at: chrono::Utc::now(),
                input_token_price: None,
                output_token_price: None,
            },
            source_swap: swap("arbitrum_sepolia"),
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

    #[test]
    fn no_action_once_side_already_redeemed() {
        let mut order = order();
        order.destination_swap.initiate_tx_hash = Some("0xdst".into());
        order.destination_swap.initiate_block_number = Some(0);
        order.destination_swap.redeem_tx_hash = Some("0xredeem".into());
        let action = Executor::decide(&order, Side::Destination, 1_000_000);
        assert!(matches!(action, Action::NoOp));
    }
}
