//! Activates the deterministic deposit address for every pending EVM-source
//! order once its ERC-20 balance covers the required amount (spec §4.4).
//!
//! This watcher never writes `initiate_tx_hash` itself — that field has a
//! single logical writer, the EVM watcher observing the real on-chain
//! `Initiated` event the registry's `createERC20SwapAddress` call ultimately
//! triggers (§5 "single logical writer"). This component only tracks its own
//! in-memory submission cooldown so it does not resend while a prior
//! activation is still mining.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use alloy::primitives::U256;
use core::contracts::{self, Erc20Instance, RegistryInstance, SigningProvider};
use core::store::OrderStore;
use core::types::{ChainId, Swap};
use tracing::{info, warn};

/// Cap on the exponential backoff applied to an order that keeps failing
/// RPC calls, so a persistently broken order never waits longer than this
/// many retry-delay steps between attempts.
const MAX_BACKOFF_STEPS: u32 = 6;

/// Cooldown applied after a successful submission, long enough for the
/// transaction to mine before the next poll would otherwise try again.
const POST_SUBMIT_COOLDOWN: Duration = Duration::from_secs(120);

struct OrderState {
    next_attempt: Instant,
    consecutive_failures: u32,
}

pub struct UdaWatcher {
    store: Arc<dyn OrderStore>,
    provider: SigningProvider,
    registry: RegistryInstance<SigningProvider>,
    chain_id: ChainId,
    retry_delay: Duration,
    cooldowns: Mutex<HashMap<String, OrderState>>,
}

impl UdaWatcher {
    pub fn new(
        store: Arc<dyn OrderStore>,
        provider: SigningProvider,
        registry: RegistryInstance<SigningProvider>,
        chain_id: ChainId,
        retry_delay: Duration,
    ) -> Self {
        UdaWatcher {
            store,
            provider,
            registry,
            chain_id,
            retry_delay,
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    pub async fn tick(&self) {
        let orders = match self.store.pending_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                warn!(error = %e, "failed to load pending orders");
                return;
            }
        };

        let now = Instant::now();
        for order in orders {
            let swap = order.source_swap.clone();
            if swap.chain != self.chain_id || swap.initiate_tx_hash.is_some() {
                continue;
            }
            let Some(deposit_address) = swap.deposit_address.clone() else {
                continue;
            };

            if self.in_cooldown(&order.create_id, now) {
                continue;
            }

            match self.try_activate(&swap, &deposit_address).await {
                Ok(true) => {
                    info!(create_id = %order.create_id, %deposit_address, "submitted uda activation");
                    self.record_success(&order.create_id, now);
                }
                Ok(false) => {
                    // Balance not yet sufficient; nothing to record, retry next tick.
                }
                Err(e) => {
                    warn!(create_id = %order.create_id, error = %e, "uda activation attempt failed");
                    self.record_failure(&order.create_id, now);
                }
            }
        }
    }

    fn in_cooldown(&self, create_id: &str, now: Instant) -> bool {
        let cooldowns = self.cooldowns.lock().unwrap();
        cooldowns.get(create_id).is_some_and(|s| s.next_attempt > now)
    }

    fn record_success(&self, create_id: &str, now: Instant) {
        let mut cooldowns = self.cooldowns.lock().unwrap();
        cooldowns.insert(
            create_id.to_string(),
            OrderState {
                next_attempt: now + POST_SUBMIT_COOLDOWN,
                consecutive_failures: 0,
            },
        );
    }

    fn record_failure(&self, create_id: &str, now: Instant) {
        let mut cooldowns = self.cooldowns.lock().unwrap();
        let entry = cooldowns.entry(create_id.to_string()).or_insert(OrderState {
            next_attempt: now,
            consecutive_failures: 0,
        });
        entry.consecutive_failures = (entry.consecutive_failures + 1).min(MAX_BACKOFF_STEPS);
        let backoff = self.retry_delay * 2u32.saturating_pow(entry.consecutive_failures);
        entry.next_attempt = now + backoff;
    }

    /// Returns `Ok(true)` if an activation transaction was submitted,
    /// `Ok(false)` if the balance is not yet sufficient.
    async fn try_activate(&self, swap: &Swap, deposit_address: &str) -> anyhow::Result<bool> {
        let token = contracts::parse_address(&swap.token_address)?;
        let deposit = contracts::parse_address(deposit_address)?;
        let erc20 = Erc20Instance::new(token, self.provider.clone());

        let balance: U256 = erc20.balanceOf(deposit).call().await?;
        let required = contracts::amount_to_u256(&swap.amount)?;
        if balance < required {
            return Ok(false);
        }

        let refund_address = contracts::parse_address(&swap.initiator)?;
        let redeemer_address = contracts::parse_address(&swap.redeemer)?;
        let timelock = U256::from(swap.timelock);
        let secret_hash = contracts::parse_secret_hash(&swap.secret_hash.to_hex())?;

        let sent = self
            .registry
            .createERC20SwapAddress(token, refund_address, redeemer_address, timelock, required, secret_hash)
            .send()
            .await;

        let pending = match sent {
            Ok(pending) => pending,
            Err(e) => {
                // The registry reverts on a duplicate deterministic address;
                // treat that as the activation having already succeeded
                // rather than a failure worth backing off on (§4.4 invariant:
                // "guarded by the idempotence of the registry contract itself").
                let revert = core::CoreError::ContractRevert(e.to_string());
                if revert.is_idempotent_success() {
                    return Ok(true);
                }
                return Err(e.into());
            }
        };

        let tx_hash = pending.tx_hash();
        info!(%tx_hash, %deposit_address, "registry activation transaction sent");

        Ok(true)
    }
}
