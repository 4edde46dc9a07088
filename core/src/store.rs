//! The Order Store: a single document collection (`orders`) keyed by
//! `create_order.create_id`, shared by every component (§6 "Persisted
//! state"). `OrderStore` is a trait so watchers/executors can be unit tested
//! against an in-memory fake instead of a live MongoDB instance (the prior
//! version of this workspace's Bitcoin-side code used three separate
//! collections joined with `$lookup`; this workspace standardizes on the
//! single-collection-with-embedded-swaps shape the Bitcoin watcher's own
//! store already used, since it matches §6 exactly).

use async_trait::async_trait;
use futures::stream::StreamExt;
use mongodb::bson::{doc, Bson};
use mongodb::{Client, Collection, Database};

use crate::error::CoreError;
use crate::types::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

impl Side {
    pub fn field(self, suffix: &str) -> String {
        match self {
            Side::Source => format!("source_swap.{suffix}"),
            Side::Destination => format!("destination_swap.{suffix}"),
        }
    }
}

/// Abstraction over order persistence. Every method's guard semantics mirror
/// §5's "field-exists guard" synchronization model: updates only take effect
/// if the target field is currently null, so concurrent watcher/executor
/// writers never race on the same field.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order. Returns `CoreError::Duplicate` if `create_id`
    /// already exists (Invariant 1).
    async fn insert(&self, order: Order) -> Result<(), CoreError>;

    async fn get_by_create_id(&self, create_id: &str) -> Result<Option<Order>, CoreError>;

    async fn get_by_user(&self, address: &str) -> Result<Vec<Order>, CoreError>;

    /// Finds the order owning `swap_id` on either side, returning which side
    /// matched so callers never have to guess.
    async fn get_by_swap_id(&self, swap_id: &str) -> Result<Option<(Order, Side)>, CoreError>;

    /// Sets `initiate_tx_hash` only if it is currently null. Returns `true`
    /// if the write took effect.
    async fn set_initiate_tx(&self, create_id: &str, side: Side, tx_hash: &str) -> Result<bool, CoreError>;

    async fn set_initiate_block(&self, create_id: &str, side: Side, block_number: u64) -> Result<bool, CoreError>;

    async fn set_redeem(
        &self,
        create_id: &str,
        side: Side,
        tx_hash: &str,
        block_number: Option<u64>,
        secret: Option<&str>,
    ) -> Result<bool, CoreError>;

    async fn set_refund(&self, create_id: &str, side: Side, tx_hash: &str, block_number: Option<u64>) -> Result<bool, CoreError>;

    async fn set_deposit_address(&self, create_id: &str, side: Side, deposit_address: &str) -> Result<bool, CoreError>;

    /// All orders not yet in a terminal status, for watcher/executor polling.
    async fn pending_orders(&self) -> Result<Vec<Order>, CoreError>;
}

#[derive(Clone)]
pub struct MongoOrderStore {
    collection: Collection<Order>,
}

impl MongoOrderStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, CoreError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| CoreError::Storage(format!("failed to connect to MongoDB: {e}")))?;
        Ok(Self::from_database(client.database(database)))
    }

    pub fn from_database(db: Database) -> Self {
        MongoOrderStore {
            collection: db.collection::<Order>("orders"),
        }
    }

    fn swap_id_filter(swap_id: &str) -> mongodb::bson::Document {
        doc! {
            "$or": [
                { "source_swap.swap_id": swap_id },
                { "destination_swap.swap_id": swap_id },
            ]
        }
    }
}

#[async_trait]
impl OrderStore for MongoOrderStore {
    async fn insert(&self, order: Order) -> Result<(), CoreError> {
        let existing = self
            .collection
            .find_one(doc! { "create_id": &order.create_id })
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        if existing.is_some() {
            return Err(CoreError::Duplicate(format!(
                "order with create_id {} already exists",
                order.create_id
            )));
        }

        self.collection
            .insert_one(order)
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get_by_create_id(&self, create_id: &str) -> Result<Option<Order>, CoreError> {
        self.collection
            .find_one(doc! { "create_id": create_id })
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))
    }

    async fn get_by_user(&self, address: &str) -> Result<Vec<Order>, CoreError> {
        let filter = doc! {
            "$or": [
                { "create_order.initiator_source_address": address },
                { "create_order.initiator_destination_address": address },
            ]
        };
        let mut cursor = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;

        let mut orders = Vec::new();
        while let Some(order) = cursor.next().await {
            orders.push(order.map_err(|e| CoreError::Storage(e.to_string()))?);
        }
        Ok(orders)
    }

    async fn get_by_swap_id(&self, swap_id: &str) -> Result<Option<(Order, Side)>, CoreError> {
        let order = self
            .collection
            .find_one(Self::swap_id_filter(swap_id))
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;

        Ok(order.map(|o| {
            let side = if o.source_swap.swap_id == swap_id {
                Side::Source
            } else {
                Side::Destination
            };
            (o, side)
        }))
    }

    async fn set_initiate_tx(&self, create_id: &str, side: Side, tx_hash: &str) -> Result<bool, CoreError> {
        let field = side.field("initiate_tx_hash");
        let filter = doc! { "create_id": create_id, &field: Bson::Null };
        let update = doc! { "$set": { field: tx_hash } };
        let result = self
            .collection
            .update_one(filter, update)
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(result.modified_count > 0)
    }

    async fn set_initiate_block(&self, create_id: &str, side: Side, block_number: u64) -> Result<bool, CoreError> {
        let field = side.field("initiate_block_number");
        let filter = doc! { "create_id": create_id, &field: Bson::Null };
        let update = doc! { "$set": { field: block_number as i64 } };
        let result = self
            .collection
            .update_one(filter, update)
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(result.modified_count > 0)
    }

    async fn set_redeem(
        &self,
        create_id: &str,
        side: Side,
        tx_hash: &str,
        block_number: Option<u64>,
        secret: Option<&str>,
    ) -> Result<bool, CoreError> {
        let tx_field = side.field("redeem_tx_hash");
        let filter = doc! { "create_id": create_id, &tx_field: Bson::Null };

        let mut set = doc! { tx_field: tx_hash };
        if let Some(block) = block_number {
            set.insert(side.field("redeem_block_number"), block as i64);
        }
        if let Some(secret) = secret {
            set.insert(side.field("secret"), secret);
        }

        let result = self
            .collection
            .update_one(filter, doc! { "$set": set })
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(result.modified_count > 0)
    }

    async fn set_refund(&self, create_id: &str, side: Side, tx_hash: &str, block_number: Option<u64>) -> Result<bool, CoreError> {
        let tx_field = side.field("refund_tx_hash");
        let filter = doc! { "create_id": create_id, &tx_field: Bson::Null };

        let mut set = doc! { tx_field: tx_hash };
        if let Some(block) = block_number {
            set.insert(side.field("refund_block_number"), block as i64);
        }

        let result = self
            .collection
            .update_one(filter, doc! { "$set": set })
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(result.modified_count > 0)
    }

    async fn set_deposit_address(&self, create_id: &str, side: Side, deposit_address: &str) -> Result<bool, CoreError> {
        let field = side.field("deposit_address");
        let filter = doc! { "create_id": create_id, &field: Bson::Null };
        let update = doc! { "$set": { field: deposit_address } };
        let result = self
            .collection
            .update_one(filter, update)
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(result.modified_count > 0)
    }

    async fn pending_orders(&self) -> Result<Vec<Order>, CoreError> {
        let filter = doc! {
            "$or": [
                { "source_swap.refund_tx_hash": Bson::Null, "destination_swap.refund_tx_hash": Bson::Null, "source_swap.redeem_tx_hash": Bson::Null },
                { "source_swap.refund_tx_hash": Bson::Null, "destination_swap.refund_tx_hash": Bson::Null, "destination_swap.redeem_tx_hash": Bson::Null },
            ]
        };
        let mut cursor = self
            .collection
            .find(filter)
            .await
            .map_err(|e| CoreError::Storage(e.to_string()))?;

        let mut orders = Vec::new();
        while let Some(order) = cursor.next().await {
            orders.push(order.map_err(|e| CoreError::Storage(e.to_string()))?);
        }
        Ok(orders)
    }
}

/// In-memory fake used by executor/watcher unit tests (§8, SPEC_FULL.md §8:
/// "not a live MongoDB instance").
#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeOrderStore {
        orders: Mutex<Vec<Order>>,
    }

    impl FakeOrderStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn snapshot(&self) -> Vec<Order> {
            self.orders.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OrderStore for FakeOrderStore {
        async fn insert(&self, order: Order) -> Result<(), CoreError> {
            let mut orders = self.orders.lock().unwrap();
            if orders.iter().any(|o| o.create_id == order.create_id) {
                return Err(CoreError::Duplicate(order.create_id));
            }
            orders.push(order);
            Ok(())
        }

        async fn get_by_create_id(&self, create_id: &str) -> Result<Option<Order>, CoreError> {
            Ok(self.orders.lock().unwrap().iter().find(|o| o.create_id == create_id).cloned())
        }

        async fn get_by_user(&self, address: &str) -> Result<Vec<Order>, CoreError> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .filter(|o| {
                    o.create_order.initiator_source_address == address
                        || o.create_order.initiator_destination_address == address
                })
                .cloned()
                .collect())
        }

        async fn get_by_swap_id(&self, swap_id: &str) -> Result<Option<(Order, Side)>, CoreError> {
            let orders = self.orders.lock().unwrap();
            for order in orders.iter() {
                if order.source_swap.swap_id == swap_id {
                    return Ok(Some((order.clone(), Side::Source)));
                }
                if order.destination_swap.swap_id == swap_id {
                    return Ok(Some((order.clone(), Side::Destination)));
                }
            }
            Ok(None)
        }

        async fn set_initiate_tx(&self, create_id: &str, side: Side, tx_hash: &str) -> Result<bool, CoreError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders.iter_mut().find(|o| o.create_id == create_id);
            if let Some(order) = order {
                let swap = match side {
                    Side::Source => &mut order.source_swap,
                    Side::Destination => &mut order.destination_swap,
                };
                if swap.initiate_tx_hash.is_none() {
                    swap.initiate_tx_hash = Some(tx_hash.to_string());
                    return Ok(true);
                }
            }
            Ok(false)
        }

        async fn set_initiate_block(&self, create_id: &str, side: Side, block_number: u64) -> Result<bool, CoreError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders.iter_mut().find(|o| o.create_id == create_id);
            if let Some(order) = order {
                let swap = match side {
                    Side::Source => &mut order.source_swap,
                    Side::Destination => &mut order.destination_swap,
                };
                if swap.initiate_block_number.is_none() {
                    swap.initiate_block_number = Some(block_number);
                    return Ok(true);
                }
            }
            Ok(false)
        }

        async fn set_redeem(
            &self,
            create_id: &str,
            side: Side,
            tx_hash: &str,
            block_number: Option<u64>,
            secret: Option<&str>,
        ) -> Result<bool, CoreError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders.iter_mut().find(|o| o.create_id == create_id);
            if let Some(order) = order {
                let swap = match side {
                    Side::Source => &mut order.source_swap,
                    Side::Destination => &mut order.destination_swap,
                };
                if swap.redeem_tx_hash.is_none() {
                    swap.redeem_tx_hash = Some(tx_hash.to_string());
                    swap.redeem_block_number = block_number;
                    if let Some(secret_hex) = secret {
                        swap.secret = crate::types::Secret::from_hex(secret_hex).ok();
                    }
                    return Ok(true);
                }
            }
            Ok(false)
        }

        async fn set_refund(&self, create_id: &str, side: Side, tx_hash: &str, block_number: Option<u64>) -> Result<bool, CoreError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders.iter_mut().find(|o| o.create_id == create_id);
            if let Some(order) = order {
                let swap = match side {
                    Side::Source => &mut order.source_swap,
                    Side::Destination => &mut order.destination_swap,
                };
                if swap.refund_tx_hash.is_none() {
                    swap.refund_tx_hash = Some(tx_hash.to_string());
                    swap.refund_block_number = block_number;
                    return Ok(true);
                }
            }
            Ok(false)
        }

        async fn set_deposit_address(&self, create_id: &str, side: Side, deposit_address: &str) -> Result<bool, CoreError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders.iter_mut().find(|o| o.create_id == create_id);
            if let Some(order) = order {
                let swap = match side {
                    Side::Source => &mut order.source_swap,
                    Side::Destination => &mut order.destination_swap,
                };
                if swap.deposit_address.is_none() {
                    swap.deposit_address = Some(deposit_address.to_string());
                    return Ok(true);
                }
            }
            Ok(false)
        }

        async fn pending_orders(&self) -> Result<Vec<Order>, CoreError> {
            Ok(self
                .orders
                .lock()
                .unwrap()
                .iter()
                .filter(|o| {
                    !o.source_swap.is_refunded()
                        && !o.destination_swap.is_refunded()
                        && !o.source_swap.is_redeemed()
                        && !o.destination_swap.is_redeemed()
                })
                .cloned()
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeOrderStore;
    use super::*;
    use crate::types::{AssetKey, CreateOrder, SecretHash, Swap};

    fn swap(chain: &str, swap_id: &str) -> Swap {
        Swap {
            swap_id: swap_id.to_string(),
            chain: crate::types::ChainId::from(chain),
            asset: "btc".into(),
            htlc_address: "addr".into(),
            token_address: "".into(),
            initiator: "i".into(),
            redeemer: "r".into(),
            deposit_address: None,
            amount: crate::types::Amount::from_u64(1000),
            filled_amount: crate::types::Amount::zero(),
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

    fn order(create_id: &str) -> Order {
        Order {
            create_id: create_id.to_string(),
            create_order: CreateOrder {
                from: AssetKey::parse("bitcoin_testnet:btc").unwrap(),
                to: AssetKey::parse("avalanche_testnet:avax").unwrap(),
                source_amount: crate::types::Amount::from_u64(1000),
                destination_amount: crate::types::Amount::from_u64(1000),
                nonce: 1,
                initiator_source_address: "user-btc".into(),
                initiator_destination_address: "user-evm".into(),
                secret_hash: SecretHash([1u8; 32]),
                bitcoin_optional_recipient: None,
                created_at: chrono::Utc::now(),
                input_token_price: None,
                output_token_price: None,
            },
            source_swap: swap("bitcoin_testnet", "src-1"),
            destination_swap: swap("avalanche_testnet", "dst-1"),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_create_id() {
        let store = FakeOrderStore::new();
        store.insert(order("cid-1")).await.unwrap();
        let err = store.insert(order("cid-1")).await.unwrap_err();
        assert!(matches!(err, CoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn set_initiate_tx_is_guarded_by_existing_null() {
        let store = FakeOrderStore::new();
        store.insert(order("cid-2")).await.unwrap();

        let first = store.set_initiate_tx("cid-2", Side::Source, "0xabc").await.unwrap();
        assert!(first);

        let second = store.set_initiate_tx("cid-2", Side::Source, "0xdef").await.unwrap();
        assert!(!second, "second write must be rejected since the field is already populated");

        let fetched = store.get_by_create_id("cid-2").await.unwrap().unwrap();
        assert_eq!(fetched.source_swap.initiate_tx_hash.as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn get_by_swap_id_reports_the_matching_side() {
        let store = FakeOrderStore::new();
        store.insert(order("cid-3")).await.unwrap();

        let (found, side) = store.get_by_swap_id("dst-1").await.unwrap().unwrap();
        assert_eq!(found.create_id, "cid-3");
        assert_eq!(side, Side::Destination);
    }

    #[tokio::test]
    async fn pending_orders_excludes_redeemed_orders() {
        let store = FakeOrderStore::new();
        store.insert(order("cid-4")).await.unwrap();
        store.insert(order("cid-5")).await.unwrap();
        store.set_redeem("cid-4", Side::Source, "0xredeem", Some(99), None).await.unwrap();

        let pending = store.pending_orders().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].create_id, "cid-5");
    }
}
