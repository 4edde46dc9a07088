pub mod bitcoin_htlc;
pub mod clock;
pub mod config;
pub mod contracts;
pub mod error;
pub mod evm_id;
pub mod scheduler;
pub mod secret;
pub mod status;
pub mod store;
pub mod types;

pub use error::CoreError;
pub use types::{
    AssetDescriptor, AssetKey, Amount, ChainId, ChainKind, CreateOrder, DigestKey, Order,
    PerformOn, Response, ResponseStatus, Secret, SecretHash, Status, Swap,
};
