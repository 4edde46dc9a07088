pub mod htlc_handler;
pub mod indexer;

pub use indexer::{AddressInfo, ChainStats, MempoolStats, Status, TxInfo, TxInput, UTXO};
