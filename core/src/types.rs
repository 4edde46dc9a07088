use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::Num;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque chain tag, e.g. `"bitcoin_testnet"`, `"arbitrum_sepolia"`, `"avalanche_testnet"`.
///
/// The closed set of valid values lives in `Config`, not in this type — `ChainId`
/// itself is just a validated string so new chains can be added by configuration
/// alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ChainId(pub String);

impl ChainId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChainId {
    fn from(s: &str) -> Self {
        ChainId(s.to_string())
    }
}

impl From<String> for ChainId {
    fn from(s: String) -> Self {
        ChainId(s)
    }
}

/// Whether a chain is Bitcoin-style UTXO or an EVM chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Bitcoin,
    Evm,
}

/// `"chain:asset"`, e.g. `"avalanche_testnet:avax"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey {
    pub chain: ChainId,
    pub asset: String,
}

impl AssetKey {
    pub fn parse(s: &str) -> Result<Self, crate::error::CoreError> {
        let mut parts = s.splitn(2, ':');
        let chain = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| crate::error::CoreError::InvalidRequest(format!("malformed asset key: {s}")))?;
        let asset = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| crate::error::CoreError::InvalidRequest(format!("malformed asset key: {s}")))?;
        Ok(AssetKey {
            chain: ChainId::from(chain),
            asset: asset.to_lowercase(),
        })
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.asset)
    }
}

impl Serialize for AssetKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AssetKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AssetKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Per-asset descriptor used for decimal scaling and price lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(rename = "cmcId")]
    pub cmc_id: u64,
}

/// Non-negative integer amount in an asset's base units, arbitrary precision.
///
/// Encoded on the wire as a decimal string; held internally as a big integer so
/// arithmetic never loses precision regardless of chain or token decimals.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(pub BigUint);

impl Amount {
    pub fn zero() -> Self {
        Amount(BigUint::from(0u32))
    }

    pub fn from_u64(v: u64) -> Self {
        Amount(BigUint::from(v))
    }

    pub fn parse(s: &str) -> Result<Self, crate::error::CoreError> {
        BigUint::from_str_radix(s, 10)
            .map(Amount)
            .map_err(|_| crate::error::CoreError::InvalidRequest(format!("invalid amount: {s}")))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == BigUint::from(0u32)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// 32-byte secret whose SHA-256 is the order's `secret_hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret(pub [u8; 32]);

impl Secret {
    pub fn hash(&self) -> SecretHash {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(self.0);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        SecretHash(out)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, crate::error::CoreError> {
        let bytes = decode_hex_32(s)?;
        Ok(Secret(bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecretHash(pub [u8; 32]);

impl SecretHash {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, crate::error::CoreError> {
        let bytes = decode_hex_32(s)?;
        Ok(SecretHash(bytes))
    }

    pub fn matches(&self, secret: &Secret) -> bool {
        secret.hash().0 == self.0
    }
}

impl fmt::Display for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn decode_hex_32(s: &str) -> Result<[u8; 32], crate::error::CoreError> {
    let clean = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(clean)
        .map_err(|e| crate::error::CoreError::InvalidRequest(format!("invalid hex: {e}")))?;
    if bytes.len() != 32 {
        return Err(crate::error::CoreError::InvalidRequest(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// A user-local 32-byte private key used to deterministically regenerate secrets.
/// Must satisfy `1 <= k < n` for the secp256k1 group order `n`; validity is
/// enforced wherever a `DigestKey` is constructed from raw bytes (see `secret::DigestKey::from_bytes`).
#[derive(Clone)]
pub struct DigestKey(pub [u8; 32]);

/// Which leg of a swap an action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformOn {
    Source,
    Destination,
}

/// The immutable request a client submits to create an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrder {
    pub from: AssetKey,
    pub to: AssetKey,
    pub source_amount: Amount,
    pub destination_amount: Amount,
    pub nonce: u64,
    pub initiator_source_address: String,
    pub initiator_destination_address: String,
    pub secret_hash: SecretHash,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bitcoin_optional_recipient: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input_token_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output_token_price: Option<f64>,
}

/// One side (source or destination) of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swap {
    pub swap_id: String,
    pub chain: ChainId,
    pub asset: String,
    pub htlc_address: String,
    pub token_address: String,
    pub initiator: String,
    pub redeemer: String,
    pub deposit_address: Option<String>,
    pub amount: Amount,
    pub filled_amount: Amount,
    /// Relative blocks for EVM, absolute block height for Bitcoin.
    pub timelock: u64,
    pub secret_hash: SecretHash,
    pub secret: Option<Secret>,
    pub initiate_tx_hash: Option<String>,
    pub redeem_tx_hash: Option<String>,
    pub refund_tx_hash: Option<String>,
    pub initiate_block_number: Option<u64>,
    pub redeem_block_number: Option<u64>,
    pub refund_block_number: Option<u64>,
}

impl Swap {
    /// `true` once an initiate transaction hash has been observed for this side.
    pub fn is_initiated(&self) -> bool {
        self.initiate_tx_hash.is_some()
    }

    pub fn is_confirmed(&self) -> bool {
        self.initiate_block_number.is_some()
    }

    pub fn is_redeemed(&self) -> bool {
        self.redeem_tx_hash.is_some()
    }

    pub fn is_refunded(&self) -> bool {
        self.refund_tx_hash.is_some()
    }
}

/// The root aggregate: a create request plus its two swap legs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub create_id: String,
    pub create_order: CreateOrder,
    pub source_swap: Swap,
    pub destination_swap: Swap,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Derived projection of an order's lifecycle; never stored as source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Created,
    DepositDetected,
    DepositConfirmed,
    CounterPartyInitiated,
    Redeeming,
    CounterPartyRedeemed,
    Completed,
    Refunded,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Created => "created",
            Status::DepositDetected => "deposit_detected",
            Status::DepositConfirmed => "deposit_confirmed",
            Status::CounterPartyInitiated => "counter_party_initiated",
            Status::Redeeming => "redeeming",
            Status::CounterPartyRedeemed => "counter_party_redeemed",
            Status::Completed => "completed",
            Status::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

/// Response envelope mirrored by every HTTP surface in this workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<T> {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

impl<T> Response<T> {
    pub fn ok(result: T) -> Self {
        Self {
            status: ResponseStatus::Ok,
            result: Some(result),
        }
    }
}

impl Response<String> {
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            result: Some(message.into()),
        }
    }
}
