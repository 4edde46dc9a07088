//! Two-leaf Taproot HTLC construction for Bitcoin swaps (spec §4.3).
//!
//! Redeem leaf: `OP_SHA256 <secretHash> OP_EQUALVERIFY <redeemerXOnlyPubkey> OP_CHECKSIG`.
//! Refund leaf: `<timelock> OP_CSV OP_DROP <initiatorXOnlyPubkey> OP_CHECKSIG`.
//!
//! The two leaves are combined at the same Taproot tree depth, which makes
//! `rust-bitcoin`'s `TaprootBuilder` merge them via BIP-341's tagged-hash
//! Merkle combination (`TapBranch`) over the lexicographically-sorted pair of
//! leaf hashes — the same rule spec.md calls for explicitly.

use anyhow::{anyhow, Result};
use bitcoin::key::{Secp256k1, XOnlyPublicKey};
use bitcoin::opcodes::all::{OP_CHECKSIG, OP_CSV, OP_DROP, OP_EQUALVERIFY, OP_SHA256};
use bitcoin::secp256k1::{PublicKey, SecretKey};
use bitcoin::taproot::{LeafVersion, TaprootBuilder, TaprootSpendInfo};
use bitcoin::{Address, KnownHrp, Network, ScriptBuf};
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

/// Nothing-up-my-sleeve internal key: `H + r*G` where `r = SHA256(domain tag)`
/// and `H` is the standard BIP-341 NUMS point. Neither party can know the
/// discrete log of this key, so the key-path spend is provably unusable —
/// only the two script paths below can spend.
pub static HTLC_NUMS: Lazy<XOnlyPublicKey> = Lazy::new(|| {
    const DOMAIN_TAG: &[u8] = b"atomic-swap-htlc/nums-v1";
    const H_HEX: &str = "0250929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0";

    let r = Sha256::digest(DOMAIN_TAG);
    let h_bytes = hex::decode(H_HEX).expect("valid hex literal");
    let h = PublicKey::from_slice(&h_bytes).expect("valid BIP-341 H point");

    let secp = Secp256k1::new();
    let r_scalar = SecretKey::from_slice(&r).expect("sha256 output is a valid scalar");
    let r_g = PublicKey::from_secret_key(&secp, &r_scalar);

    let nums = h.combine(&r_g).expect("point addition cannot fail for independent points");
    let (xonly, _) = nums.x_only_public_key();
    xonly
});

#[derive(Debug, Clone)]
pub struct BitcoinHtlcParams {
    pub secret_hash: [u8; 32],
    pub redeemer_pubkey: XOnlyPublicKey,
    pub initiator_pubkey: XOnlyPublicKey,
    /// Absolute block height (Bitcoin timelocks in this system are absolute,
    /// matching §3: "timelock (relative blocks for EVM, absolute for Bitcoin)").
    pub timelock: u32,
}

pub fn redeem_leaf(secret_hash: &[u8; 32], redeemer_pubkey: &XOnlyPublicKey) -> ScriptBuf {
    bitcoin::script::Builder::new()
        .push_opcode(OP_SHA256)
        .push_slice(secret_hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_slice(redeemer_pubkey.serialize())
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

pub fn refund_leaf(timelock: u32, initiator_pubkey: &XOnlyPublicKey) -> ScriptBuf {
    bitcoin::script::Builder::new()
        .push_int(timelock as i64)
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_slice(initiator_pubkey.serialize())
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

fn taproot_spend_info(params: &BitcoinHtlcParams) -> Result<TaprootSpendInfo> {
    let redeem = redeem_leaf(&params.secret_hash, &params.redeemer_pubkey);
    let refund = refund_leaf(params.timelock, &params.initiator_pubkey);

    let secp = Secp256k1::new();
    let builder = TaprootBuilder::new()
        .add_leaf(1, redeem)
        .map_err(|e| anyhow!("unable to add redeem leaf: {e}"))?
        .add_leaf(1, refund)
        .map_err(|e| anyhow!("unable to add refund leaf: {e}"))?;

    if !builder.is_finalizable() {
        return Err(anyhow!("taproot builder is not in a finalizable state"));
    }

    builder
        .finalize(&secp, *HTLC_NUMS)
        .map_err(|_| anyhow!("failed to finalize taproot spend info"))
}

pub fn htlc_address(params: &BitcoinHtlcParams, network: Network) -> Result<Address> {
    let secp = Secp256k1::new();
    let spend_info = taproot_spend_info(params)?;
    Ok(Address::p2tr(
        &secp,
        *HTLC_NUMS,
        spend_info.merkle_root(),
        KnownHrp::from(network),
    ))
}

/// Parses the `network` string used throughout `ChainConfig::Bitcoin`
/// (`"mainnet"`/`"bitcoin"`, `"testnet"`, `"testnet4"`, `"regtest"`,
/// `"signet"`) into `bitcoin::Network`.
pub fn parse_network(s: &str) -> Result<Network, crate::error::CoreError> {
    match s {
        "mainnet" | "bitcoin" => Ok(Network::Bitcoin),
        "testnet" => Ok(Network::Testnet),
        "testnet4" => Ok(Network::Testnet4),
        "regtest" => Ok(Network::Regtest),
        "signet" => Ok(Network::Signet),
        other => Err(crate::error::CoreError::InvalidRequest(format!("unknown bitcoin network: {other}"))),
    }
}

/// The `swap_id` for a Bitcoin swap is the 32-byte tweaked output key, i.e.
/// the x-only key actually encoded in the P2TR output (spec §4.3: "The
/// `swap_id` is the 32-byte tweaked output key").
pub fn swap_id(params: &BitcoinHtlcParams) -> Result<[u8; 32]> {
    let spend_info = taproot_spend_info(params)?;
    Ok(spend_info.output_key().serialize())
}

pub enum Leaf {
    Redeem,
    Refund,
}

/// Leaf script plus its serialized Taproot control block, needed to populate
/// a script-path spend's witness stack.
pub fn control_block(params: &BitcoinHtlcParams, leaf: Leaf) -> Result<(ScriptBuf, Vec<u8>)> {
    let secp = Secp256k1::new();
    let spend_info = taproot_spend_info(params)?;

    let script = match leaf {
        Leaf::Redeem => redeem_leaf(&params.secret_hash, &params.redeemer_pubkey),
        Leaf::Refund => refund_leaf(params.timelock, &params.initiator_pubkey),
    };

    let cb = spend_info
        .control_block(&(script.clone(), LeafVersion::TapScript))
        .ok_or_else(|| anyhow!("script not present in taproot tree"))?;

    let _ = &secp; // control_block lookup does not need secp, kept for symmetry with finalize()
    Ok((script, cb.serialize()))
}

/// Witness stack for a redeem spend, in the position order the network
/// expects: `[signature, secret, script, control_block]`. The signature slot
/// is a placeholder zero-length entry — real signing happens in
/// `bitcoin-chain`, which replaces it with an actual Schnorr signature over
/// this leaf's sighash before broadcast.
pub fn redeem_witness_template(params: &BitcoinHtlcParams, secret: &[u8; 32]) -> Result<Vec<Vec<u8>>> {
    let (script, cb) = control_block(params, Leaf::Redeem)?;
    Ok(vec![Vec::new(), secret.to_vec(), script.into_bytes(), cb])
}

/// Witness stack for a refund spend: `[signature, script, control_block]`.
pub fn refund_witness_template(params: &BitcoinHtlcParams) -> Result<Vec<Vec<u8>>> {
    let (script, cb) = control_block(params, Leaf::Refund)?;
    Ok(vec![Vec::new(), script.into_bytes(), cb])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn params() -> BitcoinHtlcParams {
        let secret_hash_hex = "a4ddaad30ff45cfcc7fbae1d49b78ef717341b2b81fdd73410200788b9220da";
        let initiator_hex = "aa86614fda03b039bf077e7be6531159c3b157166259168908097b998315691";
        let redeemer_hex = "4ee866579971fd784cad175fb000d1a5245c1a5031ce46fef44469000ebc881";

        let mut secret_hash = [0u8; 32];
        secret_hash.copy_from_slice(&hex::decode(secret_hash_hex).unwrap());

        BitcoinHtlcParams {
            secret_hash,
            redeemer_pubkey: XOnlyPublicKey::from_str(redeemer_hex).unwrap(),
            initiator_pubkey: XOnlyPublicKey::from_str(initiator_hex).unwrap(),
            timelock: 144,
        }
    }

    #[test]
    fn address_has_exactly_two_leaves() {
        let p = params();
        let info = taproot_spend_info(&p).unwrap();
        assert_eq!(info.script_map().len(), 2);
    }

    #[test]
    fn address_derivation_is_deterministic() {
        let p = params();
        let a1 = htlc_address(&p, Network::Testnet).unwrap();
        let a2 = htlc_address(&p, Network::Testnet).unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn different_secret_hash_yields_different_address() {
        let mut p1 = params();
        let mut p2 = params();
        p2.secret_hash[0] ^= 0xff;
        let _ = &mut p1;
        let a1 = htlc_address(&p1, Network::Testnet).unwrap();
        let a2 = htlc_address(&p2, Network::Testnet).unwrap();
        assert_ne!(a1, a2);
    }

    #[test]
    fn swap_id_matches_output_key_length() {
        let p = params();
        let id = swap_id(&p).unwrap();
        assert_eq!(id.len(), 32);
    }

    #[test]
    fn redeem_witness_has_four_elements_in_order() {
        let p = params();
        let secret = [9u8; 32];
        let witness = redeem_witness_template(&p, &secret).unwrap();
        assert_eq!(witness.len(), 4);
        assert_eq!(witness[1], secret.to_vec());
    }

    #[test]
    fn refund_witness_has_three_elements() {
        let p = params();
        let witness = refund_witness_template(&p).unwrap();
        assert_eq!(witness.len(), 3);
    }
}
