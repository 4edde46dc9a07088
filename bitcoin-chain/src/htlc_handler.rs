//! Transaction construction, signing and broadcast for the two-leaf Taproot
//! HTLC whose address/witness-template shape is defined in
//! `core::bitcoin_htlc`. This crate owns everything `core` deliberately does
//! not: UTXO selection, fee estimation, signature production and talking to
//! an indexer.

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use bitcoin::{
    absolute::LockTime,
    key::{Keypair, Secp256k1},
    secp256k1::{All, Message},
    sighash::SighashCache,
    taproot::LeafVersion,
    transaction::Version,
    Address, Amount, CompressedPublicKey, EcdsaSighashType, OutPoint, PrivateKey, PublicKey,
    Script, ScriptBuf, Sequence, TapLeafHash, TapSighashType, Transaction, TxIn, TxOut, Txid,
    Witness,
};
use core::bitcoin_htlc::{control_block, BitcoinHtlcParams, Leaf};

use crate::indexer::{SimpleIndexer, UTXO};

const DEFAULT_FEE_RATE_SAT_PER_VBYTE: u64 = 250;
const ESTIMATED_TAPROOT_TX_SIZE_VBYTES: u64 = 200;
const RBF_SEQUENCE: u32 = 0xfffffffd;

/// Handler for HTLC (Hashed Timelock Contract) operations on Bitcoin.
pub struct HtlcHandler {
    network: bitcoin::Network,
    indexer: SimpleIndexer,
    secp: Secp256k1<All>,
}

impl HtlcHandler {
    pub fn new(network: bitcoin::Network, indexer_url: &str) -> Result<Self> {
        Ok(Self {
            network,
            indexer: SimpleIndexer::new(indexer_url)?,
            secp: Secp256k1::new(),
        })
    }

    pub async fn broadcast_tx(&self, tx: &Transaction) -> Result<String> {
        self.indexer.submit_tx(tx).await.context("failed to broadcast transaction")
    }

    pub fn get_btc_address_for_priv_key(&self, private_key: &PrivateKey) -> Result<String> {
        let public_key = PublicKey::from_private_key(&self.secp, private_key);
        let compressed_pubkey = CompressedPublicKey::try_from(public_key)?;
        Ok(Address::p2wpkh(&compressed_pubkey, self.network).to_string())
    }

    /// Funds an HTLC address with `amount` sats from `private_key`'s P2WPKH address.
    pub async fn initiate_htlc(
        &self,
        private_key: &PrivateKey,
        htlc_addr: &Address,
        amount: u64,
    ) -> Result<Transaction> {
        let public_key = PublicKey::from_private_key(&self.secp, private_key);
        let compressed_pubkey = CompressedPublicKey::try_from(public_key)?;
        let sender_address = Address::p2wpkh(&compressed_pubkey, self.network);

        let utxos = self
            .indexer
            .get_utxos_for_amount(&sender_address.to_string(), amount as i64)
            .await?;

        let (inputs, input_values) = self.create_inputs_from_utxos(&utxos)?;
        let outputs = self.create_outputs_for_htlc(amount, htlc_addr, &sender_address, &input_values)?;

        let mut unsigned_tx = self.create_unsigned_transaction(inputs, outputs);
        self.sign_p2wpkh_transaction(&mut unsigned_tx, &public_key, private_key, &input_values)?;

        Ok(unsigned_tx)
    }

    /// Builds and signs a script-path spend of the HTLC, using the redeem
    /// leaf when `secret` is `Some` and the refund leaf otherwise.
    pub async fn create_redeem_tx(
        &self,
        htlc_params: &BitcoinHtlcParams,
        htlc_addr: &Address,
        secret: Option<&[u8; 32]>,
        receiver_address: Option<String>,
        private_key: &PrivateKey,
        fee_rate: u64,
    ) -> Result<Transaction> {
        let recipient = match receiver_address {
            Some(addr) => addr,
            None => self.get_btc_address_for_priv_key(private_key)?,
        };

        let utxo = self.get_htlc_utxo(htlc_addr).await?;
        let recipient_addr = self.parse_and_validate_address(&recipient)?;

        let fee = fee_rate * ESTIMATED_TAPROOT_TX_SIZE_VBYTES;
        let output_value = utxo.value.saturating_sub(fee);

        let tx = self.create_unsigned_redeem_tx(&utxo, &recipient_addr, output_value)?;

        let (leaf, mut witness_stack) = match secret {
            Some(s) => (Leaf::Redeem, core::bitcoin_htlc::redeem_witness_template(htlc_params, s)?),
            None => (Leaf::Refund, core::bitcoin_htlc::refund_witness_template(htlc_params)?),
        };
        let script = control_block(htlc_params, leaf)?.0;
        let leaf_hash = self.create_leaf_hash(&script.into_bytes())?;
        let prevouts = self.create_prevouts_for_signing(htlc_addr, utxo.value);

        let tx = self.sign_and_set_taproot_witness(
            tx,
            0,
            leaf_hash,
            private_key,
            TapSighashType::All,
            prevouts,
            &mut witness_stack,
        )?;

        Ok(tx)
    }

    fn create_inputs_from_utxos(&self, utxos: &[UTXO]) -> Result<(Vec<TxIn>, Vec<u64>)> {
        let mut inputs = Vec::new();
        let mut input_values = Vec::new();

        for utxo in utxos {
            let txid = Txid::from_str(&utxo.txid)?;
            inputs.push(TxIn {
                previous_output: OutPoint { txid, vout: utxo.vout },
                script_sig: ScriptBuf::new(),
                sequence: Sequence(RBF_SEQUENCE),
                witness: Witness::new(),
            });
            input_values.push(utxo.value);
        }

        Ok((inputs, input_values))
    }

    fn create_outputs_for_htlc(
        &self,
        amount: u64,
        htlc_addr: &Address,
        sender_address: &Address,
        input_values: &[u64],
    ) -> Result<Vec<TxOut>> {
        let fee = DEFAULT_FEE_RATE_SAT_PER_VBYTE * input_values.len() as u64;
        let total_input: u64 = input_values.iter().sum();

        let mut outputs = vec![TxOut {
            value: Amount::from_sat(amount),
            script_pubkey: htlc_addr.script_pubkey(),
        }];

        if total_input > (amount + fee) {
            outputs.push(TxOut {
                value: Amount::from_sat(total_input - amount - fee),
                script_pubkey: sender_address.script_pubkey(),
            });
        }

        Ok(outputs)
    }

    fn create_unsigned_transaction(&self, inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs,
            output: outputs,
        }
    }

    fn sign_p2wpkh_transaction(
        &self,
        tx: &mut Transaction,
        public_key: &PublicKey,
        private_key: &PrivateKey,
        input_values: &[u64],
    ) -> Result<()> {
        let mut sighash_cache = SighashCache::new(tx);

        for (i, &input_value) in input_values.iter().enumerate() {
            let script_pubkey = ScriptBuf::new_p2wpkh(&public_key.wpubkey_hash()?);
            let sighash_type = EcdsaSighashType::All;
            let sighash = sighash_cache.p2wpkh_signature_hash(
                i,
                &script_pubkey,
                Amount::from_sat(input_value),
                sighash_type,
            )?;

            let msg = Message::from(sighash);
            let signature = self.secp.sign_ecdsa(&msg, &private_key.inner);

            let btc_signature = bitcoin::ecdsa::Signature { signature, sighash_type };
            let pubkey_bytes = public_key.to_bytes();
            *sighash_cache.witness_mut(i).unwrap() =
                Witness::p2wpkh(&btc_signature, &bitcoin::secp256k1::PublicKey::from_slice(&pubkey_bytes)?);
        }

        Ok(())
    }

    async fn get_htlc_utxo(&self, htlc_addr: &Address) -> Result<UTXO> {
        let utxos = self.indexer.get_utxos(&htlc_addr.to_string()).await?;
        utxos.into_iter().next().ok_or_else(|| anyhow!("HTLC address is not funded"))
    }

    fn parse_and_validate_address(&self, address: &str) -> Result<Address> {
        Address::from_str(address)
            .map_err(|e| anyhow!("invalid address format: {:?}", e))?
            .require_network(self.network)
            .map_err(|e| anyhow!("address network mismatch: {:?}", e))
    }

    fn create_unsigned_redeem_tx(&self, utxo: &UTXO, recipient_addr: &Address, output_value: u64) -> Result<Transaction> {
        let txid = Txid::from_str(&utxo.txid)?;

        Ok(Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint { txid, vout: utxo.vout },
                script_sig: ScriptBuf::new(),
                sequence: Sequence(4294967294),
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(output_value),
                script_pubkey: recipient_addr.script_pubkey(),
            }],
        })
    }

    fn create_leaf_hash(&self, script_bytes: &[u8]) -> Result<TapLeafHash> {
        Ok(TapLeafHash::from_script(Script::from_bytes(script_bytes), LeafVersion::TapScript))
    }

    fn create_prevouts_for_signing(&self, htlc_addr: &Address, value: u64) -> Vec<TxOut> {
        vec![TxOut { value: Amount::from_sat(value), script_pubkey: htlc_addr.script_pubkey() }]
    }

    /// Signs the taproot script-path spend and writes the full witness stack
    /// (signature followed by whatever `witness_stack` carries: secret+script+
    /// control-block for a redeem, script+control-block for a refund).
    fn sign_and_set_taproot_witness(
        &self,
        mut tx: Transaction,
        input_index: usize,
        leaf_hash: TapLeafHash,
        private_key: &PrivateKey,
        sighash_type: TapSighashType,
        prevouts: Vec<TxOut>,
        witness_stack: &mut Vec<Vec<u8>>,
    ) -> Result<Transaction> {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &private_key.inner);
        let sighash_cache = SighashCache::new(&tx);

        let tap_sighash = sighash_cache.taproot_script_spend_signature_hash(
            input_index,
            &bitcoin::sighash::Prevouts::All(prevouts.as_slice()),
            leaf_hash,
            sighash_type,
        )?;

        let message = Message::from_digest_slice(tap_sighash.as_ref())?;
        let signature = secp.sign_schnorr_no_aux_rand(&message, &keypair);

        let mut sig_serialized = signature.as_ref().to_vec();
        if sighash_type != TapSighashType::Default {
            sig_serialized.push(sighash_type as u8);
        }
        witness_stack[0] = sig_serialized;

        let mut witness = Witness::new();
        for item in witness_stack.iter() {
            witness.push(item);
        }

        tx.input[input_index].witness = witness;

        Ok(tx)
    }
}
