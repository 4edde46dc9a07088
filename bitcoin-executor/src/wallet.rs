//! Thin wrapper over `bitcoin_chain::htlc_handler::HtlcHandler` that derives
//! the operator's own keypair/address once and exposes the three actions
//! the decision procedure needs: initiate, redeem, refund.

use std::str::FromStr;

use anyhow::Result;
use bitcoin::{key::Secp256k1, Address, CompressedPublicKey, Network, PrivateKey, PublicKey};
use bitcoin_chain::htlc_handler::HtlcHandler;
use core::bitcoin_htlc::BitcoinHtlcParams;

pub struct ExecutorWallet {
    private_key: PrivateKey,
    address: Address,
    handler: HtlcHandler,
}

impl ExecutorWallet {
    pub fn new(private_key_hex: &str, network: Network, indexer_url: &str) -> Result<Self> {
        let secp = Secp256k1::new();
        let bytes = hex::decode(private_key_hex)?;
        let private_key = PrivateKey::from_slice(&bytes, network)?;
        let public_key = PublicKey::from_private_key(&secp, &private_key);
        let compressed = CompressedPublicKey::try_from(public_key)?;
        let address = Address::p2wpkh(&compressed, network);
        let handler = HtlcHandler::new(network, indexer_url)?;

        Ok(Self { private_key, address, handler })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub async fn initiate(&self, _params: &BitcoinHtlcParams, htlc_addr: &Address, amount: u64) -> Result<String> {
        let tx = self.handler.initiate_htlc(&self.private_key, htlc_addr, amount).await?;
        self.handler.broadcast_tx(&tx).await
    }

    pub async fn redeem(&self, params: &BitcoinHtlcParams, htlc_addr: &Address, secret: &[u8; 32]) -> Result<String> {
        let tx = self
            .handler
            .create_redeem_tx(params, htlc_addr, Some(secret), None, &self.private_key, 20)
            .await?;
        self.handler.broadcast_tx(&tx).await
    }

    pub async fn refund(&self, params: &BitcoinHtlcParams, htlc_addr: &Address, refund_to: Option<String>) -> Result<String> {
        let tx = self
            .handler
            .create_redeem_tx(params, htlc_addr, None, refund_to, &self.private_key, 20)
            .await?;
        self.handler.broadcast_tx(&tx).await
    }
}

pub fn parse_recipient(address: &str, network: Network) -> Result<Address> {
    Ok(Address::from_str(address)?.require_network(network)?)
}
