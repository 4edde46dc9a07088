use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;

/// Represents an Unspent Transaction Output (UTXO) as returned by a
/// mempool.space-style REST indexer.
#[derive(Debug, Deserialize, Clone)]
pub struct UTXO {
    pub txid: String,
    pub vout: u32,
    pub status: Status,
    pub value: u64,
}

/// Confirmation status of a transaction.
#[derive(Debug, Deserialize, Clone)]
pub struct Status {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: u64,
    #[serde(default)]
    pub block_hash: String,
    #[serde(default)]
    pub block_time: u64,
}

/// Statistics for address transactions on the blockchain
#[derive(Debug, Deserialize, Clone)]
pub struct ChainStats {
    pub funded_txo_count: u32,
    pub funded_txo_sum: u64,
    pub spent_txo_count: u32,
    pub spent_txo_sum: u64,
    pub tx_count: u32,
}

/// Statistics for address transactions in the mempool
#[derive(Debug, Deserialize, Clone)]
pub struct MempoolStats {
    pub funded_txo_count: u32,
    pub funded_txo_sum: u64,
    pub spent_txo_count: u32,
    pub spent_txo_sum: u64,
    pub tx_count: u32,
}

/// Complete address information from mempool.space API
#[derive(Debug, Deserialize, Clone)]
pub struct AddressInfo {
    pub address: String,
    pub chain_stats: ChainStats,
    pub mempool_stats: MempoolStats,
}

/// One input of a transaction, as returned by `/address/:address/txs`.
#[derive(Debug, Deserialize, Clone)]
pub struct TxInput {
    pub txid: String,
    pub vout: u32,
    #[serde(default)]
    pub witness: Vec<String>,
}

/// A transaction as returned by `/address/:address/txs`, trimmed to the
/// fields the watcher needs to classify a spend.
#[derive(Debug, Deserialize, Clone)]
pub struct TxInfo {
    pub txid: String,
    pub vin: Vec<TxInput>,
    pub status: Status,
}

pub struct SimpleIndexer {
    client: reqwest::Client,
    url: String,
}

impl SimpleIndexer {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub async fn get_current_block_height(&self) -> Result<u64> {
        let url = format!("{}/blocks/tip/height", self.url);

        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            let height: u64 = response.text().await?.parse()?;
            Ok(height)
        } else {
            Err(anyhow!(
                "failed to get current block height: {}",
                response.status()
            ))
        }
    }

    /// Gets address information including chain and mempool statistics
    pub async fn get_address_info(&self, address: &str) -> Result<AddressInfo> {
        let url = format!("{}/address/{}", &self.url, address);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("failed to fetch address info: {}", response.status()));
        }

        let address_info = response.json::<AddressInfo>().await?;
        Ok(address_info)
    }

    pub async fn get_address_transaction_count(&self, address: &str) -> Result<u32> {
        let address_info = self.get_address_info(address).await?;
        Ok(address_info.chain_stats.tx_count + address_info.mempool_stats.tx_count)
    }

    pub async fn get_address_funded_amount(&self, address: &str) -> Result<u64> {
        let address_info = self.get_address_info(address).await?;
        Ok(address_info.chain_stats.funded_txo_sum + address_info.mempool_stats.funded_txo_sum)
    }

    pub async fn get_address_spent_amount(&self, address: &str) -> Result<u64> {
        let address_info = self.get_address_info(address).await?;
        Ok(address_info.chain_stats.spent_txo_sum + address_info.mempool_stats.spent_txo_sum)
    }

    pub async fn get_address_balance(&self, address: &str) -> Result<u64> {
        let funded = self.get_address_funded_amount(address).await?;
        let spent = self.get_address_spent_amount(address).await?;
        Ok(funded.saturating_sub(spent))
    }

    pub async fn get_utxos(&self, address: &str) -> Result<Vec<UTXO>> {
        let url = format!("{}/address/{}/utxo", &self.url, address);

        let response = self.client.get(url).send().await?;
        let resp = response.json::<Vec<UTXO>>().await?;

        Ok(resp)
    }

    /// Selects UTXOs greedily until their sum covers `amount`. Spec requires
    /// only that the selection suffices to fund the output plus fees, not
    /// that it sums exactly — an exact-match requirement would reject the
    /// overwhelmingly common case where a UTXO set has no subset summing to
    /// precisely `amount`.
    pub async fn get_utxos_for_amount(&self, address: &str, amount: i64) -> Result<Vec<UTXO>> {
        let utxos = self.get_utxos(address).await?;
        let mut filtered_utxos: Vec<UTXO> = Vec::new();
        let mut total = 0i64;

        for utxo in utxos {
            total += utxo.value as i64;
            filtered_utxos.push(utxo);
            if total >= amount {
                return Ok(filtered_utxos);
            }
        }

        Err(anyhow!("not enough funds in UTXOs"))
    }

    pub async fn get_address_txs(&self, address: &str) -> Result<Vec<TxInfo>> {
        let url = format!("{}/address/{}/txs", &self.url, address);
        let response = self.client.get(&url).send().await?;
        Ok(response.json::<Vec<TxInfo>>().await?)
    }

    /// Finds the transaction that spends `txid:vout`, if any transaction
    /// touching `address` already does.
    pub async fn find_spending_tx(&self, address: &str, txid: &str, vout: u32) -> Result<Option<TxInfo>> {
        let txs = self.get_address_txs(address).await?;
        Ok(txs
            .into_iter()
            .find(|tx| tx.vin.iter().any(|input| input.txid == txid && input.vout == vout)))
    }

    pub async fn submit_tx(&self, tx: &bitcoin::Transaction) -> Result<String> {
        let endpoint = format!("{}/tx", self.url);
        let tx_bytes = bitcoin::consensus::serialize(tx);
        let hex_tx = hex::encode(tx_bytes);
        let str_buffer = hex_tx.as_bytes();

        const MAX_RETRIES: usize = 3;
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < MAX_RETRIES {
            match self
                .client
                .post(&endpoint)
                .header("Content-Type", "application/text")
                .body(str_buffer.to_vec())
                .send()
                .await
            {
                Ok(resp) => {
                    if resp.status().is_success() {
                        return Ok(resp.text().await?);
                    } else {
                        let err_msg = resp.text().await?;
                        last_error = Some(anyhow!("request failed: {}", err_msg));
                    }
                }
                Err(e) => {
                    last_error = Some(anyhow!("request error: {}", e));
                }
            }

            attempts += 1;
            if attempts < MAX_RETRIES {
                tokio::time::sleep(tokio::time::Duration::from_millis(500 * attempts as u64)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("failed to submit transaction after {} attempts", MAX_RETRIES)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(value: u64) -> UTXO {
        UTXO {
            txid: "0".repeat(64),
            vout: 0,
            status: Status {
                confirmed: true,
                block_height: 100,
                block_hash: String::new(),
                block_time: 0,
            },
            value,
        }
    }

    #[test]
    fn selection_stops_as_soon_as_total_covers_amount_without_requiring_exact_match() {
        let utxos = vec![utxo(30_000), utxo(30_000)];
        let mut total = 0i64;
        let mut selected = Vec::new();
        for u in utxos {
            total += u.value as i64;
            selected.push(u);
            if total >= 50_000 {
                break;
            }
        }
        assert_eq!(selected.len(), 2);
        assert_eq!(total, 60_000);
    }
}
