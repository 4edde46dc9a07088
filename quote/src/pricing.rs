//! Batched CoinMarketCap USD price lookups with a 5-minute TTL cache
//! (§4.6 "Cache prices for 5 minutes; on upstream failure, return the last
//! cached value").
//!
//! Two layers back this: a `moka::future::Cache` holds the fast, TTL-bound
//! "fresh" value, and a side `RwLock<HashMap<u64, CachedPrice>>` holds the
//! last value ever fetched regardless of TTL — moka evicts past its TTL
//! rather than serving stale entries, so the fallback path needs its own
//! store. `core::clock::Clock` timestamps entries in the side map so the
//! staleness bookkeeping is deterministically testable. The upstream HTTP
//! call sits behind `PriceSource` so tests can exercise the cache/fallback
//! logic without reaching the real CMC API.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use core::clock::Clock;
use core::CoreError;
use moka::future::Cache;
use serde::Deserialize;
use tracing::warn;

#[derive(Clone, Copy)]
struct CachedPrice {
    usd: f64,
    #[allow(dead_code)]
    fetched_at: Duration,
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, ids: &[u64]) -> anyhow::Result<HashMap<u64, f64>>;
}

#[derive(Deserialize)]
struct CmcResponse {
    data: HashMap<String, CmcEntry>,
}

#[derive(Deserialize)]
struct CmcEntry {
    quote: CmcQuote,
}

#[derive(Deserialize)]
struct CmcQuote {
    #[serde(rename = "USD")]
    usd: CmcUsd,
}

#[derive(Deserialize)]
struct CmcUsd {
    price: f64,
}

pub struct CmcPriceSource {
    client: reqwest::Client,
    api_key: String,
}

impl CmcPriceSource {
    pub fn new(api_key: String) -> Self {
        CmcPriceSource {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl PriceSource for CmcPriceSource {
    async fn fetch(&self, ids: &[u64]) -> anyhow::Result<HashMap<u64, f64>> {
        let id_param = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");

        let response = self
            .client
            .get("https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest")
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .query(&[("id", id_param.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<CmcResponse>()
            .await?;

        let mut out = HashMap::new();
        for (id_str, entry) in response.data {
            let id: u64 = id_str.parse()?;
            out.insert(id, entry.quote.usd.price);
        }
        Ok(out)
    }
}

pub struct PriceCache {
    fresh: Cache<u64, f64>,
    stale: RwLock<HashMap<u64, CachedPrice>>,
    source: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
}

impl PriceCache {
    pub fn new(source: Arc<dyn PriceSource>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        PriceCache {
            fresh: Cache::builder().time_to_live(ttl).build(),
            stale: RwLock::new(HashMap::new()),
            source,
            clock,
        }
    }

    /// Resolves USD prices for every id in `ids`, fetching only the ids
    /// missing from the fresh cache in a single batched upstream call.
    pub async fn get_usd_prices(&self, ids: &[u64]) -> Result<HashMap<u64, f64>, CoreError> {
        let mut result = HashMap::new();
        let mut missing = Vec::new();

        for &id in ids {
            match self.fresh.get(&id).await {
                Some(price) => {
                    result.insert(id, price);
                }
                None => missing.push(id),
            }
        }

        if missing.is_empty() {
            return Ok(result);
        }

        match self.source.fetch(&missing).await {
            Ok(fetched) => {
                let mut stale = self.stale.write().unwrap();
                for (&id, &price) in &fetched {
                    self.fresh.insert(id, price).await;
                    stale.insert(
                        id,
                        CachedPrice {
                            usd: price,
                            fetched_at: self.clock.now(),
                        },
                    );
                }
                drop(stale);
                result.extend(fetched);
                Ok(result)
            }
            Err(e) => {
                let stale = self.stale.read().unwrap();
                let mut unresolved = Vec::new();
                for &id in &missing {
                    match stale.get(&id) {
                        Some(cached) => {
                            result.insert(id, cached.usd);
                        }
                        None => unresolved.push(id),
                    }
                }
                if unresolved.is_empty() {
                    warn!(error = %e, "upstream price lookup failed, serving last cached prices");
                    Ok(result)
                } else {
                    Err(CoreError::RpcTransient(format!(
                        "price lookup failed for {unresolved:?} and no cached value exists: {e}"
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    #[async_trait]
    impl PriceSource for FailingSource {
        async fn fetch(&self, _ids: &[u64]) -> anyhow::Result<HashMap<u64, f64>> {
            Err(anyhow::anyhow!("upstream unreachable"))
        }
    }

    struct OkSource(f64);

    #[async_trait]
    impl PriceSource for OkSource {
        async fn fetch(&self, ids: &[u64]) -> anyhow::Result<HashMap<u64, f64>> {
            Ok(ids.iter().map(|&id| (id, self.0)).collect())
        }
    }

    #[tokio::test]
    async fn serves_stale_price_when_upstream_fails_after_a_successful_fetch() {
        let clock = Arc::new(core::clock::FakeClock::new(Duration::from_secs(0)));
        let cache = PriceCache::new(Arc::new(OkSource(63_000.0)), Duration::from_millis(1), clock.clone());

        let first = cache.get_usd_prices(&[1]).await.unwrap();
        assert_eq!(first.get(&1), Some(&63_000.0));

        // Swap in a failing source behind a fresh cache instance sharing the
        // same stale store would require exposing it; instead verify the
        // fallback logic directly by seeding a cache backed by a source that
        // always fails but already has a stale entry recorded.
        let failing_cache = PriceCache::new(Arc::new(FailingSource), Duration::from_millis(1), clock.clone());
        failing_cache.stale.write().unwrap().insert(
            1,
            CachedPrice {
                usd: 63_000.0,
                fetched_at: clock.now(),
            },
        );
        let second = failing_cache.get_usd_prices(&[1]).await;
        assert_eq!(second.unwrap().get(&1), Some(&63_000.0));
    }

    #[tokio::test]
    async fn errors_when_upstream_fails_and_no_cached_value_exists() {
        let clock = Arc::new(core::clock::FakeClock::new(Duration::from_secs(0)));
        let cache = PriceCache::new(Arc::new(FailingSource), Duration::from_secs(300), clock);

        let result = cache.get_usd_prices(&[999]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn fresh_cache_hit_avoids_a_second_upstream_call() {
        let clock = Arc::new(core::clock::FakeClock::new(Duration::from_secs(0)));
        let cache = PriceCache::new(Arc::new(OkSource(1.5)), Duration::from_secs(300), clock);

        let first = cache.get_usd_prices(&[7]).await.unwrap();
        assert_eq!(first.get(&7), Some(&1.5));

        // Even if the source were to change its answer, the fresh cache
        // should still serve the first value within the TTL window.
        let second = cache.get_usd_prices(&[7]).await.unwrap();
        assert_eq!(second.get(&7), Some(&1.5));
    }
}
