//! Quote-service-specific configuration: the shared `core::config::AppConfig`
//! chain/asset tables plus `core::config::QuoteConfig`'s CMC key and port.

use std::time::Duration;

use core::config::AppConfig;
use core::CoreError;

pub struct Settings {
    pub app: AppConfig,
    pub cmc_api_key: String,
    pub port: u16,
    pub price_ttl: Duration,
}

impl Settings {
    pub fn load() -> Result<Self, CoreError> {
        let app = AppConfig::load("Config.toml")?;
        let quote = core::config::QuoteConfig::from_env()?;

        Ok(Settings {
            app,
            cmc_api_key: quote.cmc_api_key,
            port: quote.port,
            price_ttl: Duration::from_secs(300),
        })
    }
}
