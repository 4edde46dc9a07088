use std::sync::Arc;

use core::config::AppConfig;

use crate::pricing::PriceCache;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub prices: Arc<PriceCache>,
}
