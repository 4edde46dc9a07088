//! `/supported-assets`, `/quote`, `/health` (§4.6). Amount arithmetic stays
//! in `num_bigint::BigUint` throughout; only the final USD `value` field is
//! computed in floating point, per §4.6's explicit split.

use axum::extract::{Query, State};
use axum::Json;
use core::config::{AssetConfig, ChainConfig};
use core::types::{Amount, AssetDescriptor, AssetKey, Response};
use core::CoreError;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
pub struct SupportedChain {
    pub id: String,
    pub name: String,
    #[serde(rename = "rpcUrl", skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    pub assets: Vec<AssetDescriptor>,
}

pub async fn supported_assets(State(state): State<AppState>) -> Json<Response<Vec<SupportedChain>>> {
    let mut chains: Vec<SupportedChain> = state
        .config
        .chains
        .iter()
        .map(|(id, chain)| {
            let rpc_url = match chain {
                ChainConfig::Evm { rpc_url, .. } => Some(rpc_url.clone()),
                ChainConfig::Bitcoin { .. } => None,
            };
            let assets = chain.assets().iter().map(descriptor_of).collect();
            SupportedChain {
                id: id.clone(),
                name: id.clone(),
                rpc_url,
                assets,
            }
        })
        .collect();
    chains.sort_by(|a, b| a.id.cmp(&b.id));
    Json(Response::ok(chains))
}

fn descriptor_of(asset: &AssetConfig) -> AssetDescriptor {
    AssetDescriptor {
        symbol: asset.symbol.clone(),
        name: asset.name.clone(),
        decimals: asset.decimals,
        cmc_id: asset.cmc_id,
    }
}

#[derive(Deserialize)]
pub struct QuoteParams {
    pub from: String,
    pub to: String,
    pub amount: String,
}

#[derive(Serialize)]
pub struct Leg {
    pub asset: String,
    pub amount: Amount,
    pub display: String,
    pub value: f64,
}

#[derive(Serialize)]
pub struct QuotePair {
    pub source: Leg,
    pub destination: Leg,
}

pub async fn quote(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> Result<Json<Response<Vec<QuotePair>>>, ApiError> {
    let from = AssetKey::parse(&params.from)?;
    let to = AssetKey::parse(&params.to)?;
    let amount = Amount::parse(&params.amount)?;

    let from_asset = state.config.asset(from.chain.as_str(), &from.asset)?.clone();
    let to_asset = state.config.asset(to.chain.as_str(), &to.asset)?.clone();

    let prices = state.prices.get_usd_prices(&[from_asset.cmc_id, to_asset.cmc_id]).await?;
    let price_from = *prices
        .get(&from_asset.cmc_id)
        .ok_or_else(|| CoreError::Unsupported(format!("no price for cmcId {}", from_asset.cmc_id)))?;
    let price_to = *prices
        .get(&to_asset.cmc_id)
        .ok_or_else(|| CoreError::Unsupported(format!("no price for cmcId {}", to_asset.cmc_id)))?;

    let destination_amount = scale_amount(&amount, from_asset.decimals, to_asset.decimals, price_from, price_to);

    let source = Leg {
        asset: from.to_string(),
        display: format_amount(&amount, from_asset.decimals),
        value: usd_value(&amount, from_asset.decimals, price_from),
        amount,
    };
    let destination = Leg {
        asset: to.to_string(),
        display: format_amount(&destination_amount, to_asset.decimals),
        value: usd_value(&destination_amount, to_asset.decimals, price_to),
        amount: destination_amount,
    };

    Ok(Json(Response::ok(vec![QuotePair { source, destination }])))
}

/// Converts a base-units amount of `from` into base-units of `to` at the spot
/// rate `price_from / price_to`, scaled by each asset's decimals. The price
/// ratio is the only floating-point quantity involved; it is converted to a
/// fixed-point integer numerator before any amount arithmetic runs, so the
/// amount itself is never represented as a float.
fn scale_amount(amount: &Amount, from_decimals: u8, to_decimals: u8, price_from: f64, price_to: f64) -> Amount {
    const PRECISION: u32 = 18;
    let rate = price_from / price_to;
    let rate_scaled = (rate * 10f64.powi(PRECISION as i32)).round().max(0.0) as u128;

    let mut numerator = amount.0.clone() * BigUint::from(rate_scaled);
    let mut denominator = BigUint::from(10u64).pow(PRECISION);

    if to_decimals >= from_decimals {
        numerator *= BigUint::from(10u64).pow((to_decimals - from_decimals) as u32);
    } else {
        denominator *= BigUint::from(10u64).pow((from_decimals - to_decimals) as u32);
    }

    Amount(numerator / denominator)
}

fn usd_value(amount: &Amount, decimals: u8, price: f64) -> f64 {
    let divisor = 10f64.powi(decimals as i32);
    let raw = amount.0.to_f64().unwrap_or(0.0);
    (raw / divisor) * price
}

fn format_amount(amount: &Amount, decimals: u8) -> String {
    if decimals == 0 {
        return amount.0.to_string();
    }
    let divisor = BigUint::from(10u64).pow(decimals as u32);
    let whole = amount.0.clone() / divisor.clone();
    let frac = amount.0.clone() % divisor;

    let mut frac_str = frac.to_string();
    while frac_str.len() < decimals as usize {
        frac_str = format!("0{frac_str}");
    }
    let trimmed = frac_str.trim_end_matches('0');
    if trimmed.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_amount_by_price_ratio_and_decimals() {
        let amount = Amount::from_u64(1_000_000);
        let scaled = scale_amount(&amount, 6, 6, 2.0, 1.0);
        assert_eq!(scaled, Amount::from_u64(2_000_000));
    }

    #[test]
    fn format_amount_trims_trailing_zeroes() {
        let amount = Amount::from_u64(1_500_000);
        assert_eq!(format_amount(&amount, 6), "1.5");
    }

    #[test]
    fn format_amount_handles_whole_numbers() {
        let amount = Amount::from_u64(2_000_000);
        assert_eq!(format_amount(&amount, 6), "2");
    }
}
