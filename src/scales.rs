//! Symbol scale discovery
//!
//! Derives the per-symbol fixed-point scales from the exchangeInfo endpoint:
//! price scale from `PRICE_FILTER.tickSize`, quantity scale from
//! `LOT_SIZE.stepSize`, upgraded by the integer precision fields when those
//! imply a larger scale.

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::info;

use crate::error::{DepthSyncError, Result};
use crate::fixed::SymbolScales;

/// Floor for the price scale, so later precision upgrades never round
/// already-stored prices.
const MIN_PRICE_SCALE: u64 = 100_000_000;

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(rename = "pricePrecision")]
    price_precision: Option<i64>,
    #[serde(rename = "quantityPrecision")]
    quantity_precision: Option<i64>,
    #[serde(default)]
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
struct SymbolFilter {
    #[serde(rename = "filterType")]
    filter_type: String,
    #[serde(rename = "tickSize")]
    tick_size: Option<String>,
    #[serde(rename = "stepSize")]
    step_size: Option<String>,
}

/// Fetch the fixed-point scales for `symbol`. Fatal at startup: without
/// scales no payload can be decoded.
pub async fn fetch_symbol_scales(
    client: &reqwest::Client,
    rest_endpoint: &str,
    symbol: &str,
) -> Result<SymbolScales> {
    let symbol = symbol.to_uppercase();
    let url = format!("{}/fapi/v1/exchangeInfo?symbol={}", rest_endpoint, symbol);

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| DepthSyncError::ScaleDiscovery(format!("exchangeInfo request: {e}")))?;

    if response.status() != StatusCode::OK {
        return Err(DepthSyncError::ScaleDiscovery(format!(
            "exchangeInfo HTTP {}",
            response.status()
        )));
    }

    let info: ExchangeInfo = response
        .json()
        .await
        .map_err(|e| DepthSyncError::ScaleDiscovery(format!("exchangeInfo body: {e}")))?;

    let scales = scales_for(&info, &symbol)?;
    info!(
        symbol = %symbol,
        price_scale = scales.price_scale,
        qty_scale = scales.qty_scale,
        "symbol scales discovered"
    );
    Ok(scales)
}

fn scales_for(info: &ExchangeInfo, symbol: &str) -> Result<SymbolScales> {
    let entry = info
        .symbols
        .iter()
        .find(|s| s.symbol == symbol)
        .ok_or_else(|| {
            DepthSyncError::ScaleDiscovery(format!("symbol not in exchangeInfo: {symbol}"))
        })?;

    let mut tick_size = None;
    let mut step_size = None;
    for filter in &entry.filters {
        match filter.filter_type.as_str() {
            "PRICE_FILTER" => tick_size = filter.tick_size.as_deref(),
            "LOT_SIZE" => step_size = filter.step_size.as_deref(),
            _ => {}
        }
    }

    let tick_size = tick_size.ok_or_else(|| {
        DepthSyncError::ScaleDiscovery("missing PRICE_FILTER.tickSize".to_string())
    })?;
    let step_size = step_size
        .ok_or_else(|| DepthSyncError::ScaleDiscovery("missing LOT_SIZE.stepSize".to_string()))?;

    let mut price_scale = scale_from_step(tick_size);
    let mut qty_scale = scale_from_step(step_size);

    if let Some(scale) = entry.price_precision.and_then(scale_from_precision) {
        price_scale = price_scale.max(scale);
    }
    if let Some(scale) = entry.quantity_precision.and_then(scale_from_precision) {
        qty_scale = qty_scale.max(scale);
    }

    price_scale = price_scale.max(MIN_PRICE_SCALE);
    Ok(SymbolScales::new(price_scale, qty_scale))
}

/// Scale implied by a tick or step value.
///
/// The full fractional width is preserved: trimming trailing zeros can
/// under-estimate precision for some symbols.
fn scale_from_step(step: &str) -> u64 {
    match step.split_once('.') {
        Some((_, frac)) => {
            let places = u32::try_from(frac.len().min(18)).unwrap_or(18);
            10u64.pow(places)
        }
        None => 1,
    }
}

fn scale_from_precision(precision: i64) -> Option<u64> {
    if precision <= 0 {
        return Some(1);
    }
    10u64.checked_pow(u32::try_from(precision).ok()?)
}
