//! Parser module for Binance depth payloads
//!
//! Decodes REST snapshots and WebSocket depth deltas into scaled integer
//! levels. Any missing field, wrong JSON type, malformed decimal, or overflow
//! yields `None`; no partial books are ever emitted.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::fixed::{self, SymbolScales};
use crate::orderbook::Level;

/// Order book snapshot from the REST depth endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookSnapshot {
    pub last_update_id: u64,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

/// Incremental depth update from the WebSocket stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookDelta {
    pub first_update: u64,
    pub last_update: u64,
    /// The sender's claimed last update id of the previous delta (`pu`),
    /// present on futures streams.
    pub previous_last_update: Option<u64>,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

/// Sequence metadata of a delta payload, extracted without decoding level
/// lists. Lets the synchronizer buffer and order deltas before applying them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaMeta {
    pub first_update: u64,
    pub last_update: u64,
    pub previous_last_update: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(rename = "lastUpdateId", deserialize_with = "de_u64_flexible")]
    last_update_id: u64,
    bids: Vec<Vec<String>>,
    asks: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawDelta {
    #[serde(
        rename = "U",
        alias = "firstUpdateId",
        deserialize_with = "de_u64_flexible"
    )]
    first_update: u64,
    #[serde(
        rename = "u",
        alias = "finalUpdateId",
        deserialize_with = "de_u64_flexible"
    )]
    last_update: u64,
    #[serde(rename = "pu", default, deserialize_with = "de_u64_lenient")]
    previous_last_update: Option<u64>,
    #[serde(rename = "b", alias = "bids")]
    bids: Vec<Vec<String>>,
    #[serde(rename = "a", alias = "asks")]
    asks: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawDeltaMeta {
    #[serde(rename = "U", deserialize_with = "de_u64_flexible")]
    first_update: u64,
    #[serde(rename = "u", deserialize_with = "de_u64_flexible")]
    last_update: u64,
    #[serde(rename = "pu", default, deserialize_with = "de_u64_lenient")]
    previous_last_update: Option<u64>,
}

/// Custom deserializer for update ids that arrive as integers or digit strings.
fn de_u64_flexible<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    fixed::parse_json_u64(&value)
        .ok_or_else(|| serde::de::Error::custom("expected unsigned integer"))
}

/// Like [`de_u64_flexible`] but an unparseable value reads as absent rather
/// than failing the whole payload.
fn de_u64_lenient<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(fixed::parse_json_u64(&value))
}

fn convert_side(rows: &[Vec<String>], price_scale: u64, qty_scale: u64) -> Option<Vec<Level>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        // Rows are [price, qty]; extra elements are tolerated.
        if row.len() < 2 {
            return None;
        }
        let price = fixed::parse_scaled(&row[0], price_scale)?;
        let qty = fixed::parse_scaled(&row[1], qty_scale)?;
        out.push(Level::new(price, qty));
    }
    Some(out)
}

/// Decode a REST depth snapshot.
pub fn decode_snapshot(raw: &str, scales: &SymbolScales) -> Option<OrderBookSnapshot> {
    fixed::places_of(scales.price_scale)?;
    fixed::places_of(scales.qty_scale)?;

    let parsed: RawSnapshot = serde_json::from_str(raw).ok()?;
    Some(OrderBookSnapshot {
        last_update_id: parsed.last_update_id,
        bids: convert_side(&parsed.bids, scales.price_scale, scales.qty_scale)?,
        asks: convert_side(&parsed.asks, scales.price_scale, scales.qty_scale)?,
    })
}

/// Decode a WebSocket depth delta. Snapshot-style field names are accepted as
/// aliases for the stream's short keys.
pub fn decode_delta(raw: &str, scales: &SymbolScales) -> Option<OrderBookDelta> {
    fixed::places_of(scales.price_scale)?;
    fixed::places_of(scales.qty_scale)?;

    let parsed: RawDelta = serde_json::from_str(raw).ok()?;
    if parsed.first_update == 0
        || parsed.last_update == 0
        || parsed.first_update > parsed.last_update
    {
        return None;
    }
    Some(OrderBookDelta {
        first_update: parsed.first_update,
        last_update: parsed.last_update,
        previous_last_update: parsed.previous_last_update,
        bids: convert_side(&parsed.bids, scales.price_scale, scales.qty_scale)?,
        asks: convert_side(&parsed.asks, scales.price_scale, scales.qty_scale)?,
    })
}

/// Extract only the sequence metadata of a delta payload.
pub fn decode_delta_meta(raw: &str) -> Option<DeltaMeta> {
    let parsed: RawDeltaMeta = serde_json::from_str(raw).ok()?;
    if parsed.first_update == 0
        || parsed.last_update == 0
        || parsed.first_update > parsed.last_update
    {
        return None;
    }
    Some(DeltaMeta {
        first_update: parsed.first_update,
        last_update: parsed.last_update,
        previous_last_update: parsed.previous_last_update,
    })
}
