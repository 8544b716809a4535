//! Fixed-point codec for exchange decimal strings.
//!
//! Prices and quantities are carried as `u64` scaled integers: the real value
//! is `raw / scale`, where `scale` is a power of ten fixed per symbol. All
//! comparisons and book mutations stay in integer space.

use serde_json::Value;

/// Per-symbol price and quantity scales.
///
/// Both are powers of ten >= 1 and stay fixed for the lifetime of a
/// synchronizer. Scale discovery floors the price scale so that precision
/// upgrades never round stored prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolScales {
    pub price_scale: u64,
    pub qty_scale: u64,
}

impl SymbolScales {
    pub fn new(price_scale: u64, qty_scale: u64) -> Self {
        Self {
            price_scale,
            qty_scale,
        }
    }
}

impl Default for SymbolScales {
    fn default() -> Self {
        Self {
            price_scale: 1,
            qty_scale: 1,
        }
    }
}

/// Returns the decimal exponent of `scale` if it is a positive power of ten.
pub fn places_of(scale: u64) -> Option<u32> {
    if scale == 0 {
        return None;
    }
    let mut scale = scale;
    let mut places = 0u32;
    while scale > 1 {
        if scale % 10 != 0 {
            return None;
        }
        scale /= 10;
        places += 1;
    }
    Some(places)
}

fn parse_uint(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parses a decimal string into scaled integer units.
///
/// The fractional part is truncated when the payload carries finer precision
/// than `scale` supports, and right-padded with zeros otherwise. Returns
/// `None` on malformed input, a non-power-of-ten scale, or `u64` overflow.
pub fn parse_scaled(text: &str, scale: u64) -> Option<u64> {
    let places = places_of(scale)? as usize;

    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };

    let int_value = parse_uint(int_part)?;

    // Tolerate payloads with finer precision than the configured scale:
    // keep the supported digits and drop the excess.
    let frac_part = if frac_part.len() > places {
        &frac_part[..places]
    } else {
        frac_part
    };

    let mut frac_value = if frac_part.is_empty() {
        0
    } else {
        parse_uint(frac_part)?
    };

    for _ in frac_part.len()..places {
        frac_value = frac_value.checked_mul(10)?;
    }

    int_value.checked_mul(scale)?.checked_add(frac_value)
}

/// Reads a `u64` from a JSON value that may be an unsigned integer, a
/// non-negative signed integer, or a decimal-digit string.
pub fn parse_json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_uint(s),
        _ => None,
    }
}

/// Formats a scaled integer back to the exchange's decimal form.
///
/// Trailing fractional zeros are trimmed but a fractional marker is always
/// kept (`"30000.0"`, never `"30000"`), except when `scale == 1` where the
/// value is a plain integer.
pub fn format_scaled(value: u64, scale: u64) -> String {
    let places = match places_of(scale) {
        Some(p) if p > 0 => p as usize,
        _ => return value.to_string(),
    };

    let whole = value / scale;
    let frac = value % scale;

    let mut frac_str = format!("{frac:0places$}");
    while frac_str.ends_with('0') {
        frac_str.pop();
    }
    if frac_str.is_empty() {
        return format!("{whole}.0");
    }

    format!("{whole}.{frac_str}")
}
