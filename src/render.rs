//! Terminal renderer
//!
//! Full-screen ANSI view of the synchronized book: a bid/ask table of the top
//! levels, a spread summary, and the sync health counters.

use std::io::{self, Write};

use crate::fixed::{self, SymbolScales};
use crate::orderbook::{Level, OrderBook};
use crate::sync::SyncStats;

pub struct Renderer {
    symbol: String,
    levels: usize,
}

impl Renderer {
    pub fn new(symbol: &str, levels: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            levels,
        }
    }

    /// Repaint the terminal with the current book state.
    pub fn render(&self, book: &OrderBook, scales: &SymbolScales, stats: &SyncStats) {
        let frame = self.build_frame(book, scales, stats);
        let mut out = io::stdout().lock();
        let _ = out.write_all(frame.as_bytes());
        let _ = out.flush();
    }

    fn build_frame(&self, book: &OrderBook, scales: &SymbolScales, stats: &SyncStats) -> String {
        let bids = book.top_bids(self.levels);
        let asks = book.top_asks(self.levels);

        let mut frame = String::new();
        frame.push_str("\x1b[2J\x1b[H");
        frame.push_str(&format!("LIVE ORDERBOOK  {}\n", self.symbol));
        frame.push_str(&format!(
            "{}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        frame.push_str(&format!("Depth: {}\n\n", self.levels));

        frame.push_str(&format!(
            "{:>15}│{:>12}│{:>12}│{:>15}\n",
            "BID QTY", "BID PRICE", "ASK PRICE", "ASK QTY"
        ));
        frame.push_str(&format!(
            "{}┼{}┼{}┼{}\n",
            "─".repeat(15),
            "─".repeat(12),
            "─".repeat(12),
            "─".repeat(15)
        ));

        let rows = bids.len().max(asks.len());
        for i in 0..rows {
            frame.push_str(&book_row(bids.get(i), asks.get(i), scales));
            frame.push('\n');
        }

        if let (Some(bid), Some(ask)) = (bids.first(), asks.first()) {
            frame.push('\n');
            frame.push_str(&summary(*bid, *ask, scales.price_scale));
        }

        frame.push('\n');
        frame.push_str(&stats_line(book, stats));
        frame.push('\n');
        frame
    }
}

fn book_row(bid: Option<&Level>, ask: Option<&Level>, scales: &SymbolScales) -> String {
    let (bid_qty, bid_px) = match bid {
        Some(level) => (
            fixed::format_scaled(level.qty, scales.qty_scale),
            fixed::format_scaled(level.price, scales.price_scale),
        ),
        None => ("-".to_string(), "-".to_string()),
    };
    let (ask_px, ask_qty) = match ask {
        Some(level) => (
            fixed::format_scaled(level.price, scales.price_scale),
            fixed::format_scaled(level.qty, scales.qty_scale),
        ),
        None => ("-".to_string(), "-".to_string()),
    };
    format!("{bid_qty:>15}│{bid_px:>12}│{ask_px:>12}│{ask_qty:>15}")
}

fn summary(bid: Level, ask: Level, price_scale: u64) -> String {
    let spread_ticks = ask.price.saturating_sub(bid.price);
    let mid = (bid.price as f64 + ask.price as f64) / 2.0 / price_scale as f64;
    let spread = spread_ticks as f64 / price_scale as f64;
    let spread_bps = if mid == 0.0 { 0.0 } else { spread / mid * 10_000.0 };

    format!(
        "Best Bid : ${}\nBest Ask : ${}\nSpread   : ${} ({spread_bps:.1} bps)\nMid Price: ${}\n",
        fixed::format_scaled(bid.price, price_scale),
        fixed::format_scaled(ask.price, price_scale),
        fixed::format_scaled(spread_ticks, price_scale),
        format_mid(bid.price, ask.price, price_scale),
    )
}

/// Mid price in display form. A half-tick mid gets one extra decimal place
/// beyond the price scale.
fn format_mid(bid: u64, ask: u64, price_scale: u64) -> String {
    let sum = bid as u128 + ask as u128;
    if sum % 2 == 0 {
        return fixed::format_scaled((sum / 2) as u64, price_scale);
    }

    let places = fixed::places_of(price_scale).unwrap_or(0) as usize + 1;
    let mid = (sum as f64) / 2.0 / price_scale as f64;
    format!("{mid:.places$}")
}

fn stats_line(book: &OrderBook, stats: &SyncStats) -> String {
    format!(
        "LastUpdateId={}  Levels={}  WS={}  Accepted={}  Dropped={}  Resyncs={}  SnapshotRetries={}",
        book.last_update_id(),
        book.depth(),
        stats.ws_messages,
        stats.accepted_deltas,
        stats.dropped_deltas,
        stats.resyncs,
        stats.snapshot_retries,
    )
}
