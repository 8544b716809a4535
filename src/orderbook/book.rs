//! Core order book implementation
//!
//! Uses BTreeMap for efficient sorted price level management.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::{Level, Side};
use crate::parser::{OrderBookDelta, OrderBookSnapshot};

/// Order book for a single symbol.
///
/// The book is intentionally oblivious to sequence continuity; the
/// synchronizer decides which snapshots and deltas reach it. No key ever maps
/// to a zero quantity.
#[derive(Debug, Default)]
pub struct OrderBook {
    /// Bids sorted by price descending (highest first)
    bids: BTreeMap<Reverse<u64>, u64>,
    /// Asks sorted by price ascending (lowest first)
    asks: BTreeMap<u64, u64>,
    /// Last processed update ID
    last_update_id: u64,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both sides with the snapshot's levels and take its update id.
    pub fn apply_snapshot(&mut self, snapshot: &OrderBookSnapshot) {
        self.bids.clear();
        self.asks.clear();

        for level in &snapshot.bids {
            if level.qty > 0 {
                self.bids.insert(Reverse(level.price), level.qty);
            }
        }

        for level in &snapshot.asks {
            if level.qty > 0 {
                self.asks.insert(level.price, level.qty);
            }
        }

        self.last_update_id = snapshot.last_update_id;
    }

    /// Apply a depth delta: zero quantities remove a level, anything else
    /// inserts or overwrites. The update id moves after both sides applied.
    pub fn apply_delta(&mut self, delta: &OrderBookDelta) {
        for level in &delta.bids {
            self.update_level(Side::Bid, level);
        }
        for level in &delta.asks {
            self.update_level(Side::Ask, level);
        }
        self.last_update_id = delta.last_update;
    }

    fn update_level(&mut self, side: Side, level: &Level) {
        match side {
            Side::Bid => {
                if level.qty == 0 {
                    self.bids.remove(&Reverse(level.price));
                } else {
                    self.bids.insert(Reverse(level.price), level.qty);
                }
            }
            Side::Ask => {
                if level.qty == 0 {
                    self.asks.remove(&level.price);
                } else {
                    self.asks.insert(level.price, level.qty);
                }
            }
        }
    }

    /// Bids in descending price order.
    pub fn bids(&self) -> impl Iterator<Item = Level> + '_ {
        self.bids
            .iter()
            .map(|(Reverse(price), qty)| Level::new(*price, *qty))
    }

    /// Asks in ascending price order.
    pub fn asks(&self) -> impl Iterator<Item = Level> + '_ {
        self.asks
            .iter()
            .map(|(price, qty)| Level::new(*price, *qty))
    }

    /// Top `levels` bids, best first.
    pub fn top_bids(&self, levels: usize) -> Vec<Level> {
        self.bids().take(levels).collect()
    }

    /// Top `levels` asks, best first.
    pub fn top_asks(&self, levels: usize) -> Vec<Level> {
        self.asks().take(levels).collect()
    }

    /// Get best bid level
    pub fn best_bid(&self) -> Option<Level> {
        self.bids().next()
    }

    /// Get best ask level
    pub fn best_ask(&self) -> Option<Level> {
        self.asks().next()
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Total number of populated levels across both sides.
    pub fn depth(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Get last update ID
    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }
}
