//! depthsync - synchronized Binance futures order book
//!
//! This crate keeps a locally replicated limit order book for a single
//! symbol continuously in sync with Binance USDT-margined futures. It
//! combines a one-shot REST depth snapshot with the WebSocket depth-delta
//! stream, validates sequence continuity of every applied delta, and
//! re-bootstraps automatically when continuity is lost.

pub mod config;
pub mod error;
pub mod fixed;
pub mod orderbook;
pub mod parser;
pub mod render;
pub mod scales;
pub mod snapshot;
pub mod sync;
pub mod websocket;

pub use config::Config;
pub use error::{DepthSyncError, Result};
pub use fixed::SymbolScales;
pub use orderbook::{Level, OrderBook, Side};
pub use parser::{DeltaMeta, OrderBookDelta, OrderBookSnapshot};
pub use snapshot::BinanceSnapshotSource;
pub use sync::{
    LiveFeed, SnapshotSource, SyncHandle, SyncState, SyncStats, Synchronizer,
};
pub use websocket::BinanceLiveFeed;
