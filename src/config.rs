//! Configuration module for the depth synchronizer

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Trading symbol to synchronize (e.g. "BTCUSDT")
    pub symbol: String,

    /// WebSocket endpoint for the futures depth stream
    pub ws_endpoint: String,

    /// REST API endpoint for snapshots and exchange metadata
    pub rest_endpoint: String,

    /// Depth stream update speed, "100ms" or "1000ms"
    pub depth_speed: String,

    /// Number of levels requested per snapshot
    pub depth_limit: u32,

    /// Levels shown per side in the terminal view
    pub render_levels: usize,

    /// Idle read timeout on the live feed, in seconds
    pub idle_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let depth_speed = env::var("DEPTH_SPEED").unwrap_or_else(|_| "100ms".to_string());
        if depth_speed != "100ms" && depth_speed != "1000ms" {
            anyhow::bail!("DEPTH_SPEED must be 100ms or 1000ms, got {depth_speed}");
        }

        Ok(Self {
            symbol: env::var("SYMBOL")
                .unwrap_or_else(|_| "BTCUSDT".to_string())
                .trim()
                .to_uppercase(),
            ws_endpoint: env::var("WS_ENDPOINT")
                .unwrap_or_else(|_| "wss://fstream.binance.com/ws".to_string()),
            rest_endpoint: env::var("REST_ENDPOINT")
                .unwrap_or_else(|_| "https://fapi.binance.com".to_string()),
            depth_speed,
            depth_limit: env::var("DEPTH_LIMIT")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            render_levels: env::var("RENDER_LEVELS")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .unwrap_or(25),
            idle_timeout_secs: env::var("IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            ws_endpoint: "wss://fstream.binance.com/ws".to_string(),
            rest_endpoint: "https://fapi.binance.com".to_string(),
            depth_speed: "100ms".to_string(),
            depth_limit: 1000,
            render_levels: 25,
            idle_timeout_secs: 30,
        }
    }
}
