//! REST depth snapshot source
//!
//! One HTTPS GET per request; the result callback resolves exactly once with
//! `None` on any transport, status, or decode failure. Stale results are
//! filtered by the synchronizer's generation tag, so an in-flight request is
//! never torn down here.

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::fixed::SymbolScales;
use crate::parser::{self, OrderBookSnapshot};
use crate::sync::{OnSnapshot, SnapshotSource};

/// Snapshot transport bound to one symbol.
pub struct BinanceSnapshotSource {
    client: reqwest::Client,
    rest_endpoint: String,
    symbol: String,
    depth_limit: u32,
    scales: SymbolScales,
}

impl BinanceSnapshotSource {
    pub fn new(
        client: reqwest::Client,
        rest_endpoint: &str,
        symbol: &str,
        depth_limit: u32,
        scales: SymbolScales,
    ) -> Self {
        Self {
            client,
            rest_endpoint: rest_endpoint.to_string(),
            symbol: symbol.to_uppercase(),
            depth_limit,
            scales,
        }
    }
}

impl SnapshotSource for BinanceSnapshotSource {
    fn request(&mut self, on_result: OnSnapshot) {
        let url = format!(
            "{}/fapi/v1/depth?symbol={}&limit={}",
            self.rest_endpoint, self.symbol, self.depth_limit
        );
        let client = self.client.clone();
        let scales = self.scales;

        tokio::spawn(async move {
            let snapshot = fetch_snapshot(&client, &url, &scales).await;
            on_result(snapshot);
        });
    }
}

async fn fetch_snapshot(
    client: &reqwest::Client,
    url: &str,
    scales: &SymbolScales,
) -> Option<OrderBookSnapshot> {
    debug!(url = %url, "Fetching order book snapshot");

    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "snapshot request failed");
            return None;
        }
    };

    if response.status() != StatusCode::OK {
        warn!(status = ?response.status(), "snapshot request rejected");
        return None;
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "snapshot body read failed");
            return None;
        }
    };

    let snapshot = match parser::decode_snapshot(&body, scales) {
        Some(snapshot) => snapshot,
        None => {
            warn!("snapshot payload failed to decode");
            return None;
        }
    };

    if snapshot.last_update_id == 0 {
        warn!("snapshot carries no update id");
        return None;
    }

    Some(snapshot)
}
