//! WebSocket module for the Binance depth stream
//!
//! [`BinanceLiveFeed`] adapts the stream to the synchronizer's `LiveFeed`
//! capability: one background task per subscription, text frames forwarded
//! through the provided callback.

mod client;

pub use client::{DepthStream, StreamEvent};

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::sync::{LiveFeed, OnText};

/// Live depth-delta transport over a TLS WebSocket.
///
/// The feed does not reconnect on its own: on close, error, or idle timeout
/// the task ends and the book synchronizer keeps its current state until the
/// embedder restarts it.
pub struct BinanceLiveFeed {
    endpoint: String,
    depth_speed: String,
    idle_timeout: Duration,
    task: Option<JoinHandle<()>>,
}

impl BinanceLiveFeed {
    pub fn new(endpoint: &str, depth_speed: &str, idle_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            depth_speed: depth_speed.to_string(),
            idle_timeout,
            task: None,
        }
    }
}

impl LiveFeed for BinanceLiveFeed {
    fn start(&mut self, symbol: &str, on_text: OnText) {
        self.stop();

        let mut stream = DepthStream::new(&self.endpoint, symbol, &self.depth_speed);
        let idle_timeout = self.idle_timeout;
        let symbol = symbol.to_string();

        self.task = Some(tokio::spawn(async move {
            if let Err(e) = stream.connect().await {
                warn!(symbol = %symbol, error = %e, "depth stream connect failed");
                return;
            }

            let mut pinged_since_last_frame = false;
            loop {
                match timeout(idle_timeout, stream.next_event()).await {
                    Ok(Ok(StreamEvent::Payload(text))) => {
                        pinged_since_last_frame = false;
                        on_text(text);
                    }
                    Ok(Ok(StreamEvent::Control)) => {
                        pinged_since_last_frame = false;
                    }
                    Ok(Err(e)) => {
                        warn!(symbol = %symbol, error = %e, "depth stream closed");
                        break;
                    }
                    Err(_) => {
                        if pinged_since_last_frame {
                            warn!(
                                symbol = %symbol,
                                idle_secs = idle_timeout.as_secs(),
                                "still silent after keepalive, dropping depth stream"
                            );
                            break;
                        }
                        warn!(symbol = %symbol, "no message within idle timeout, sending ping");
                        if stream.keepalive().await.is_err() {
                            break;
                        }
                        pinged_since_last_frame = true;
                    }
                }
            }

            stream.close().await;
            info!(symbol = %symbol, "depth stream task finished");
        }));
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for BinanceLiveFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
