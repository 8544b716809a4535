//! Error types for the depth synchronizer

use thiserror::Error;

/// Depth synchronizer errors
#[derive(Error, Debug)]
pub enum DepthSyncError {
    #[error("WebSocket connection error: {0}")]
    FeedConnection(String),

    #[error("WebSocket message error: {0}")]
    FeedMessage(String),

    #[error("Failed to parse payload: {0}")]
    Parse(String),

    #[error("Snapshot fetch error: {0}")]
    Snapshot(String),

    #[error("Scale discovery error: {0}")]
    ScaleDiscovery(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for DepthSyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        DepthSyncError::FeedConnection(err.to_string())
    }
}

impl From<serde_json::Error> for DepthSyncError {
    fn from(err: serde_json::Error) -> Self {
        DepthSyncError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for DepthSyncError {
    fn from(err: reqwest::Error) -> Self {
        DepthSyncError::Snapshot(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DepthSyncError>;
