//! A single `<symbol>@depth@<speed>` stream subscription.
//!
//! The depth stream carries JSON text frames only, so reads reduce to two
//! outcomes: a payload for the synchronizer, or control traffic proving the
//! connection is alive. Everything else ends the stream.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::error::{DepthSyncError, Result};

type WsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What one read off the stream yields once control traffic is handled.
#[derive(Debug)]
pub enum StreamEvent {
    /// A depth payload to hand to the synchronizer.
    Payload(String),
    /// Ping, pong, or another non-data frame. The connection is alive but
    /// there is nothing to deliver.
    Control,
}

pub struct DepthStream {
    socket: Option<WsSocket>,
    target: String,
}

impl DepthStream {
    pub fn new(endpoint: &str, symbol: &str, depth_speed: &str) -> Self {
        Self {
            socket: None,
            target: format!("{}/{}@depth@{}", endpoint, symbol.to_lowercase(), depth_speed),
        }
    }

    /// Open the subscription.
    pub async fn connect(&mut self) -> Result<()> {
        info!(target = %self.target, "opening depth stream");

        let (socket, response) = connect_async(&self.target).await.map_err(|e| {
            DepthSyncError::FeedConnection(format!("connect {}: {e}", self.target))
        })?;

        debug!(status = ?response.status(), "depth stream handshake complete");
        self.socket = Some(socket);
        Ok(())
    }

    /// Read the next event, answering server pings inline.
    ///
    /// Errors are terminal: the socket is dropped and the caller decides
    /// whether to resubscribe.
    pub async fn next_event(&mut self) -> Result<StreamEvent> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| DepthSyncError::FeedConnection("not connected".to_string()))?;

        let message = match socket.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                self.socket = None;
                return Err(DepthSyncError::FeedMessage(e.to_string()));
            }
            None => {
                self.socket = None;
                return Err(DepthSyncError::FeedConnection(
                    "depth stream ended".to_string(),
                ));
            }
        };

        match message {
            Message::Text(payload) => Ok(StreamEvent::Payload(payload)),
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
                Ok(StreamEvent::Control)
            }
            Message::Close(frame) => {
                warn!(frame = ?frame, "depth stream closed by server");
                self.socket = None;
                Err(DepthSyncError::FeedConnection(
                    "server closed the stream".to_string(),
                ))
            }
            // The depth stream never carries binary data; anything but text
            // is control traffic.
            other => {
                debug!(frame = ?other, "ignoring non-text frame");
                Ok(StreamEvent::Control)
            }
        }
    }

    /// Probe the connection after the stream has gone quiet.
    pub async fn keepalive(&mut self) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| DepthSyncError::FeedConnection("not connected".to_string()))?;

        socket
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| DepthSyncError::FeedMessage(format!("keepalive: {e}")))
    }

    /// Drop the subscription, sending a close frame when still connected.
    pub async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
    }
}
