//! WebSocket telemetry source

use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::{FrameStream, TelemetrySource};
use crate::error::TransportError;

/// Telemetry over a WebSocket
#[derive(Clone, Debug)]
pub struct WebSocketSource {
    url: String,
}

impl WebSocketSource {
    /// Source for the given `ws://` or `wss://` address
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Stream address
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TelemetrySource for WebSocketSource {
    async fn open(&self) -> Result<FrameStream, TransportError> {
        let (ws, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(url = %self.url, "Telemetry WebSocket open");

        // Control frames are answered by tungstenite while reading; only
        // payload frames are surfaced.
        let frames = ws.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => String::from_utf8(bytes).ok().map(Ok),
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_else(|| "closed by server".to_string());
                    Some(Err(TransportError::Closed(reason)))
                }
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::Closed(e.to_string()))),
            }
        });
        Ok(frames.boxed())
    }
}
