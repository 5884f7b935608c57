// Websocket transport: each text frame is either {"event": ..., "data": ...}
// or a bare snapshot object.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use super::{FeedFrame, FeedTransport, FrameStream};
use crate::error::{MarketError, MarketResult};

pub struct WsTransport {
    url: String, // e.g. "ws://localhost:3000/api/stocks/live"
}

impl WsTransport {
    pub fn new(url: &str) -> Self {
        Self { url: url.to_string() }
    }
}

/// Split an inbound text frame into event name + raw data.
pub fn parse_ws_frame(text: &str) -> FeedFrame {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mut obj)) => match obj.get("event").and_then(Value::as_str).map(str::to_string) {
            Some(event) => {
                let data = obj.remove("data").unwrap_or(Value::Null);
                FeedFrame { event, data: data.to_string() }
            }
            None => FeedFrame::snapshot(text),
        },
        // not an envelope; let the snapshot parser report it
        _ => FeedFrame::snapshot(text),
    }
}

#[async_trait]
impl FeedTransport for WsTransport {
    async fn subscribe(&self) -> MarketResult<FrameStream> {
        info!(url = %self.url, "Connecting to live snapshot websocket");
        let (ws_stream, response) = connect_async(self.url.as_str()).await?;
        debug!(status = %response.status(), "Websocket handshake complete");

        let frames = ws_stream.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(Ok(parse_ws_frame(&text))),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Websocket closed by server");
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(MarketError::from(e))),
            }
        });

        Ok(frames.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_frame() {
        let frame = parse_ws_frame(r#"{"event":"snapshot","data":{"indices":[]}}"#);
        assert_eq!(frame.event, "snapshot");
        assert_eq!(frame.data, r#"{"indices":[]}"#);
    }

    #[test]
    fn test_bare_snapshot_frame() {
        let text = r#"{"indices":[],"gainers":[],"losers":[],"timestamp":"t"}"#;
        assert_eq!(parse_ws_frame(text), FeedFrame::snapshot(text));
    }

    #[test]
    fn test_other_event_kept_by_name() {
        let frame = parse_ws_frame(r#"{"event":"heartbeat"}"#);
        assert_eq!(frame.event, "heartbeat");
        assert_eq!(frame.data, "null");
    }

    #[test]
    fn test_garbage_is_passed_on_as_snapshot() {
        assert_eq!(parse_ws_frame("not json").data, "not json");
    }
}
