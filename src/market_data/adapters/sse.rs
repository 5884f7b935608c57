// Server-sent events transport: GET <stream_url>, decode `event:`/`data:` blocks

use async_trait::async_trait;
use futures::{stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use tracing::{debug, info};

use super::{FeedFrame, FeedTransport, FrameStream};
use crate::config::ApiSettings;
use crate::error::{MarketError, MarketResult};

const DEFAULT_EVENT: &str = "message";

pub struct SseTransport {
    client: Client,
    url: String,
}

impl SseTransport {
    pub fn new(settings: &ApiSettings, url: &str) -> MarketResult<Self> {
        // no overall timeout: the response body never finishes
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .build()?;
        Ok(Self { client, url: url.to_string() })
    }
}

#[async_trait]
impl FeedTransport for SseTransport {
    async fn subscribe(&self) -> MarketResult<FrameStream> {
        info!(url = %self.url, "Opening live snapshot stream");
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::NetworkUnavailable(format!(
                "live stream {} returned {}",
                self.url, status
            )));
        }

        let mut decoder = SseDecoder::default();
        let frames = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(MarketError::from(e))],
            })
            .flat_map(stream::iter);

        Ok(frames.boxed())
    }
}

/// Incremental `text/event-stream` decoder. Chunks may split lines anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<FeedFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let mut line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            if line.ends_with('\r') {
                line.pop();
            }
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<FeedFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None; // comment / keep-alive
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            other => debug!(field = other, "Ignoring event-stream field"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<FeedFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(FeedFrame {
            event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        })
    }
}
