// Shared traits + frames for the quote service adapters

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::MarketResult;
use crate::market_data::types::{Exchange, ExchangeSnapshot, Period, QuotePayload};

pub mod rest;
pub mod rest_types;
pub mod sse;
pub mod ws;

pub use rest_types::{ApiResponse, HistoryPayload, SearchPayload};

/// Name of the streaming event that carries a full `LiveMarketSnapshot`.
pub const SNAPSHOT_EVENT: &str = "snapshot";

// One named event off the live stream; `data` is still raw JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFrame {
    pub event: String,
    pub data: String,
}

impl FeedFrame {
    pub fn snapshot(data: impl Into<String>) -> Self {
        Self { event: SNAPSHOT_EVENT.to_string(), data: data.into() }
    }
}

pub type FrameStream = BoxStream<'static, MarketResult<FeedFrame>>;

/// The four request/response endpoints of the quote service.
/// `success:false` comes back as `Ok` with no data; only transport and decode
/// failures are errors.
#[async_trait]
pub trait MarketDataApi: Send + Sync {
    async fn indices(&self, exchange: Exchange) -> MarketResult<ApiResponse<ExchangeSnapshot>>;

    async fn quote(&self, symbol: &str, exchange: Exchange) -> MarketResult<ApiResponse<QuotePayload>>;

    async fn history(
        &self,
        symbol: &str,
        period: Period,
        exchange: Exchange,
    ) -> MarketResult<ApiResponse<HistoryPayload>>;

    async fn search(&self, query: &str, exchange: Exchange) -> MarketResult<ApiResponse<SearchPayload>>;
}

/// A push transport for live snapshots (server-sent events or websocket).
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn subscribe(&self) -> MarketResult<FrameStream>;
}
