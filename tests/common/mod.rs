#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};

use marketview_rs::error::{MarketError, MarketResult};
use marketview_rs::market_data::adapters::{
    ApiResponse, FeedFrame, FeedTransport, FrameStream, HistoryPayload, MarketDataApi, SearchPayload,
};
use marketview_rs::market_data::types::{
    ChartPoint, Exchange, ExchangeSnapshot, LiveMarketSnapshot, MarketStats, Period, QuotePayload, Stock,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Indices(Exchange),
    Quote(String, Exchange),
    History(String, Period, Exchange),
    Search(String, Exchange),
}

/// In-memory quote service with per-endpoint latency.
#[derive(Default)]
pub struct FakeApi {
    indices: Mutex<HashMap<Exchange, MarketResult<ApiResponse<ExchangeSnapshot>>>>,
    indices_delay: Mutex<Duration>,
    quotes: Mutex<HashMap<String, (Duration, QuotePayload)>>,
    history: Mutex<Vec<ChartPoint>>,
    search: Mutex<Option<MarketResult<ApiResponse<SearchPayload>>>>,
    search_delay: Mutex<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_indices(&self, exchange: Exchange, result: MarketResult<ApiResponse<ExchangeSnapshot>>) {
        self.indices.lock().unwrap().insert(exchange, result);
    }

    pub fn set_indices_delay(&self, delay: Duration) {
        *self.indices_delay.lock().unwrap() = delay;
    }

    pub fn set_quote(&self, fetch_symbol: &str, delay: Duration, quote: QuotePayload) {
        self.quotes.lock().unwrap().insert(fetch_symbol.to_string(), (delay, quote));
    }

    pub fn set_history(&self, prices: Vec<ChartPoint>) {
        *self.history.lock().unwrap() = prices;
    }

    pub fn set_search(&self, delay: Duration, result: MarketResult<ApiResponse<SearchPayload>>) {
        *self.search_delay.lock().unwrap() = delay;
        *self.search.lock().unwrap() = Some(result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Search(q, _) => Some(q),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MarketDataApi for FakeApi {
    async fn indices(&self, exchange: Exchange) -> MarketResult<ApiResponse<ExchangeSnapshot>> {
        self.record(Call::Indices(exchange));
        let delay = *self.indices_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.indices
            .lock()
            .unwrap()
            .get(&exchange)
            .cloned()
            .unwrap_or_else(|| Ok(ApiResponse::failed(None)))
    }

    async fn quote(&self, symbol: &str, exchange: Exchange) -> MarketResult<ApiResponse<QuotePayload>> {
        self.record(Call::Quote(symbol.to_string(), exchange));
        let entry = self.quotes.lock().unwrap().get(symbol).cloned();
        match entry {
            Some((delay, quote)) => {
                tokio::time::sleep(delay).await;
                Ok(ApiResponse::ok(quote))
            }
            None => Ok(ApiResponse::failed(Some("unknown symbol"))),
        }
    }

    async fn history(
        &self,
        symbol: &str,
        period: Period,
        exchange: Exchange,
    ) -> MarketResult<ApiResponse<HistoryPayload>> {
        self.record(Call::History(symbol.to_string(), period, exchange));
        let prices = self.history.lock().unwrap().clone();
        Ok(ApiResponse::ok(HistoryPayload {
            symbol: symbol.to_string(),
            exchange: Some(exchange),
            period: period.to_string(),
            prices,
            timestamp: String::new(),
        }))
    }

    async fn search(&self, query: &str, exchange: Exchange) -> MarketResult<ApiResponse<SearchPayload>> {
        self.record(Call::Search(query.to_string(), exchange));
        let delay = *self.search_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.search
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(ApiResponse::ok(SearchPayload::default())))
    }
}

/// Replays a fixed list of frames, then either ends or stays open.
pub struct FakeTransport {
    frames: Mutex<Option<Vec<MarketResult<FeedFrame>>>>,
    hold_open: bool,
    fail_subscribe: bool,
}

impl FakeTransport {
    pub fn new(frames: Vec<MarketResult<FeedFrame>>, hold_open: bool) -> Self {
        Self { frames: Mutex::new(Some(frames)), hold_open, fail_subscribe: false }
    }

    pub fn unreachable() -> Self {
        Self { frames: Mutex::new(None), hold_open: false, fail_subscribe: true }
    }
}

#[async_trait]
impl FeedTransport for FakeTransport {
    async fn subscribe(&self) -> MarketResult<FrameStream> {
        if self.fail_subscribe {
            return Err(MarketError::NetworkUnavailable("connection refused".into()));
        }
        let frames = self.frames.lock().unwrap().take().unwrap_or_default();
        let replay = stream::iter(frames);
        if self.hold_open {
            Ok(replay.chain(stream::pending()).boxed())
        } else {
            Ok(replay.boxed())
        }
    }
}

pub fn stock(symbol: &str, fetch: &str, pct: f64) -> Stock {
    Stock {
        symbol: symbol.to_string(),
        fetch_symbol: Some(fetch.to_string()),
        name: format!("{} Ltd", symbol),
        price: 100.0,
        change: pct,
        change_percent: pct,
        currency: Some("INR".to_string()),
    }
}

pub fn stats(advances: u32) -> MarketStats {
    MarketStats { today_high: 22500.0, today_low: 22100.0, advances, declines: 10, unchanged: 2 }
}

pub fn exchange_snapshot(
    exchange: Exchange,
    indices: Vec<Stock>,
    movers: Vec<Stock>,
    timestamp: &str,
) -> ExchangeSnapshot {
    let (gainers, losers) = movers.into_iter().partition(|s| s.change_percent >= 0.0);
    ExchangeSnapshot {
        exchange: Some(exchange),
        indices,
        gainers,
        losers,
        market_stats: Some(stats(30)),
        timestamp: timestamp.to_string(),
    }
}

pub fn snapshot_frame(snapshot: &LiveMarketSnapshot) -> MarketResult<FeedFrame> {
    Ok(FeedFrame::snapshot(serde_json::to_string(snapshot).unwrap()))
}

pub fn point(date: &str, time: &str, price: f64) -> ChartPoint {
    ChartPoint { date: date.to_string(), time: time.to_string(), price, volume: 1_000 }
}
