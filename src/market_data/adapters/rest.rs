// reqwest client for the quote service's request/response endpoints

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::{ApiResponse, HistoryPayload, MarketDataApi, SearchPayload};
use crate::config::ApiSettings;
use crate::error::{MarketError, MarketResult};
use crate::market_data::types::{Exchange, ExchangeSnapshot, Period, QuotePayload};

#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: String, // e.g. "http://localhost:3000/api/stocks"
}

impl RestClient {
    pub fn new(settings: &ApiSettings) -> MarketResult<Self> {
        // every dashboard read must bypass caches
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout())
            .connect_timeout(settings.connect_timeout())
            .build()?;

        Ok(Self::with_client(client, &settings.base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> MarketResult<ApiResponse<T>> {
        let url = self.endpoint(path);
        let response = self.client.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::NetworkUnavailable(format!("GET {} returned {}", url, status)));
        }

        let body: ApiResponse<T> = response.json().await?;
        debug!(url = %url, success = body.success, "Quote service responded");
        Ok(body)
    }
}

#[async_trait]
impl MarketDataApi for RestClient {
    #[instrument(level = "debug", skip(self))]
    async fn indices(&self, exchange: Exchange) -> MarketResult<ApiResponse<ExchangeSnapshot>> {
        self.get_json("indices", &[("exchange", exchange.as_str())]).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn quote(&self, symbol: &str, exchange: Exchange) -> MarketResult<ApiResponse<QuotePayload>> {
        self.get_json("quote", &[("symbol", symbol), ("exchange", exchange.as_str())])
            .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn history(
        &self,
        symbol: &str,
        period: Period,
        exchange: Exchange,
    ) -> MarketResult<ApiResponse<HistoryPayload>> {
        self.get_json(
            "history",
            &[("symbol", symbol), ("period", period.as_str()), ("exchange", exchange.as_str())],
        )
        .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn search(&self, query: &str, exchange: Exchange) -> MarketResult<ApiResponse<SearchPayload>> {
        self.get_json("search", &[("q", query), ("exchange", exchange.as_str())])
            .await
    }
}
