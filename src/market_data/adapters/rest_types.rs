// Source: GET /indices, /quote, /history, /search on the quote service
use serde::{Deserialize, Serialize};

use crate::market_data::types::{ChartPoint, Exchange, Stock};

// Common envelope: {success, data?, error?}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failed(error: Option<&str>) -> Self {
        Self { success: false, data: None, error: error.map(str::to_string) }
    }

    /// Data only when the server reported success; anything else is a no-op.
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPayload {
    #[serde(default)]
    pub symbol: String,
    pub exchange: Option<Exchange>,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub prices: Vec<ChartPoint>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPayload {
    #[serde(default)]
    pub query: String,
    pub exchange: Option<Exchange>,
    #[serde(default)]
    pub results: Vec<Stock>,
    #[serde(default)]
    pub timestamp: String,
}
