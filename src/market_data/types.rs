use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Exchange {
    NSE,
    BSE,
}

impl Exchange {
    pub const ALL: [Exchange; 2] = [Exchange::NSE, Exchange::BSE];

    // Yahoo-style suffix without the dot
    pub fn suffix(self) -> &'static str {
        match self {
            Exchange::NSE => "NS",
            Exchange::BSE => "BO",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Exchange::NSE => "NSE",
            Exchange::BSE => "BSE",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NSE" => Ok(Exchange::NSE),
            "BSE" => Ok(Exchange::BSE),
            other => Err(format!("unknown exchange `{}`", other)),
        }
    }
}

// One listed instrument as the quote service reports it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub symbol: String,
    // exchange-qualified symbol, e.g. "TCS.NS" or "^NSEI"
    #[serde(default, rename = "yahooSymbol", skip_serializing_if = "Option::is_none")]
    pub fetch_symbol: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(default)]
    pub change_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Market breadth for one exchange. Passed through untouched by the combiner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    #[serde(default)]
    pub today_high: f64,
    #[serde(default)]
    pub today_low: f64,
    #[serde(default)]
    pub advances: u32,
    #[serde(default)]
    pub declines: u32,
    #[serde(default)]
    pub unchanged: u32,
}

// Dashboard lists for a single exchange, as served by /indices
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<Exchange>,
    #[serde(default)]
    pub indices: Vec<Stock>,
    #[serde(default)]
    pub gainers: Vec<Stock>,
    #[serde(default)]
    pub losers: Vec<Stock>,
    // absent means "omit", never zeroed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_stats: Option<MarketStats>,
    #[serde(default)]
    pub timestamp: String,
}

/// The unit of display state. Each one fully replaces the previous.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMarketSnapshot {
    #[serde(default)]
    pub indices: Vec<Stock>,
    #[serde(default)]
    pub gainers: Vec<Stock>,
    #[serde(default)]
    pub losers: Vec<Stock>,
    #[serde(default)]
    pub market_stats_by_exchange: BTreeMap<Exchange, MarketStats>,
    #[serde(default)]
    pub timestamp: String,
}

impl LiveMarketSnapshot {
    /// Indices, then gainers, then losers. This is the order selection lookups scan.
    pub fn universe(&self) -> impl Iterator<Item = &Stock> {
        self.indices.iter().chain(self.gainers.iter()).chain(self.losers.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartPoint {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub volume: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Period {
    #[default]
    OneDay,
    OneMonth,
    ThreeMonths,
    OneYear,
    ThreeYears,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisLabel {
    Time,
    Date,
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::OneDay,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::OneYear,
        Period::ThreeYears,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::OneMonth => "1m",
            Period::ThreeMonths => "3m",
            Period::OneYear => "1y",
            Period::ThreeYears => "3y",
        }
    }

    // intraday series are labelled by clock time, everything else by date
    pub fn axis_label(self) -> AxisLabel {
        match self {
            Period::OneDay => AxisLabel::Time,
            _ => AxisLabel::Date,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown period `{}` (expected 1d, 1m, 3m, 1y or 3y)", s.trim()))
    }
}

/// Body of a /quote response. Every field is optional so a merge can prefer
/// exactly what the server sent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotePayload {
    pub symbol: Option<String>,
    #[serde(rename = "yahooSymbol")]
    pub fetch_symbol: Option<String>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub currency: Option<String>,
    pub exchange: Option<Exchange>,
    pub timestamp: Option<String>,
}
