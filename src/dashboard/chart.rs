// Price history for the selected symbol and period.
// The series is cleared whenever the key changes; a response is applied only if it
// belongs to the most recent request.

use tracing::{debug, warn};

use crate::error::{MarketError, MarketResult};
use crate::market_data::adapters::{ApiResponse, HistoryPayload};
use crate::market_data::normaliser::{canonical, exchange_of_symbol, fetch_symbol};
use crate::market_data::types::{AxisLabel, ChartPoint, Exchange, Period, Stock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartKey {
    pub canonical: String,
    pub fetch_symbol: String,
    pub exchange: Exchange,
    pub period: Period,
}

impl ChartKey {
    pub fn new(stock: &Stock, period: Period) -> Self {
        let fetch = fetch_symbol(stock);
        Self {
            canonical: canonical(stock),
            exchange: exchange_of_symbol(&fetch),
            fetch_symbol: fetch,
            period,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub key: ChartKey,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChart {
    pub labels: Vec<String>,
    pub prices: Vec<f64>,
    pub axis: AxisLabel,
}

/// Labels and prices ready for plotting. `None` for an empty series, which the
/// view renders as the loading placeholder.
pub fn prepare(series: &[ChartPoint], period: Period) -> Option<PreparedChart> {
    if series.is_empty() {
        return None;
    }
    let axis = period.axis_label();
    let labels = series
        .iter()
        .map(|point| match axis {
            AxisLabel::Time => point.time.clone(),
            AxisLabel::Date => point.date.clone(),
        })
        .collect();
    let prices = series.iter().map(|point| point.price).collect();
    Some(PreparedChart { labels, prices, axis })
}

#[derive(Debug, Default)]
pub struct ChartAdapter {
    requested: Option<ChartKey>,
    generation: u64,
    series: Vec<ChartPoint>,
    updating: bool,
}

impl ChartAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every selection or period change. Returns a request when the
    /// (symbol, period) key differs from the last one asked for.
    pub fn sync(&mut self, selected: Option<&Stock>, period: Period) -> Option<ChartRequest> {
        let key = ChartKey::new(selected?, period);
        if self.requested.as_ref() == Some(&key) {
            return None;
        }

        self.series.clear();
        self.generation += 1;
        self.updating = true;
        self.requested = Some(key.clone());
        debug!(symbol = %key.fetch_symbol, period = %key.period, generation = self.generation, "Requesting history");
        Some(ChartRequest { key, generation: self.generation })
    }

    /// Drop the series and forget the last key, so the next `sync` refetches.
    pub fn clear(&mut self) {
        self.series.clear();
        self.requested = None;
        self.updating = false;
    }

    pub fn apply(
        &mut self,
        request: &ChartRequest,
        result: MarketResult<ApiResponse<HistoryPayload>>,
    ) -> MarketResult<usize> {
        if request.generation != self.generation {
            return Err(MarketError::Superseded { token: request.generation, latest: self.generation });
        }
        self.updating = false;

        match result {
            Ok(resp) => match resp.into_data() {
                Some(data) => {
                    self.series = data.prices;
                    Ok(self.series.len())
                }
                None => {
                    debug!(symbol = %request.key.fetch_symbol, "History endpoint answered without data");
                    Ok(0)
                }
            },
            Err(e) => {
                warn!(symbol = %request.key.fetch_symbol, period = %request.key.period, error = %e, "Error fetching chart data");
                Err(e)
            }
        }
    }

    pub fn series(&self) -> &[ChartPoint] {
        &self.series
    }

    pub fn prepared(&self) -> Option<PreparedChart> {
        let period = self.requested.as_ref()?.period;
        prepare(&self.series, period)
    }

    pub fn updating(&self) -> bool {
        self.updating
    }
}
