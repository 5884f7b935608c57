//! Dashboard state container.
//!
//! Everything the view shows lives here and only changes through these methods.
//! No I/O happens in this module; the session decides when each method runs.

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use super::quote::{merge_quote, QuoteTicket};
use crate::error::{MarketError, MarketResult};
use crate::market_data::normaliser::{canonical, fetch_symbol, seed_stock};
use crate::market_data::types::{Exchange, LiveMarketSnapshot, MarketStats, Period, QuotePayload, Stock};
use crate::market_data::unified_snapshot::merge_unique_stocks;
use crate::search::ranking::quick_pool;

/// The selected stock together with the quote generation it was selected under.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub stock: Stock,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    snapshot: LiveMarketSnapshot,
    stats_exchange: Exchange,
    selection: Option<Selection>,
    period: Period,
    loading: bool,
    last_updated: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            snapshot: LiveMarketSnapshot::default(),
            stats_exchange: Exchange::NSE,
            selection: None,
            period: Period::default(),
            loading: true,
            last_updated: now,
        }
    }

    /// Replace the displayed lists wholesale and carry the selection across.
    pub fn apply_snapshot(&mut self, snapshot: LiveMarketSnapshot, now: DateTime<Utc>) {
        let stats = &snapshot.market_stats_by_exchange;
        if !stats.contains_key(&self.stats_exchange) {
            if let Some(exchange) = [Exchange::NSE, Exchange::BSE].into_iter().find(|e| stats.contains_key(e)) {
                self.stats_exchange = exchange;
            }
        }

        self.last_updated = DateTime::parse_from_rfc3339(&snapshot.timestamp)
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or(now);

        match self.selection.as_mut() {
            Some(selection) => {
                let key = fetch_symbol(&selection.stock);
                match snapshot.universe().find(|s| fetch_symbol(s) == key) {
                    Some(refreshed) => selection.stock = refreshed.clone(),
                    None => trace!(symbol = %key, "Selection not in snapshot, keeping it"),
                }
            }
            None => {
                let first = snapshot.indices.first().or_else(|| snapshot.universe().next());
                if let Some(stock) = first {
                    debug!(symbol = %fetch_symbol(stock), "Defaulting selection");
                    self.selection = Some(Selection { stock: stock.clone(), generation: 0 });
                }
            }
        }

        self.snapshot = snapshot;
        self.loading = false;
        metrics::counter!("marketview_snapshots_applied_total").increment(1);
    }

    pub fn select(&mut self, provisional: Stock, generation: u64, reset_period: bool) {
        if reset_period {
            self.period = Period::OneDay;
        }
        self.selection = Some(Selection { stock: provisional, generation });
    }

    pub fn apply_quote(&mut self, ticket: &QuoteTicket, quote: QuotePayload, now: DateTime<Utc>) -> MarketResult<()> {
        let current = match &self.selection {
            Some(selection) if selection.generation == ticket.token => Some(&selection.stock),
            Some(selection) => {
                return Err(MarketError::Superseded { token: ticket.token, latest: selection.generation });
            }
            None => None,
        };

        let stock = merge_quote(current, ticket, quote);
        self.selection = Some(Selection { stock, generation: ticket.token });
        self.last_updated = now;
        Ok(())
    }

    pub fn set_period(&mut self, period: Period) {
        self.period = period;
    }

    pub fn set_stats_exchange(&mut self, exchange: Exchange) {
        self.stats_exchange = exchange;
    }

    /// Stats of the active exchange, else NSE, else BSE, else all zeros.
    pub fn active_stats(&self) -> MarketStats {
        let stats = &self.snapshot.market_stats_by_exchange;
        [self.stats_exchange, Exchange::NSE, Exchange::BSE]
            .iter()
            .find_map(|e| stats.get(e).copied())
            .unwrap_or_default()
    }

    pub fn quick_pool(&self) -> Vec<Stock> {
        let selected = self.selected();
        quick_pool(self.snapshot.universe().chain(selected))
    }

    /// Find `symbol` among the on-screen stocks and `search_results`: exact fetch
    /// symbol first, then canonical symbol, else a seed stock.
    pub fn resolve_symbol(&self, symbol: &str, search_results: &[Stock]) -> Stock {
        let wanted = symbol.trim().to_uppercase();
        let base = canonical(&seed_stock(&wanted));
        let universe = merge_unique_stocks(self.snapshot.universe().chain(search_results));

        universe
            .iter()
            .find(|s| fetch_symbol(s) == wanted)
            .or_else(|| universe.iter().find(|s| canonical(s) == base))
            .cloned()
            .unwrap_or_else(|| seed_stock(&wanted))
    }

    /// The fallback poll finished; stop showing the loading screen even without data.
    pub fn mark_settled(&mut self) {
        self.loading = false;
    }

    pub fn snapshot(&self) -> &LiveMarketSnapshot {
        &self.snapshot
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn selected(&self) -> Option<&Stock> {
        self.selection.as_ref().map(|s| &s.stock)
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn stats_exchange(&self) -> Exchange {
        self.stats_exchange
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}
