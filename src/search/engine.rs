//! Remote search tier.
//!
//! `SearchEngine` is a plain state machine. It never sleeps or touches the network
//! itself: `on_query` says whether a debounced remote call is wanted, the owner runs
//! the timer and the request, and feeds the outcome back tagged with its ticket.
//! Only the latest ticket is ever applied.

use std::time::Duration;

use ahash::AHashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::cache::{CacheLookup, SearchCache};
use super::ranking::instant_matches;
use crate::config::SearchSettings;
use crate::error::{MarketError, MarketResult};
use crate::market_data::adapters::{ApiResponse, SearchPayload};
use crate::market_data::normaliser::canonical;
use crate::market_data::types::{Exchange, Stock};

pub const NO_MATCHES_MESSAGE: &str = "No stocks found for this search.";
pub const UNAVAILABLE_MESSAGE: &str = "Search is temporarily unavailable.";

/// What the search box shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchView {
    pub query: String,
    pub results: Vec<Stock>,
    pub searching: bool,
    pub error: Option<String>,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSearch {
    pub ticket: u64,
    pub query: String,
    pub exchange: Exchange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPlan {
    /// Nothing to fetch: query too short, or answered from a fresh cache entry.
    Idle,
    /// Start (or restart) the debounce timer for this request.
    Debounce(RemoteSearch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Remote(usize),
    Instant(usize),
    Empty,
    Unavailable,
}

pub struct SearchEngine {
    cache: SearchCache,
    exchange: Exchange,
    debounce: Duration,
    limit: usize,
    min_len: usize,
    last_ticket: u64,
    pending: Option<RemoteSearch>,
    instant: Vec<Stock>,
    view: SearchView,
}

impl SearchEngine {
    pub fn new(settings: &SearchSettings) -> Self {
        Self {
            cache: SearchCache::new(settings.cache_ttl()),
            exchange: settings.exchange,
            debounce: settings.debounce(),
            limit: settings.result_limit,
            min_len: settings.min_query_len,
            last_ticket: 0,
            pending: None,
            instant: Vec::new(),
            view: SearchView::default(),
        }
    }

    pub fn view(&self) -> &SearchView {
        &self.view
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn pending(&self) -> Option<&RemoteSearch> {
        self.pending.as_ref()
    }

    pub fn on_query(&mut self, query: &str, pool: &[Stock], now: Instant) -> SearchPlan {
        self.view.query = query.to_string();
        let trimmed = query.trim();

        if trimmed.chars().count() < self.min_len {
            self.pending = None;
            self.instant.clear();
            self.view.results.clear();
            self.view.searching = false;
            self.view.error = None;
            return SearchPlan::Idle;
        }

        self.instant = instant_matches(pool, trimmed, self.limit, self.min_len);
        self.view.open = true;
        self.view.error = None;
        // no local hits: keep whatever is on screen until the remote answer lands
        if !self.instant.is_empty() {
            self.view.results = self.instant.clone();
        }

        match self.cache.lookup(self.exchange, trimmed, now) {
            CacheLookup::Fresh(results) => {
                debug!(query = trimmed, hits = results.len(), "Search answered from cache");
                metrics::counter!("marketview_search_cache_hits_total").increment(1);
                self.view.results = results.to_vec();
                if self.view.results.is_empty() {
                    self.view.error = Some(NO_MATCHES_MESSAGE.to_string());
                }
                self.view.searching = false;
                self.pending = None;
                return SearchPlan::Idle;
            }
            CacheLookup::Stale(results) => {
                if !results.is_empty() {
                    self.view.results = results.to_vec();
                }
            }
            CacheLookup::Miss => {}
        }

        self.last_ticket += 1;
        let remote = RemoteSearch {
            ticket: self.last_ticket,
            query: trimmed.to_string(),
            exchange: self.exchange,
        };
        self.pending = Some(remote.clone());
        SearchPlan::Debounce(remote)
    }

    /// The debounce timer for `ticket` fired. Returns the request to dispatch if it
    /// is still the latest one, and marks the view as searching.
    pub fn on_debounce_elapsed(&mut self, ticket: u64) -> Option<RemoteSearch> {
        let remote = self.pending.as_ref().filter(|p| p.ticket == ticket)?.clone();
        self.view.searching = true;
        metrics::counter!("marketview_search_requests_total").increment(1);
        Some(remote)
    }

    pub fn on_remote_result(
        &mut self,
        ticket: u64,
        result: MarketResult<ApiResponse<SearchPayload>>,
        now: Instant,
    ) -> MarketResult<SearchOutcome> {
        let remote = match self.pending.take() {
            Some(remote) if remote.ticket == ticket => remote,
            other => {
                self.pending = other;
                return Err(MarketError::Superseded { token: ticket, latest: self.last_ticket });
            }
        };
        self.view.searching = false;

        let failure = match result {
            Ok(resp) if resp.success => {
                let results = resp.data.map(|d| d.results).unwrap_or_default();
                return Ok(self.show_remote(&remote, results, now));
            }
            Ok(resp) => {
                debug!(query = %remote.query, error = ?resp.error, "Search endpoint reported failure");
                resp.error.unwrap_or_else(|| UNAVAILABLE_MESSAGE.to_string())
            }
            Err(e) => {
                if !e.is_silent() {
                    warn!(query = %remote.query, error = %e, "Remote search failed");
                }
                UNAVAILABLE_MESSAGE.to_string()
            }
        };

        self.view.results = self.instant.clone();
        if self.instant.is_empty() {
            self.view.error = Some(failure);
            Ok(SearchOutcome::Unavailable)
        } else {
            self.view.error = None;
            Ok(SearchOutcome::Instant(self.instant.len()))
        }
    }

    fn show_remote(&mut self, remote: &RemoteSearch, results: Vec<Stock>, now: Instant) -> SearchOutcome {
        let mut remote_results = dedup_by_company(results);
        remote_results.truncate(self.limit);

        let (shown, outcome) = if !remote_results.is_empty() {
            let n = remote_results.len();
            (remote_results, SearchOutcome::Remote(n))
        } else if !self.instant.is_empty() {
            (self.instant.clone(), SearchOutcome::Instant(self.instant.len()))
        } else {
            let empty = MarketError::EmptyResult { query: remote.query.clone() };
            debug!(error = %empty, "Nothing to show");
            (Vec::new(), SearchOutcome::Empty)
        };

        self.cache.insert(remote.exchange, &remote.query, shown.clone(), now);
        self.view.error = shown.is_empty().then(|| NO_MATCHES_MESSAGE.to_string());
        self.view.results = shown;
        outcome
    }

    /// Clears query, results and error, and closes the list.
    pub fn close(&mut self) {
        self.pending = None;
        self.instant.clear();
        self.view = SearchView::default();
    }

    pub fn set_open(&mut self, open: bool) {
        self.view.open = open;
    }
}

// Keyed by canonical symbol: an entry keeps the slot of its first occurrence and the
// value of its last.
fn dedup_by_company(results: Vec<Stock>) -> Vec<Stock> {
    let mut slots: AHashMap<String, usize> = AHashMap::with_capacity(results.len());
    let mut out: Vec<Stock> = Vec::with_capacity(results.len());
    for stock in results {
        let key = canonical(&stock);
        match slots.get(&key) {
            Some(&idx) => out[idx] = stock,
            None => {
                slots.insert(key, out.len());
                out.push(stock);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(symbol: &str, fetch: &str, name: &str) -> Stock {
        Stock {
            symbol: symbol.to_string(),
            fetch_symbol: Some(fetch.to_string()),
            name: name.to_string(),
            ..Stock::default()
        }
    }

    fn engine() -> SearchEngine {
        SearchEngine::new(&SearchSettings::default())
    }

    fn payload(results: Vec<Stock>) -> MarketResult<ApiResponse<SearchPayload>> {
        Ok(ApiResponse::ok(SearchPayload { results, ..SearchPayload::default() }))
    }

    fn ticket_of(plan: SearchPlan) -> u64 {
        match plan {
            SearchPlan::Debounce(remote) => remote.ticket,
            SearchPlan::Idle => panic!("expected a remote search"),
        }
    }

    #[test]
    fn test_short_query_clears_and_stays_idle() {
        let mut engine = engine();
        let pool = vec![stock("TCS", "TCS.NS", "Tata Consultancy Services")];
        let now = Instant::now();
        let plan = engine.on_query("tc", &pool, now);
        assert!(matches!(plan, SearchPlan::Debounce(_)));
        assert_eq!(engine.view().results.len(), 1);

        assert_eq!(engine.on_query("t", &pool, now), SearchPlan::Idle);
        assert!(engine.view().results.is_empty());
        assert!(!engine.view().searching);
        assert!(engine.pending().is_none());
    }

    #[test]
    fn test_remote_results_replace_instant() {
        let mut engine = engine();
        let pool = vec![stock("INFY", "INFY.NS", "Infosys")];
        let now = Instant::now();
        let ticket = ticket_of(engine.on_query("inf", &pool, now));
        assert!(engine.on_debounce_elapsed(ticket).is_some());

        let outcome = engine
            .on_remote_result(ticket, payload(vec![stock("INFIBEAM", "INFIBEAM.NS", "Infibeam")]), now)
            .unwrap();
        assert_eq!(outcome, SearchOutcome::Remote(1));
        assert_eq!(engine.view().results[0].symbol, "INFIBEAM");
        assert!(engine.view().error.is_none());
    }

    #[test]
    fn test_stale_ticket_is_superseded() {
        let mut engine = engine();
        let now = Instant::now();
        let first = ticket_of(engine.on_query("tcs", &[], now));
        let second = ticket_of(engine.on_query("tcs ltd", &[], now));
        assert!(engine.on_debounce_elapsed(first).is_none());

        let err = engine.on_remote_result(first, payload(vec![]), now).unwrap_err();
        assert_eq!(err, MarketError::Superseded { token: first, latest: second });
        // the newer request is still pending
        assert_eq!(engine.pending().map(|p| p.ticket), Some(second));
    }

    #[test]
    fn test_zero_remote_results_fall_back_to_instant() {
        let mut engine = engine();
        let pool = vec![stock("TCS", "TCS.NS", "Tata Consultancy Services")];
        let now = Instant::now();
        let ticket = ticket_of(engine.on_query("tata", &pool, now));
        let outcome = engine.on_remote_result(ticket, payload(vec![]), now).unwrap();
        assert_eq!(outcome, SearchOutcome::Instant(1));
        assert!(engine.view().error.is_none());
    }

    #[test]
    fn test_zero_results_everywhere_reports_no_matches() {
        let mut engine = engine();
        let now = Instant::now();
        let ticket = ticket_of(engine.on_query("zzzz", &[], now));
        let outcome = engine.on_remote_result(ticket, payload(vec![]), now).unwrap();
        assert_eq!(outcome, SearchOutcome::Empty);
        assert_eq!(engine.view().error.as_deref(), Some(NO_MATCHES_MESSAGE));
    }

    #[test]
    fn test_failure_keeps_instant_matches_without_error() {
        let mut engine = engine();
        let pool = vec![stock("TCS", "TCS.NS", "Tata Consultancy Services")];
        let now = Instant::now();
        let ticket = ticket_of(engine.on_query("tcs", &pool, now));
        let outcome = engine
            .on_remote_result(ticket, Err(MarketError::NetworkUnavailable("down".into())), now)
            .unwrap();
        assert_eq!(outcome, SearchOutcome::Instant(1));
        assert!(engine.view().error.is_none());
    }

    #[test]
    fn test_failure_without_matches_is_unavailable() {
        let mut engine = engine();
        let now = Instant::now();
        let ticket = ticket_of(engine.on_query("hdfc", &[], now));
        engine
            .on_remote_result(ticket, Err(MarketError::NetworkUnavailable("down".into())), now)
            .unwrap();
        assert_eq!(engine.view().error.as_deref(), Some(UNAVAILABLE_MESSAGE));

        let ticket = ticket_of(engine.on_query("hdfcb", &[], now));
        let outcome = engine
            .on_remote_result(ticket, Ok(ApiResponse::failed(Some("rate limited"))), now)
            .unwrap();
        assert_eq!(outcome, SearchOutcome::Unavailable);
        assert_eq!(engine.view().error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn test_fresh_cache_skips_network_and_stale_refetches() {
        let mut engine = engine();
        let t0 = Instant::now();
        let ticket = ticket_of(engine.on_query("tcs", &[], t0));
        engine
            .on_remote_result(ticket, payload(vec![stock("TCS", "TCS.NS", "TCS")]), t0)
            .unwrap();

        let plan = engine.on_query("TCS", &[], t0 + Duration::from_secs(10));
        assert_eq!(plan, SearchPlan::Idle);
        assert_eq!(engine.view().results.len(), 1);

        let plan = engine.on_query("tcs", &[], t0 + Duration::from_secs(46));
        assert!(matches!(plan, SearchPlan::Debounce(_)));
        // stale entry shown while the refetch runs
        assert_eq!(engine.view().results.len(), 1);
        assert!(!engine.view().searching);
    }

    #[test]
    fn test_searching_only_once_request_is_dispatched() {
        let mut engine = engine();
        let now = Instant::now();
        let ticket = ticket_of(engine.on_query("reliance", &[], now));
        assert!(!engine.view().searching);

        assert!(engine.on_debounce_elapsed(ticket).is_some());
        assert!(engine.view().searching);

        engine.on_remote_result(ticket, payload(vec![]), now).unwrap();
        assert!(!engine.view().searching);
    }

    #[test]
    fn test_refined_query_without_local_hits_keeps_remote_results() {
        let mut engine = engine();
        let now = Instant::now();
        let ticket = ticket_of(engine.on_query("hdfc", &[], now));
        engine
            .on_remote_result(ticket, payload(vec![stock("HDFCBANK", "HDFCBANK.NS", "HDFC Bank")]), now)
            .unwrap();
        assert_eq!(engine.view().results.len(), 1);

        let plan = engine.on_query("hdfcb", &[], now);
        assert!(matches!(plan, SearchPlan::Debounce(_)));
        assert_eq!(engine.view().results.len(), 1);
        assert_eq!(engine.view().results[0].symbol, "HDFCBANK");
    }

    #[test]
    fn test_remote_dedup_first_position_last_value() {
        let mut a = stock("TCS", "TCS.NS", "first");
        a.price = 1.0;
        let b = stock("INFY", "INFY.NS", "Infosys");
        let mut c = stock("TCS", "TCS.BO", "last");
        c.price = 2.0;

        let out = dedup_by_company(vec![a, b, c]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "last");
        assert_eq!(out[0].fetch_symbol.as_deref(), Some("TCS.BO"));
        assert_eq!(out[1].symbol, "INFY");
    }

    #[test]
    fn test_close_resets_view() {
        let mut engine = engine();
        let now = Instant::now();
        engine.on_query("tcs", &[], now);
        engine.close();
        assert_eq!(engine.view(), &SearchView::default());
        assert!(engine.pending().is_none());
    }
}
