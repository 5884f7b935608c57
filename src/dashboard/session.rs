//! Dashboard session.
//!
//! One task owns every piece of mutable dashboard state. Commands from the UI,
//! feed events and network completions all arrive over channels and are handled
//! one at a time, so nothing here needs a lock. Network calls run in their own
//! tasks and only ever report back; the handles to those tasks (debounce timer,
//! search request, history request, quote requests, feed) are owned here and
//! aborted when superseded or when the session is disposed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::chart::{ChartAdapter, ChartRequest, PreparedChart};
use super::quote::QuoteController;
use super::quote::QuoteTicket;
use super::state::DashboardState;
use crate::config::SearchSettings;
use crate::error::MarketResult;
use crate::market_data::adapters::{ApiResponse, HistoryPayload, MarketDataApi, SearchPayload};
use crate::market_data::feed::{FeedEvent, FeedHandle, FeedState, LiveFeed};
use crate::market_data::types::{Exchange, MarketStats, Period, QuotePayload, Stock};
use crate::search::{SearchEngine, SearchPlan, SearchView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOptions {
    pub reset_period: bool,
    pub close_search: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self { reset_period: true, close_search: false }
    }
}

#[derive(Debug)]
pub enum Command {
    Search(String),
    Select { stock: Stock, exchange: Exchange, options: SelectOptions },
    // deep link: resolve a bare symbol, then select it
    SelectSymbol { symbol: String, exchange: Exchange },
    SetPeriod(Period),
    SetStatsExchange(Exchange),
    CloseSearch,
    View(oneshot::Sender<DashboardView>),
    Dispose(oneshot::Sender<()>),
}

enum Completion {
    SearchDue { ticket: u64 },
    Search { ticket: u64, result: MarketResult<ApiResponse<SearchPayload>> },
    History { request: ChartRequest, result: MarketResult<ApiResponse<HistoryPayload>> },
}

type QuoteReply = (QuoteTicket, MarketResult<ApiResponse<QuotePayload>>);

/// Everything a renderer needs, copied out of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub loading: bool,
    pub feed_state: FeedState,
    pub indices: Vec<Stock>,
    pub gainers: Vec<Stock>,
    pub losers: Vec<Stock>,
    pub stats_exchange: Exchange,
    pub stats: MarketStats,
    pub selected: Option<Stock>,
    pub period: Period,
    pub chart: Option<PreparedChart>,
    pub chart_updating: bool,
    pub search: SearchView,
    pub last_updated: DateTime<Utc>,
}

pub struct Session {
    api: Arc<dyn MarketDataApi>,
    state: DashboardState,
    search: SearchEngine,
    quotes: QuoteController,
    chart: ChartAdapter,
    feed_state: FeedState,
    last_deep_link: Option<(Exchange, String)>,
    disposed: bool,

    completions: mpsc::UnboundedSender<Completion>,
    completion_rx: Option<mpsc::UnboundedReceiver<Completion>>,
    search_timer: Option<JoinHandle<()>>,
    search_request: Option<JoinHandle<()>>,
    history_request: Option<JoinHandle<()>>,
    quote_requests: JoinSet<QuoteReply>,
}

impl Session {
    pub fn new(api: Arc<dyn MarketDataApi>, settings: &SearchSettings) -> Self {
        let (completions, completion_rx) = mpsc::unbounded_channel();
        Self {
            api,
            state: DashboardState::new(Utc::now()),
            search: SearchEngine::new(settings),
            quotes: QuoteController::new(),
            chart: ChartAdapter::new(),
            feed_state: FeedState::Connecting,
            last_deep_link: None,
            disposed: false,
            completions,
            completion_rx: Some(completion_rx),
            search_timer: None,
            search_request: None,
            history_request: None,
            quote_requests: JoinSet::new(),
        }
    }

    pub fn spawn(self, feed: LiveFeed) -> SessionHandle {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(feed, command_rx));
        SessionHandle { commands, task }
    }

    async fn run(mut self, feed: LiveFeed, mut commands: mpsc::UnboundedReceiver<Command>) {
        let Some(mut completions) = self.completion_rx.take() else {
            warn!("Session already ran");
            return;
        };
        let (feed_tx, mut feed_rx) = mpsc::unbounded_channel();
        let feed = feed.spawn(feed_tx);

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Dispose(ack)) => {
                        self.dispose(&feed);
                        let _ = ack.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        self.dispose(&feed);
                        break;
                    }
                },
                Some(event) = feed_rx.recv() => self.on_feed(event),
                Some(done) = completions.recv() => self.on_completion(done),
                Some(joined) = self.quote_requests.join_next(), if !self.quote_requests.is_empty() => match joined {
                    Ok((ticket, result)) => self.on_quote(ticket, result),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => warn!(error = %e, "Quote task failed"),
                },
            }
        }
        debug!("Session loop finished");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Search(query) => self.on_search(&query),
            Command::Select { stock, exchange, options } => self.select(&stock, exchange, options),
            Command::SelectSymbol { symbol, exchange } => self.select_symbol(&symbol, exchange),
            Command::SetPeriod(period) => {
                self.state.set_period(period);
                self.sync_chart();
            }
            Command::SetStatsExchange(exchange) => self.state.set_stats_exchange(exchange),
            Command::CloseSearch => {
                self.search.close();
                abort(&mut self.search_timer);
                abort(&mut self.search_request);
            }
            Command::View(reply) => {
                let _ = reply.send(self.view());
            }
            Command::Dispose(_) => {}
        }
    }

    fn on_search(&mut self, query: &str) {
        let pool = self.state.quick_pool();
        abort(&mut self.search_timer);

        match self.search.on_query(query, &pool, Instant::now()) {
            SearchPlan::Idle => abort(&mut self.search_request),
            SearchPlan::Debounce(remote) => {
                let tx = self.completions.clone();
                let delay = self.search.debounce();
                self.search_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Completion::SearchDue { ticket: remote.ticket });
                }));
            }
        }
    }

    fn dispatch_search(&mut self, ticket: u64) {
        let Some(remote) = self.search.on_debounce_elapsed(ticket) else {
            return;
        };
        abort(&mut self.search_request);

        debug!(query = %remote.query, exchange = %remote.exchange, ticket, "Dispatching remote search");
        let api = Arc::clone(&self.api);
        let tx = self.completions.clone();
        self.search_request = Some(tokio::spawn(async move {
            let result = api.search(&remote.query, remote.exchange).await;
            let _ = tx.send(Completion::Search { ticket: remote.ticket, result });
        }));
    }

    fn select(&mut self, stock: &Stock, exchange: Exchange, options: SelectOptions) {
        let (ticket, provisional) = self.quotes.begin(stock, exchange);
        info!(symbol = %ticket.fetch_symbol, token = ticket.token, "Selecting stock");

        self.chart.clear();
        self.state.select(provisional, ticket.token, options.reset_period);
        if options.close_search {
            self.search.close();
            abort(&mut self.search_timer);
            abort(&mut self.search_request);
        }
        self.sync_chart();

        let api = Arc::clone(&self.api);
        self.quote_requests.spawn(async move {
            let result = api.quote(&ticket.fetch_symbol, ticket.exchange).await;
            (ticket, result)
        });
    }

    fn select_symbol(&mut self, symbol: &str, exchange: Exchange) {
        let key = (exchange, symbol.trim().to_uppercase());
        if key.1.is_empty() || self.last_deep_link.as_ref() == Some(&key) {
            debug!(symbol = %key.1, %exchange, "Ignoring repeated deep link");
            return;
        }

        let stock = self.state.resolve_symbol(&key.1, &self.search.view().results);
        self.last_deep_link = Some(key);
        self.select(&stock, exchange, SelectOptions { reset_period: true, close_search: true });
    }

    fn sync_chart(&mut self) {
        let Some(request) = self.chart.sync(self.state.selected(), self.state.period()) else {
            return;
        };
        abort(&mut self.history_request);

        let api = Arc::clone(&self.api);
        let tx = self.completions.clone();
        self.history_request = Some(tokio::spawn(async move {
            let key = &request.key;
            let result = api.history(&key.fetch_symbol, key.period, key.exchange).await;
            let _ = tx.send(Completion::History { request, result });
        }));
    }

    fn on_feed(&mut self, event: FeedEvent) {
        if self.disposed {
            return;
        }
        match event {
            FeedEvent::State(state) => {
                debug!(?state, "Feed state changed");
                self.feed_state = state;
            }
            FeedEvent::Snapshot(snapshot) => {
                self.state.apply_snapshot(snapshot, Utc::now());
                self.sync_chart();
            }
            FeedEvent::Settled => self.state.mark_settled(),
        }
    }

    fn on_completion(&mut self, done: Completion) {
        if self.disposed {
            return;
        }
        match done {
            Completion::SearchDue { ticket } => self.dispatch_search(ticket),
            Completion::Search { ticket, result } => {
                match self.search.on_remote_result(ticket, result, Instant::now()) {
                    Ok(outcome) => debug!(ticket, ?outcome, "Search settled"),
                    Err(e) if e.is_silent() => debug!(ticket, error = %e, "Dropping search response"),
                    Err(e) => warn!(ticket, error = %e, "Search response rejected"),
                }
            }
            Completion::History { request, result } => match self.chart.apply(&request, result) {
                Ok(points) => debug!(symbol = %request.key.fetch_symbol, points, "Chart data applied"),
                Err(e) if e.is_silent() => debug!(error = %e, "Dropping history response"),
                // already logged by the adapter; the placeholder stays up
                Err(_) => {}
            },
        }
    }

    fn on_quote(&mut self, ticket: QuoteTicket, result: MarketResult<ApiResponse<QuotePayload>>) {
        if self.disposed || self.quotes.check(&ticket).is_err() {
            return;
        }
        let quote = match result {
            Ok(resp) => match resp.into_data() {
                Some(quote) => quote,
                None => {
                    debug!(symbol = %ticket.fetch_symbol, "Quote endpoint answered without data");
                    return;
                }
            },
            Err(e) => {
                warn!(symbol = %ticket.fetch_symbol, error = %e, "Error loading quote");
                return;
            }
        };

        match self.state.apply_quote(&ticket, quote, Utc::now()) {
            // the server may re-key the selection
            Ok(()) => self.sync_chart(),
            Err(e) => debug!(error = %e, "Quote no longer matches selection"),
        }
    }

    fn view(&self) -> DashboardView {
        let snapshot = self.state.snapshot();
        DashboardView {
            loading: self.state.loading(),
            feed_state: self.feed_state,
            indices: snapshot.indices.clone(),
            gainers: snapshot.gainers.clone(),
            losers: snapshot.losers.clone(),
            stats_exchange: self.state.stats_exchange(),
            stats: self.state.active_stats(),
            selected: self.state.selected().cloned(),
            period: self.state.period(),
            chart: self.chart.prepared(),
            chart_updating: self.chart.updating(),
            search: self.search.view().clone(),
            last_updated: self.state.last_updated(),
        }
    }

    fn dispose(&mut self, feed: &FeedHandle) {
        self.disposed = true;
        feed.dispose();
        abort(&mut self.search_timer);
        abort(&mut self.search_request);
        abort(&mut self.history_request);
        self.quote_requests.abort_all();
        info!("Dashboard session disposed");
    }
}

fn abort(slot: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = slot.take() {
        handle.abort();
    }
}

/// Client side of a running session. Commands are fire-and-forget; they return
/// false once the session has stopped.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    fn send(&self, cmd: Command) -> bool {
        self.commands.send(cmd).is_ok()
    }

    pub fn search(&self, query: impl Into<String>) -> bool {
        self.send(Command::Search(query.into()))
    }

    pub fn select(&self, stock: Stock, exchange: Exchange, options: SelectOptions) -> bool {
        self.send(Command::Select { stock, exchange, options })
    }

    pub fn select_symbol(&self, symbol: impl Into<String>, exchange: Exchange) -> bool {
        self.send(Command::SelectSymbol { symbol: symbol.into(), exchange })
    }

    pub fn set_period(&self, period: Period) -> bool {
        self.send(Command::SetPeriod(period))
    }

    pub fn set_stats_exchange(&self, exchange: Exchange) -> bool {
        self.send(Command::SetStatsExchange(exchange))
    }

    pub fn close_search(&self) -> bool {
        self.send(Command::CloseSearch)
    }

    pub async fn view(&self) -> Option<DashboardView> {
        let (tx, rx) = oneshot::channel();
        if !self.send(Command::View(tx)) {
            return None;
        }
        rx.await.ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the feed, abort every in-flight request and timer, and wait for the
    /// session task to exit.
    pub async fn dispose(self) {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::Dispose(tx)) {
            let _ = rx.await;
        }
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Session task ended abnormally");
            }
        }
    }
}
