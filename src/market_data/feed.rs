//! Live feed client.
//!
//! `Connecting -> Streaming` while the push transport delivers snapshots. If the
//! transport is missing, or errors before the first snapshot arrived, the client
//! drops to `FallbackPoll`: one combined fetch of both exchanges' `/indices`.
//! There is no reconnect loop of our own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::MarketResult;
use crate::market_data::adapters::{ApiResponse, FeedTransport, MarketDataApi, SNAPSHOT_EVENT};
use crate::market_data::types::{Exchange, ExchangeSnapshot, LiveMarketSnapshot};
use crate::market_data::unified_snapshot::combine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Connecting,
    Streaming,
    FallbackPoll,
    // stream ended after delivering at least one snapshot
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    State(FeedState),
    Snapshot(LiveMarketSnapshot),
    // the fallback poll finished, with or without data
    Settled,
}

pub struct LiveFeed {
    transport: Option<Arc<dyn FeedTransport>>,
    api: Arc<dyn MarketDataApi>,
    disposed: Arc<AtomicBool>,
}

/// Owned by whoever spawned the feed. Dropping it does not stop the feed; `dispose` does.
pub struct FeedHandle {
    task: JoinHandle<()>,
    disposed: Arc<AtomicBool>,
}

impl FeedHandle {
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl LiveFeed {
    pub fn new(transport: Option<Arc<dyn FeedTransport>>, api: Arc<dyn MarketDataApi>) -> Self {
        Self {
            transport,
            api,
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn spawn(self, tx: mpsc::UnboundedSender<FeedEvent>) -> FeedHandle {
        let disposed = Arc::clone(&self.disposed);
        let task = tokio::spawn(self.run(tx));
        FeedHandle { task, disposed }
    }

    // Every outbound event goes through here so nothing leaks out after disposal
    fn emit(&self, tx: &mpsc::UnboundedSender<FeedEvent>, event: FeedEvent) -> bool {
        if self.disposed.load(Ordering::SeqCst) {
            trace!("Feed disposed, dropping event");
            return false;
        }
        tx.send(event).is_ok()
    }

    pub async fn run(self, tx: mpsc::UnboundedSender<FeedEvent>) {
        self.emit(&tx, FeedEvent::State(FeedState::Connecting));

        let Some(transport) = self.transport.clone() else {
            info!("No live transport configured, polling both exchanges once");
            self.fallback(&tx).await;
            return;
        };

        let mut frames = match transport.subscribe().await {
            Ok(frames) => frames,
            Err(e) => {
                warn!(error = %e, "Live stream unavailable, falling back to polling");
                self.fallback(&tx).await;
                return;
            }
        };

        let mut has_snapshot = false;
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(frame) if frame.event == SNAPSHOT_EVENT => {
                    match serde_json::from_str::<LiveMarketSnapshot>(&frame.data) {
                        Ok(snapshot) => {
                            if !has_snapshot {
                                has_snapshot = true;
                                self.emit(&tx, FeedEvent::State(FeedState::Streaming));
                            }
                            if !self.emit(&tx, FeedEvent::Snapshot(snapshot)) {
                                debug!("Snapshot receiver gone, closing stream");
                                return;
                            }
                        }
                        Err(e) => warn!(error = %e, "Ignoring malformed live snapshot"),
                    }
                }
                Ok(frame) => trace!(event = %frame.event, "Ignoring live event"),
                Err(e) if !has_snapshot => {
                    warn!(error = %e, "Live stream failed before first snapshot, falling back to polling");
                    self.fallback(&tx).await;
                    return;
                }
                Err(e) => warn!(error = %e, "Live stream error, keeping last snapshot"),
            }
        }

        if has_snapshot {
            info!("Live stream ended");
            self.emit(&tx, FeedEvent::State(FeedState::Closed));
        } else {
            warn!("Live stream ended before first snapshot, falling back to polling");
            self.fallback(&tx).await;
        }
    }

    async fn fallback(&self, tx: &mpsc::UnboundedSender<FeedEvent>) {
        self.emit(tx, FeedEvent::State(FeedState::FallbackPoll));

        let (nse, bse) = tokio::join!(self.api.indices(Exchange::NSE), self.api.indices(Exchange::BSE));

        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let nse = accept_indices(Exchange::NSE, nse);
        let bse = accept_indices(Exchange::BSE, bse);

        if nse.is_some() || bse.is_some() {
            self.emit(tx, FeedEvent::Snapshot(combine(nse.as_ref(), bse.as_ref())));
        } else {
            warn!("Fallback poll returned no data for either exchange");
        }
        self.emit(tx, FeedEvent::Settled);
    }
}

fn accept_indices(
    exchange: Exchange,
    result: MarketResult<ApiResponse<ExchangeSnapshot>>,
) -> Option<ExchangeSnapshot> {
    match result {
        Ok(resp) => {
            let data = resp.into_data();
            if data.is_none() {
                debug!(%exchange, "Indices endpoint answered without data");
            }
            data
        }
        Err(e) => {
            warn!(%exchange, error = %e, "Error fetching indices snapshot");
            None
        }
    }
}
