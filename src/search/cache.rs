use std::time::Duration;

use ahash::AHashMap;
use tokio::time::Instant;

use crate::market_data::types::{Exchange, Stock};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchCacheEntry {
    pub results: Vec<Stock>,
    pub fetched_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheLookup<'a> {
    Fresh(&'a [Stock]),
    // past its TTL: still shown while the refetch runs
    Stale(&'a [Stock]),
    Miss,
}

/// Shown search results keyed by (exchange, uppercased query). Expiry is checked
/// lazily on lookup; nothing sweeps in the background.
#[derive(Debug)]
pub struct SearchCache {
    entries: AHashMap<(Exchange, String), SearchCacheEntry>,
    ttl: Duration,
}

impl SearchCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: AHashMap::new(), ttl }
    }

    fn key(exchange: Exchange, query: &str) -> (Exchange, String) {
        (exchange, query.trim().to_uppercase())
    }

    pub fn lookup(&self, exchange: Exchange, query: &str, now: Instant) -> CacheLookup<'_> {
        match self.entries.get(&Self::key(exchange, query)) {
            Some(entry) if now.saturating_duration_since(entry.fetched_at) < self.ttl => {
                CacheLookup::Fresh(&entry.results)
            }
            Some(entry) => CacheLookup::Stale(&entry.results),
            None => CacheLookup::Miss,
        }
    }

    pub fn insert(&mut self, exchange: Exchange, query: &str, results: Vec<Stock>, now: Instant) {
        self.entries.insert(
            Self::key(exchange, query),
            SearchCacheEntry { results, fetched_at: now },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
