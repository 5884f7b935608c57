// Instant tier: score the stocks already on screen against the query

use crate::market_data::normaliser::{canonical, fetch_symbol};
use crate::market_data::types::Stock;
use crate::market_data::unified_snapshot::merge_unique_by_company;

pub const EXACT_MATCH_SCORE: u32 = 1000;

const CANONICAL_PREFIX: u32 = 360;
const CANONICAL_CONTAINS: u32 = 200;
const FETCH_PREFIX: u32 = 220;
const FETCH_CONTAINS: u32 = 120;
const NAME_PREFIX: u32 = 150;
const NAME_CONTAINS: u32 = 90;

fn field_score(field: &str, query: &str, prefix: u32, contains: u32) -> u32 {
    if field.starts_with(query) {
        prefix
    } else if field.contains(query) {
        contains
    } else {
        0
    }
}

/// Case-insensitive relevance of `stock` for `query`. Exact symbol matches
/// short-circuit to `EXACT_MATCH_SCORE`, which no partial match can reach.
pub fn score(stock: &Stock, query: &str) -> u32 {
    let query = query.trim().to_uppercase();
    if query.is_empty() {
        return 0;
    }

    let base = canonical(stock);
    let fetch = fetch_symbol(stock);
    if base == query || fetch == query {
        return EXACT_MATCH_SCORE;
    }

    let name = stock.name.to_uppercase();
    field_score(&base, &query, CANONICAL_PREFIX, CANONICAL_CONTAINS)
        + field_score(&fetch, &query, FETCH_PREFIX, FETCH_CONTAINS)
        + field_score(&name, &query, NAME_PREFIX, NAME_CONTAINS)
}

/// Indices, movers and the current selection, one entry per company.
pub fn quick_pool<'a, I>(stocks: I) -> Vec<Stock>
where
    I: IntoIterator<Item = &'a Stock>,
{
    merge_unique_by_company(stocks)
}

/// Ranked local matches: score > 0, best first (stable), at most `limit`.
/// Queries shorter than `min_len` characters match nothing.
pub fn instant_matches(pool: &[Stock], query: &str, limit: usize, min_len: usize) -> Vec<Stock> {
    let query = query.trim();
    if query.chars().count() < min_len {
        return Vec::new();
    }

    let mut ranked: Vec<(u32, Stock)> = merge_unique_by_company(pool)
        .into_iter()
        .map(|stock| (score(&stock, query), stock))
        .filter(|(score, _)| *score > 0)
        .collect();

    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.into_iter().take(limit).map(|(_, stock)| stock).collect()
}
