use std::collections::BTreeMap;

use ahash::AHashMap;
use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use tracing::{instrument, trace};

use crate::market_data::normaliser::{canonical, fetch_symbol};
use crate::market_data::types::{Exchange, ExchangeSnapshot, LiveMarketSnapshot, Stock};

pub const TOP_MOVERS: usize = 5;

/// Stable union keyed by exact fetch symbol; the first occurrence wins.
pub fn merge_unique_stocks<'a, I>(stocks: I) -> Vec<Stock>
where
    I: IntoIterator<Item = &'a Stock>,
{
    stocks
        .into_iter()
        .unique_by(|stock| fetch_symbol(stock))
        .cloned()
        .collect()
}

/// Union keyed by canonical symbol. A later duplicate replaces the kept entry only
/// when its absolute percent change is strictly larger; position stays that of the
/// first occurrence.
///
/// Preferring the bigger mover across exchanges is an inferred policy, not a
/// documented one.
pub fn merge_unique_by_company<'a, I>(stocks: I) -> Vec<Stock>
where
    I: IntoIterator<Item = &'a Stock>,
{
    let mut merged: Vec<Stock> = Vec::new();
    let mut position: AHashMap<String, usize> = AHashMap::new();

    for stock in stocks {
        let key = canonical(stock);
        match position.get(&key) {
            Some(&idx) => {
                if stock.change_percent.abs() > merged[idx].change_percent.abs() {
                    trace!(symbol = %key, "Replacing duplicate with larger mover");
                    merged[idx] = stock.clone();
                }
            }
            None => {
                position.insert(key, merged.len());
                merged.push(stock.clone());
            }
        }
    }
    merged
}

/// Top gainers: percent change >= 0, descending, at most `TOP_MOVERS`.
pub fn top_gainers(universe: &[Stock]) -> Vec<Stock> {
    let mut gainers: Vec<Stock> = universe
        .iter()
        .filter(|s| s.change_percent >= 0.0)
        .cloned()
        .collect();
    // sort_by is stable, ties keep input order
    gainers.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent));
    gainers.truncate(TOP_MOVERS);
    gainers
}

/// Top losers: percent change < 0, most negative first, at most `TOP_MOVERS`.
pub fn top_losers(universe: &[Stock]) -> Vec<Stock> {
    let mut losers: Vec<Stock> = universe
        .iter()
        .filter(|s| s.change_percent < 0.0)
        .cloned()
        .collect();
    losers.sort_by(|a, b| a.change_percent.total_cmp(&b.change_percent));
    losers.truncate(TOP_MOVERS);
    losers
}

/// Merge the two per-exchange snapshots into one unified view.
/// A missing side is treated as empty, never as an error.
pub fn combine(nse: Option<&ExchangeSnapshot>, bse: Option<&ExchangeSnapshot>) -> LiveMarketSnapshot {
    combine_at(nse, bse, Utc::now())
}

#[instrument(level = "debug", skip_all)]
pub fn combine_at(
    nse: Option<&ExchangeSnapshot>,
    bse: Option<&ExchangeSnapshot>,
    now: DateTime<Utc>,
) -> LiveMarketSnapshot {
    let empty = ExchangeSnapshot::default();
    let nse = nse.unwrap_or(&empty);
    let bse = bse.unwrap_or(&empty);

    let mut market_stats_by_exchange = BTreeMap::new();
    if let Some(stats) = nse.market_stats {
        market_stats_by_exchange.insert(Exchange::NSE, stats);
    }
    if let Some(stats) = bse.market_stats {
        market_stats_by_exchange.insert(Exchange::BSE, stats);
    }

    let indices = merge_unique_stocks(nse.indices.iter().chain(bse.indices.iter()));

    let momentum_universe = merge_unique_by_company(
        nse.gainers
            .iter()
            .chain(nse.losers.iter())
            .chain(bse.gainers.iter())
            .chain(bse.losers.iter()),
    );

    let gainers = top_gainers(&momentum_universe);
    let losers = top_losers(&momentum_universe);

    let timestamp = [&nse.timestamp, &bse.timestamp]
        .into_iter()
        .find(|ts| !ts.is_empty())
        .cloned()
        .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));

    trace!(
        indices = indices.len(),
        universe = momentum_universe.len(),
        gainers = gainers.len(),
        losers = losers.len(),
        "Combined exchange snapshots"
    );

    LiveMarketSnapshot {
        indices,
        gainers,
        losers,
        market_stats_by_exchange,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::types::MarketStats;
    use chrono::TimeZone;

    fn stock(fetch: &str, pct: f64) -> Stock {
        let base = fetch.split('.').next().unwrap_or(fetch);
        Stock {
            symbol: base.to_string(),
            fetch_symbol: Some(fetch.to_string()),
            name: base.to_string(),
            change_percent: pct,
            ..Stock::default()
        }
    }

    fn snapshot(indices: Vec<Stock>, gainers: Vec<Stock>, losers: Vec<Stock>, ts: &str) -> ExchangeSnapshot {
        ExchangeSnapshot {
            exchange: None,
            indices,
            gainers,
            losers,
            market_stats: None,
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn test_missing_inputs_are_empty() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap();
        let combined = combine_at(None, None, now);
        assert!(combined.indices.is_empty());
        assert!(combined.gainers.is_empty());
        assert!(combined.losers.is_empty());
        assert!(combined.market_stats_by_exchange.is_empty());
        assert_eq!(combined.timestamp, "2024-03-01T09:15:00.000Z");
    }

    #[test]
    fn test_indices_first_occurrence_wins() {
        let mut nifty_nse = stock("^NSEI", 0.5);
        nifty_nse.name = "from nse".into();
        let mut nifty_bse = stock("^NSEI", 0.7);
        nifty_bse.name = "from bse".into();
        let nse = snapshot(vec![nifty_nse, stock("^NSEBANK", 0.1)], vec![], vec![], "");
        let bse = snapshot(vec![nifty_bse, stock("^BSESN", 0.2)], vec![], vec![], "");

        let combined = combine(Some(&nse), Some(&bse));
        let symbols: Vec<_> = combined.indices.iter().map(fetch_symbol).collect();
        assert_eq!(symbols, vec!["^NSEI", "^NSEBANK", "^BSESN"]);
        assert_eq!(combined.indices[0].name, "from nse");
    }

    #[test]
    fn test_duplicate_keeps_larger_magnitude() {
        let nse = snapshot(vec![], vec![stock("TCS.NS", 5.0)], vec![], "");
        let bse = snapshot(vec![], vec![], vec![stock("TCS.BO", -8.0)], "");

        let combined = combine(Some(&nse), Some(&bse));
        assert!(combined.gainers.is_empty());
        assert_eq!(combined.losers.len(), 1);
        assert_eq!(combined.losers[0].fetch_symbol.as_deref(), Some("TCS.BO"));
    }

    #[test]
    fn test_duplicate_equal_magnitude_keeps_first() {
        let nse = snapshot(vec![], vec![stock("INFY.NS", 3.0)], vec![], "");
        let bse = snapshot(vec![], vec![stock("INFY.BO", 3.0)], vec![], "");
        let combined = combine(Some(&nse), Some(&bse));
        assert_eq!(combined.gainers.len(), 1);
        assert_eq!(combined.gainers[0].fetch_symbol.as_deref(), Some("INFY.NS"));
    }

    #[test]
    fn test_movers_sorted_and_truncated() {
        let gainers: Vec<Stock> = (0..7).map(|i| stock(&format!("G{}.NS", i), i as f64)).collect();
        let losers: Vec<Stock> = (1..8).map(|i| stock(&format!("L{}.BO", i), -(i as f64))).collect();
        let nse = snapshot(vec![], gainers, vec![], "");
        let bse = snapshot(vec![], vec![], losers, "");

        let combined = combine(Some(&nse), Some(&bse));
        let g: Vec<f64> = combined.gainers.iter().map(|s| s.change_percent).collect();
        let l: Vec<f64> = combined.losers.iter().map(|s| s.change_percent).collect();
        assert_eq!(g, vec![6.0, 5.0, 4.0, 3.0, 2.0]);
        assert_eq!(l, vec![-7.0, -6.0, -5.0, -4.0, -3.0]);
    }

    #[test]
    fn test_zero_change_is_a_gainer_and_sort_is_stable() {
        let nse = snapshot(vec![], vec![stock("A.NS", 0.0), stock("B.NS", 1.0), stock("C.NS", 0.0)], vec![], "");
        let combined = combine(Some(&nse), None);
        let order: Vec<_> = combined.gainers.iter().map(|s| s.symbol.clone()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_stats_pass_through_and_timestamp_preference() {
        let stats = MarketStats { today_high: 22500.5, today_low: 22100.25, advances: 1200, declines: 800, unchanged: 50 };
        let mut nse = snapshot(vec![], vec![], vec![], "");
        let mut bse = snapshot(vec![], vec![], vec![], "2024-03-01T10:00:00Z");
        bse.market_stats = Some(stats);

        let combined = combine(Some(&nse), Some(&bse));
        assert_eq!(combined.market_stats_by_exchange.get(&Exchange::BSE), Some(&stats));
        assert!(!combined.market_stats_by_exchange.contains_key(&Exchange::NSE));
        assert_eq!(combined.timestamp, "2024-03-01T10:00:00Z");

        nse.timestamp = "2024-03-01T09:59:00Z".into();
        let combined = combine(Some(&nse), Some(&bse));
        assert_eq!(combined.timestamp, "2024-03-01T09:59:00Z");
    }
}
