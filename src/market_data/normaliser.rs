// Canonical / exchange-qualified symbol derivation.
// Fetch symbols are always uppercase; canonical symbols never carry .NS/.BO.

use crate::market_data::types::{Exchange, Stock};

const EXCHANGE_SUFFIXES: [&str; 2] = [".NS", ".BO"];

// Strip a trailing .NS/.BO from an already uppercased symbol
fn strip_exchange_suffix(upper: &str) -> Option<&str> {
    EXCHANGE_SUFFIXES
        .iter()
        .find_map(|suffix| upper.strip_suffix(*suffix))
}

fn is_index_or_derivative(upper: &str) -> bool {
    upper.starts_with('^') || upper.contains('=')
}

/// Exchange-qualified symbol if present, else the raw symbol, uppercased.
pub fn fetch_symbol(stock: &Stock) -> String {
    stock
        .fetch_symbol
        .as_deref()
        .unwrap_or(&stock.symbol)
        .to_uppercase()
}

/// Exchange-agnostic identifier: fetch symbol minus its .NS/.BO suffix,
/// else the raw symbol uppercased.
pub fn canonical(stock: &Stock) -> String {
    let fetch = fetch_symbol(stock);
    match strip_exchange_suffix(&fetch) {
        Some(base) => base.to_string(),
        None => stock.symbol.to_uppercase(),
    }
}

pub fn exchange_of(stock: &Stock) -> Exchange {
    exchange_of_symbol(&fetch_symbol(stock))
}

pub fn exchange_of_symbol(symbol: &str) -> Exchange {
    if symbol.to_uppercase().ends_with(".BO") {
        Exchange::BSE
    } else {
        Exchange::NSE
    }
}

/// Indices (`^NSEI`) and derivative/currency pairs (`USDINR=X`) trade in one place only.
pub fn supports_toggle(stock: &Stock) -> bool {
    !is_index_or_derivative(&fetch_symbol(stock))
}

/// Rewrite the exchange suffix to match `exchange`.
/// Index/derivative forms and symbols with an unrelated suffix pass through unchanged.
pub fn with_exchange(stock: &Stock, exchange: Exchange) -> String {
    with_exchange_symbol(&fetch_symbol(stock), exchange)
}

pub fn with_exchange_symbol(symbol: &str, exchange: Exchange) -> String {
    let upper = symbol.to_uppercase();

    if let Some(base) = strip_exchange_suffix(&upper) {
        return format!("{}.{}", base, exchange.suffix());
    }

    if is_index_or_derivative(&upper) || upper.contains('.') {
        return upper;
    }

    format!("{}.{}", upper, exchange.suffix())
}

/// Placeholder stock for a symbol we only know by name (deep links, unknown tickers).
pub fn seed_stock(symbol: &str) -> Stock {
    let qualified = symbol.trim().to_uppercase();
    let base = strip_exchange_suffix(&qualified)
        .unwrap_or(&qualified)
        .to_string();

    Stock {
        symbol: base.clone(),
        fetch_symbol: Some(qualified),
        name: base,
        price: 0.0,
        change: 0.0,
        change_percent: 0.0,
        currency: Some("INR".to_string()),
    }
}
