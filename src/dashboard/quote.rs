// Quote refresh on selection. Each selection takes a fresh generation token;
// a quote response is applied only while its token is still the latest.

use tracing::debug;

use crate::error::{MarketError, MarketResult};
use crate::market_data::normaliser::{canonical, with_exchange};
use crate::market_data::types::{Exchange, QuotePayload, Stock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteTicket {
    pub token: u64,
    pub canonical: String,
    pub fetch_symbol: String,
    pub exchange: Exchange,
}

#[derive(Debug, Default)]
pub struct QuoteController {
    latest: u64,
}

impl QuoteController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next token and build the provisional selection shown until the
    /// quote arrives: the same stock, re-keyed to `exchange`.
    pub fn begin(&mut self, stock: &Stock, exchange: Exchange) -> (QuoteTicket, Stock) {
        self.latest += 1;
        let ticket = QuoteTicket {
            token: self.latest,
            canonical: canonical(stock),
            fetch_symbol: with_exchange(stock, exchange),
            exchange,
        };

        let provisional = Stock {
            symbol: ticket.canonical.clone(),
            fetch_symbol: Some(ticket.fetch_symbol.clone()),
            ..stock.clone()
        };
        (ticket, provisional)
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }

    pub fn check(&self, ticket: &QuoteTicket) -> MarketResult<()> {
        if ticket.token == self.latest {
            Ok(())
        } else {
            debug!(token = ticket.token, latest = self.latest, symbol = %ticket.fetch_symbol, "Dropping superseded quote");
            metrics::counter!("marketview_quotes_superseded_total").increment(1);
            Err(MarketError::Superseded { token: ticket.token, latest: self.latest })
        }
    }
}

/// Merge a quote into the current selection. Fields the server sent win; the
/// symbols fall back to the ones the request was made with.
pub fn merge_quote(current: Option<&Stock>, ticket: &QuoteTicket, quote: QuotePayload) -> Stock {
    let base = current.cloned().unwrap_or_default();
    Stock {
        symbol: quote.symbol.unwrap_or_else(|| ticket.canonical.clone()),
        fetch_symbol: Some(quote.fetch_symbol.unwrap_or_else(|| ticket.fetch_symbol.clone())),
        name: quote.name.unwrap_or(base.name),
        price: quote.price.unwrap_or(base.price),
        change: quote.change.unwrap_or(base.change),
        change_percent: quote.change_percent.unwrap_or(base.change_percent),
        currency: quote.currency.or(base.currency),
    }
}
