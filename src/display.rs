// Text rendering for the terminal client: prices, signed changes, and the view.

use std::fmt::Write as _;

use chrono::Local;

use crate::dashboard::chart::PreparedChart;
use crate::dashboard::DashboardView;
use crate::market_data::normaliser::{canonical, fetch_symbol};
use crate::market_data::types::{MarketStats, Stock};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

// "1234567" -> "12,34,567"
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (left, right) = rest.split_at(rest.len() - 2);
        groups.push(right);
        rest = left;
    }
    groups.push(rest);
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}

// "1234567" -> "1,234,567"
fn group_western(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Currency amount with two decimals. INR uses lakh/crore grouping.
pub fn format_price(price: f64, currency: Option<&str>) -> String {
    let fixed = format!("{:.2}", price.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if price < 0.0 && fixed != "0.00" { "-" } else { "" };

    match currency.unwrap_or("INR").to_ascii_uppercase().as_str() {
        "INR" => format!("{}₹{}.{}", sign, group_indian(int_part), frac),
        "USD" => format!("{}${}.{}", sign, group_western(int_part), frac),
        code => format!("{}{} {}.{}", sign, code, group_western(int_part), frac),
    }
}

pub fn format_change(change: f64) -> String {
    if change >= 0.0 {
        format!("+{:.2}", change)
    } else {
        format!("{:.2}", change)
    }
}

pub fn format_percent(pct: f64) -> String {
    format!("{}%", format_change(pct))
}

pub fn render_stock(stock: &Stock) -> String {
    format!(
        "{:<12} {:<28} {:>16} {:>10} {:>9}",
        canonical(stock),
        truncate(&stock.name, 28),
        format_price(stock.price, stock.currency.as_deref()),
        format_change(stock.change),
        format_percent(stock.change_percent),
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

pub fn render_list(title: &str, stocks: &[Stock]) -> String {
    let mut out = format!("== {} ==\n", title);
    if stocks.is_empty() {
        out.push_str("  (none)\n");
    }
    for (i, stock) in stocks.iter().enumerate() {
        let _ = writeln!(out, "{:>2}. {}", i + 1, render_stock(stock));
    }
    out
}

pub fn render_stats(view: &DashboardView) -> String {
    let MarketStats { today_high, today_low, advances, declines, unchanged } = view.stats;
    format!(
        "== Market stats ({}) ==\n  High {}  Low {}\n  Advances {}  Declines {}  Unchanged {}\n",
        view.stats_exchange,
        format_price(today_high, None),
        format_price(today_low, None),
        advances,
        declines,
        unchanged,
    )
}

pub const CHART_PLACEHOLDER: &str = "Loading chart…";

/// Sparkline of the series. An empty series always shows the loading placeholder,
/// even after a failed fetch; `updating` only adds a marker over existing data.
pub fn render_chart(chart: Option<&PreparedChart>, updating: bool) -> String {
    let Some(chart) = chart else {
        return format!("{}\n", CHART_PLACEHOLDER);
    };

    let (lo, hi) = chart
        .prices
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
    let span = hi - lo;
    let spark: String = chart
        .prices
        .iter()
        .map(|p| {
            if span <= f64::EPSILON {
                SPARK[SPARK.len() / 2]
            } else {
                let idx = ((p - lo) / span * (SPARK.len() - 1) as f64).round() as usize;
                SPARK[idx.min(SPARK.len() - 1)]
            }
        })
        .collect();

    let first = chart.labels.first().map(String::as_str).unwrap_or("");
    let last = chart.labels.last().map(String::as_str).unwrap_or("");
    let marker = if updating { "  Updating…" } else { "" };
    format!(
        "{}{}\n{} .. {}  ({} points, low {:.2}, high {:.2})\n",
        spark,
        marker,
        first,
        last,
        chart.prices.len(),
        lo,
        hi
    )
}

pub fn render_selected(view: &DashboardView) -> String {
    match &view.selected {
        Some(stock) => format!(
            "== {} ({}) ==\n  {}\n  {}  {}  {}\n  period {}  updated {}\n",
            stock.name,
            fetch_symbol(stock),
            canonical(stock),
            format_price(stock.price, stock.currency.as_deref()),
            format_change(stock.change),
            format_percent(stock.change_percent),
            view.period,
            view.last_updated.with_timezone(&Local).format("%H:%M:%S"),
        ),
        None => "No stock selected\n".to_string(),
    }
}

pub fn render_search(view: &DashboardView) -> String {
    let search = &view.search;
    let mut out = String::new();
    if search.searching {
        let _ = writeln!(out, "Searching \"{}\"…", search.query.trim());
    }
    if let Some(error) = &search.error {
        let _ = writeln!(out, "{}", error);
    }
    if !search.results.is_empty() {
        out.push_str(&render_list(&format!("Results for \"{}\"", search.query.trim()), &search.results));
    }
    out
}

pub fn render_view(view: &DashboardView) -> String {
    if view.loading {
        return format!("Loading market data… (feed {:?})\n", view.feed_state);
    }
    let mut out = String::new();
    out.push_str(&render_selected(view));
    out.push_str(&render_chart(view.chart.as_ref(), view.chart_updating));
    out.push_str(&render_list("Indices", &view.indices));
    out.push_str(&render_list("Top gainers", &view.gainers));
    out.push_str(&render_list("Top losers", &view.losers));
    out.push_str(&render_stats(view));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indian_grouping() {
        assert_eq!(format_price(123456.78, Some("INR")), "₹1,23,456.78");
        assert_eq!(format_price(12345678.0, None), "₹1,23,45,678.00");
        assert_eq!(format_price(999.5, Some("inr")), "₹999.50");
        assert_eq!(format_price(-1000.0, Some("INR")), "-₹1,000.00");
    }

    #[test]
    fn test_other_currencies() {
        assert_eq!(format_price(1234567.891, Some("USD")), "$1,234,567.89");
        assert_eq!(format_price(12.0, Some("EUR")), "EUR 12.00");
    }

    #[test]
    fn test_signed_changes() {
        assert_eq!(format_change(1.25), "+1.25");
        assert_eq!(format_change(0.0), "+0.00");
        assert_eq!(format_percent(-0.4), "-0.40%");
    }

    #[test]
    fn test_chart_placeholder() {
        assert_eq!(render_chart(None, true), "Loading chart…\n");
        // a failed history fetch leaves no series and nothing updating
        assert_eq!(render_chart(None, false), "Loading chart…\n");
        let chart = PreparedChart {
            labels: vec!["09:15".into(), "15:30".into()],
            prices: vec![10.0, 20.0],
            axis: crate::market_data::types::AxisLabel::Time,
        };
        let text = render_chart(Some(&chart), false);
        assert!(text.starts_with("▁█"));
        assert!(text.contains("09:15 .. 15:30"));
        assert!(!text.contains("Updating"));
        assert!(render_chart(Some(&chart), true).starts_with("▁█  Updating…\n"));
    }
}
