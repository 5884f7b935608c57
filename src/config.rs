//! Settings: built-in defaults, then `marketview.toml` (or `--config`), then
//! `MARKETVIEW__SECTION__KEY` environment variables, then command-line flags.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::market_data::types::Exchange;

#[derive(Parser, Debug)]
#[command(name = "marketview")]
#[command(about = "Live NSE/BSE market dashboard in the terminal", long_about = None)]
pub struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL of the quote service, e.g. http://localhost:3000/api/stocks
    #[arg(long)]
    pub base_url: Option<String>,

    /// Live snapshot stream URL (defaults to <base-url>/live)
    #[arg(long)]
    pub stream_url: Option<String>,

    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,

    /// tracing filter, e.g. "info" or "marketview_rs=debug"
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Select this stock on start-up
    #[arg(long)]
    pub stock: Option<String>,

    #[arg(long, default_value = "NSE")]
    pub exchange: Exchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Server-sent events
    #[default]
    Sse,
    /// Websocket
    Ws,
    /// No live stream, poll both exchanges once
    None,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedSettings {
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub stream_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,
    #[serde(default = "default_search_exchange")]
    pub exchange: Exchange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Prometheus listener, only used with the `metrics-exporter` feature.
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,
}

fn default_base_url() -> String {
    "http://localhost:3000/api/stocks".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_debounce_ms() -> u64 {
    120
}

fn default_cache_ttl_secs() -> u64 {
    45
}

fn default_result_limit() -> usize {
    8
}

fn default_min_query_len() -> usize {
    2
}

fn default_search_exchange() -> Exchange {
    Exchange::NSE
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_metrics_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            result_limit: default_result_limit(),
            min_query_len: default_min_query_len(),
            exchange: default_search_exchange(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { filter: default_log_filter(), metrics_addr: default_metrics_addr() }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl SearchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl FeedSettings {
    /// Explicit stream URL, else `<base_url>/live`. `None` when streaming is off.
    pub fn resolved_stream_url(&self, api: &ApiSettings) -> Option<String> {
        if self.transport == TransportKind::None {
            return None;
        }
        Some(
            self.stream_url
                .clone()
                .unwrap_or_else(|| format!("{}/live", api.base_url.trim_end_matches('/'))),
        )
    }
}

impl AppConfig {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();

        builder = match &cli.config {
            Some(path) => builder.add_source(config::File::from(path.as_path())),
            None => builder.add_source(config::File::with_name("marketview").required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("MARKETVIEW")
                .separator("__")
                .try_parsing(true),
        );

        let mut app: AppConfig = builder.build()?.try_deserialize()?;
        app.apply_cli(cli);
        Ok(app)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(url) = &cli.base_url {
            self.api.base_url = url.clone();
        }
        if let Some(url) = &cli.stream_url {
            self.feed.stream_url = Some(url.clone());
        }
        if let Some(kind) = cli.transport {
            self.feed.transport = kind;
        }
        if let Some(filter) = &cli.log_filter {
            self.log.filter = filter.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dashboard_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.search.debounce(), Duration::from_millis(120));
        assert_eq!(cfg.search.cache_ttl(), Duration::from_secs(45));
        assert_eq!(cfg.search.result_limit, 8);
        assert_eq!(cfg.search.min_query_len, 2);
        assert_eq!(cfg.search.exchange, Exchange::NSE);
        assert_eq!(cfg.feed.transport, TransportKind::Sse);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let cfg: AppConfig = serde_json::from_str(r#"{"search":{"debounce_ms":300}}"#).unwrap();
        assert_eq!(cfg.search.debounce_ms, 300);
        assert_eq!(cfg.search.cache_ttl_secs, 45);
        assert_eq!(cfg.api.timeout_secs, 10);
    }

    #[test]
    fn test_stream_url_resolution() {
        let api = ApiSettings { base_url: "http://quotes.local/api/stocks/".into(), ..ApiSettings::default() };
        let feed = FeedSettings::default();
        assert_eq!(feed.resolved_stream_url(&api).as_deref(), Some("http://quotes.local/api/stocks/live"));

        let feed = FeedSettings { transport: TransportKind::None, stream_url: Some("ws://x".into()) };
        assert_eq!(feed.resolved_stream_url(&api), None);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "marketview",
            "--base-url",
            "http://10.0.0.5/api/stocks",
            "--transport",
            "ws",
            "--exchange",
            "bse",
        ]);
        let mut cfg = AppConfig::default();
        cfg.apply_cli(&cli);
        assert_eq!(cfg.api.base_url, "http://10.0.0.5/api/stocks");
        assert_eq!(cfg.feed.transport, TransportKind::Ws);
        assert_eq!(cli.exchange, Exchange::BSE);
    }
}
