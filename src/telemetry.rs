use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

// RUST_LOG overrides `log.filter`. Logs go to stderr so they stay out of the REPL's stdout.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn describe_dashboard_metrics() {
    metrics::describe_counter!("marketview_snapshots_applied_total", "Live or polled snapshots applied to the view");
    metrics::describe_counter!("marketview_quotes_superseded_total", "Quote replies dropped because a newer selection won");
    metrics::describe_counter!("marketview_search_requests_total", "Remote symbol searches dispatched");
    metrics::describe_counter!("marketview_search_cache_hits_total", "Searches answered from a fresh cache entry");
}

#[cfg(feature = "metrics-exporter")]
pub fn init_metrics(addr: SocketAddr) {
    use metrics_exporter_prometheus::PrometheusBuilder;

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::error!(error = %e, %addr, "Prometheus exporter not installed");
        return;
    }
    describe_dashboard_metrics();
    metrics::gauge!("marketview_up").set(1.0);
    tracing::info!("Metrics at http://{}/metrics", addr);
}

// Without an exporter the macros hit the no-op recorder.
#[cfg(not(feature = "metrics-exporter"))]
pub fn init_metrics(addr: SocketAddr) {
    tracing::debug!(%addr, "metrics exporter disabled at build time");
    describe_dashboard_metrics();
}
