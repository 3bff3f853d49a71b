use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pre-register counters so they appear even before the first increment.
    counter!("decisions_total").absolute(0);
    counter!("orders_filled").absolute(0);
    counter!("orders_rejected").absolute(0);
    counter!("orders_skipped").absolute(0);
    counter!("trades_recorded").absolute(0);
    counter!("snapshots_recorded").absolute(0);

    // Pre-register gauges at zero.
    gauge!("open_positions").set(0.0);
    gauge!("portfolio_total_value").set(0.0);
    gauge!("cash_balance").set(0.0);

    // Histogram is lazily created on first record; force creation.
    histogram!("tick_duration_seconds").record(0.0);

    handle
}
