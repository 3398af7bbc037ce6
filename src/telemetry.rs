use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install env-filtered tracing. Embedders that already own a subscriber
/// should skip this.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}

/// Install the Prometheus exporter and pre-register the core's metrics so
/// they appear before the first increment. Returns the handle whose
/// `render()` produces the scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    counter!("signals_seen_total").absolute(0);
    counter!("signals_admitted_total").absolute(0);
    counter!("whales_quarantined_total").absolute(0);
    counter!("stops_triggered_total").absolute(0);
    counter!("risk_alerts_total").absolute(0);
    counter!("risk_alerts_forwarded_total").absolute(0);

    gauge!("portfolio_mvar").set(0.0);
    gauge!("portfolio_exposure").set(0.0);
    gauge!("open_positions").set(0.0);

    Ok(handle)
}
