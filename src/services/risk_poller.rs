//! Periodic portfolio risk recomputation.
//!
//! The risk manager is polled on an interval, not per trade: each tick pulls
//! a fresh portfolio snapshot and return series, recomputes the metrics,
//! and forwards any raised alerts to the external notifier over a channel.
//! Alert emission is fire-and-forget; delivery and retry live downstream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, Duration};

use crate::providers::{PortfolioProvider, ReturnSeriesSource};
use crate::risk::{RiskAlert, RiskManager};

/// Run the risk poller loop. Recomputes portfolio risk every
/// `interval_secs`, checks limits, and forwards alerts. Exits when the
/// alert channel closes.
pub async fn run_risk_poller(
    manager: Arc<Mutex<RiskManager>>,
    portfolio_provider: Arc<dyn PortfolioProvider + Send + Sync>,
    returns_source: Arc<dyn ReturnSeriesSource + Send + Sync>,
    alert_tx: mpsc::Sender<RiskAlert>,
    pause_flag: Arc<AtomicBool>,
    interval_secs: u64,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    tracing::info!(interval_secs, "Risk poller started");

    loop {
        ticker.tick().await;

        if pause_flag.load(Ordering::Relaxed) {
            tracing::debug!("Risk poller paused");
            continue;
        }

        let Some(portfolio) = portfolio_provider.portfolio() else {
            tracing::warn!("Risk poller: no portfolio snapshot available");
            continue;
        };
        let returns = returns_source.portfolio_returns();

        let now = Utc::now();
        let (metrics, alerts) = {
            let mut manager = manager.lock().await;
            match manager.recompute(&returns, &portfolio, now) {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "Risk poller: recompute failed");
                    continue;
                }
            }
        };

        gauge!("portfolio_mvar").set(metrics.mvar);
        gauge!("portfolio_exposure").set(metrics.total_exposure);
        gauge!("open_positions").set(metrics.position_count as f64);

        if metrics.degraded {
            tracing::debug!(
                observations = metrics.observations,
                "Risk poller: insufficient return history, tail metrics zeroed"
            );
        }

        for alert in alerts {
            counter!("risk_alerts_forwarded_total").increment(1);
            if alert_tx.send(alert).await.is_err() {
                tracing::warn!("Alert channel closed; risk poller shutting down");
                return;
            }
        }
    }
}
