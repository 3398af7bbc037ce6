//! Portfolio-level risk orchestration.
//!
//! Recomputes risk metrics on demand, evaluates each limit independently and
//! emits `RiskAlert`s. No enforcement happens here: closing or blocking
//! trades belongs to the portfolio/execution layer consuming the alerts.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::models::{Candle, PerformanceUpdate, PortfolioState, Side};
use crate::risk::metrics::{RiskMetrics, RiskMetricsConfig, RiskMetricsEngine};
use crate::risk::quarantine::{QuarantineConfig, QuarantineTracker, WhaleQuarantineStatus};
use crate::risk::stops::{StopCheck, StopConfig, StopLoss, TrailingStopTracker};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RiskLimits {
    /// Modified VaR ceiling as a fraction of NAV.
    pub max_mvar: f64,
    /// Portfolio correlation ceiling.
    pub max_correlation: f64,
    /// Per-category concentration ceiling as a fraction of NAV.
    pub max_category_concentration: f64,
    /// Total exposure ceiling as a fraction of NAV.
    pub max_total_exposure: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_mvar: 0.08,
            max_correlation: 0.4,
            max_category_concentration: 0.30,
            max_total_exposure: 0.95,
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ModifiedVar,
    Correlation,
    CategoryConcentration { category: String },
    TotalExposure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    ReduceExposure,
    Diversify,
    ReduceCategoryExposure,
    ClosePositions,
}

/// An append-only fact about a breached limit. Delivery belongs to the
/// external notifier; the core only produces the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAlert {
    pub severity: AlertSeverity,
    pub kind: AlertKind,
    pub message: String,
    /// The offending metric value.
    pub value: f64,
    /// The threshold it breached.
    pub threshold: f64,
    pub action: RecommendedAction,
    pub raised_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RiskManager
// ---------------------------------------------------------------------------

pub struct RiskManager {
    limits: RiskLimits,
    engine: RiskMetricsEngine,
    quarantine: QuarantineTracker,
    stops: TrailingStopTracker,
    alerts: Vec<RiskAlert>,
    last_metrics: Option<RiskMetrics>,
}

impl RiskManager {
    pub fn new(
        limits: RiskLimits,
        metrics_config: RiskMetricsConfig,
        quarantine_config: QuarantineConfig,
        stop_config: StopConfig,
    ) -> Self {
        Self {
            limits,
            engine: RiskMetricsEngine::new(metrics_config),
            quarantine: QuarantineTracker::new(quarantine_config),
            stops: TrailingStopTracker::new(stop_config),
            alerts: Vec::new(),
            last_metrics: None,
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Recompute the portfolio risk snapshot and evaluate every limit.
    /// Freshly raised alerts are appended to the log and returned.
    pub fn recompute(
        &mut self,
        returns: &[f64],
        portfolio: &PortfolioState,
        now: DateTime<Utc>,
    ) -> Result<(RiskMetrics, Vec<RiskAlert>), CoreError> {
        let metrics = self.engine.compute(returns, portfolio)?;
        let alerts = self.check_limits(&metrics, now);

        for alert in &alerts {
            tracing::warn!(
                severity = ?alert.severity,
                kind = ?alert.kind,
                value = alert.value,
                threshold = alert.threshold,
                "Risk limit breached"
            );
            counter!("risk_alerts_total").increment(1);
        }
        self.alerts.extend(alerts.iter().cloned());
        self.last_metrics = Some(metrics.clone());

        Ok((metrics, alerts))
    }

    /// Evaluate each limit independently against a snapshot. Pure: does not
    /// touch the alert log.
    pub fn check_limits(&self, metrics: &RiskMetrics, now: DateTime<Utc>) -> Vec<RiskAlert> {
        let mut alerts = Vec::new();

        if metrics.mvar > self.limits.max_mvar {
            alerts.push(RiskAlert {
                severity: AlertSeverity::Critical,
                kind: AlertKind::ModifiedVar,
                message: format!(
                    "modified VaR {:.4} exceeds limit {:.4} of NAV",
                    metrics.mvar, self.limits.max_mvar
                ),
                value: metrics.mvar,
                threshold: self.limits.max_mvar,
                action: RecommendedAction::ReduceExposure,
                raised_at: now,
            });
        }

        if metrics.portfolio_correlation > self.limits.max_correlation {
            alerts.push(RiskAlert {
                severity: AlertSeverity::Warning,
                kind: AlertKind::Correlation,
                message: format!(
                    "portfolio correlation {:.2} exceeds ceiling {:.2}",
                    metrics.portfolio_correlation, self.limits.max_correlation
                ),
                value: metrics.portfolio_correlation,
                threshold: self.limits.max_correlation,
                action: RecommendedAction::Diversify,
                raised_at: now,
            });
        }

        // One alert per offending category.
        let mut categories: Vec<_> = metrics.category_concentration.iter().collect();
        categories.sort_by(|a, b| a.0.cmp(b.0));
        for (category, concentration) in categories {
            if *concentration > self.limits.max_category_concentration {
                alerts.push(RiskAlert {
                    severity: AlertSeverity::Warning,
                    kind: AlertKind::CategoryConcentration {
                        category: category.clone(),
                    },
                    message: format!(
                        "{category} concentration {concentration:.2} exceeds ceiling {:.2}",
                        self.limits.max_category_concentration
                    ),
                    value: *concentration,
                    threshold: self.limits.max_category_concentration,
                    action: RecommendedAction::ReduceCategoryExposure,
                    raised_at: now,
                });
            }
        }

        if metrics.total_exposure > self.limits.max_total_exposure {
            alerts.push(RiskAlert {
                severity: AlertSeverity::Critical,
                kind: AlertKind::TotalExposure,
                message: format!(
                    "total exposure {:.2} exceeds ceiling {:.2} of NAV",
                    metrics.total_exposure, self.limits.max_total_exposure
                ),
                value: metrics.total_exposure,
                threshold: self.limits.max_total_exposure,
                action: RecommendedAction::ClosePositions,
                raised_at: now,
            });
        }

        alerts
    }

    pub fn alert_log(&self) -> &[RiskAlert] {
        &self.alerts
    }

    pub fn last_metrics(&self) -> Option<&RiskMetrics> {
        self.last_metrics.as_ref()
    }

    // -- quarantine ----------------------------------------------------------

    pub fn record_trader_performance(
        &mut self,
        trader: &str,
        update: &PerformanceUpdate,
        now: DateTime<Utc>,
    ) -> Option<WhaleQuarantineStatus> {
        self.quarantine
            .record_performance(trader, update, now)
            .cloned()
    }

    /// Queried by the trader-state provider to exclude quarantined traders
    /// from Stage 1. The read applies the lazy release transition.
    pub fn quarantine_status(
        &mut self,
        trader: &str,
        now: DateTime<Utc>,
    ) -> Option<WhaleQuarantineStatus> {
        self.quarantine.status(trader, now)
    }

    pub fn is_trader_quarantined(&mut self, trader: &str, now: DateTime<Utc>) -> bool {
        self.quarantine.is_quarantined(trader, now)
    }

    // -- stops ---------------------------------------------------------------

    pub fn arm_stop(
        &mut self,
        position_id: Uuid,
        side: Side,
        entry_price: rust_decimal::Decimal,
        candles: &[Candle],
        now: DateTime<Utc>,
    ) -> StopLoss {
        self.stops
            .open_position(position_id, side, entry_price, candles, now)
            .clone()
    }

    pub fn check_stop(
        &mut self,
        position_id: Uuid,
        price: rust_decimal::Decimal,
        now: DateTime<Utc>,
    ) -> Option<StopCheck> {
        self.stops.on_price(position_id, price, now)
    }

    pub fn release_stop(&mut self, position_id: Uuid) -> Option<StopLoss> {
        self.stops.close_position(position_id)
    }

    pub fn stop(&self, position_id: Uuid) -> Option<&StopLoss> {
        self.stops.stop(position_id)
    }
}

impl Default for RiskManager {
    fn default() -> Self {
        Self::new(
            RiskLimits::default(),
            RiskMetricsConfig::default(),
            QuarantineConfig::default(),
            StopConfig::default(),
        )
    }
}
