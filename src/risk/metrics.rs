//! Point-in-time portfolio risk metrics.
//!
//! Plain VaR assumes normal returns; prediction-market portfolios are not
//! normal, so the headline number is the Cornish-Fisher modified VaR, which
//! corrects the quantile for skewness and excess kurtosis. CVaR (expected
//! shortfall) reports the mean loss beyond the empirical tail threshold.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::PortfolioState;
use crate::pipeline::dec_to_f64;
use crate::risk::correlation_proxy;

/// Below this many return observations the tail metrics are reported as
/// zero with `degraded` set, rather than attempted.
pub const MIN_OBSERVATIONS: usize = 10;

#[derive(Debug, Clone)]
pub struct RiskMetricsConfig {
    /// Confidence level for VaR/mVaR/CVaR (0.95 = 95%).
    pub confidence: f64,
}

impl Default for RiskMetricsConfig {
    fn default() -> Self {
        Self { confidence: 0.95 }
    }
}

/// One immutable snapshot. Recomputed whole on demand, never patched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub var: f64,
    /// Cornish-Fisher modified VaR.
    pub mvar: f64,
    /// Expected shortfall beyond the tail threshold.
    pub cvar: f64,
    /// Average pairwise correlation proxy across open positions.
    pub portfolio_correlation: f64,
    /// Current drawdown of the portfolio equity curve.
    pub current_drawdown: f64,
    /// Total exposure as a fraction of NAV.
    pub total_exposure: f64,
    pub position_count: usize,
    /// Largest single position as a fraction of NAV.
    pub largest_position: f64,
    /// Category -> exposure fraction of NAV.
    pub category_concentration: HashMap<String, f64>,
    pub observations: usize,
    /// True when the return series was too short for the tail metrics.
    pub degraded: bool,
}

pub struct RiskMetricsEngine {
    config: RiskMetricsConfig,
}

impl RiskMetricsEngine {
    pub fn new(config: RiskMetricsConfig) -> Self {
        Self { config }
    }

    pub fn confidence(&self) -> f64 {
        self.config.confidence
    }

    /// Compute a full snapshot from the return series and position list.
    /// Deterministic: the same inputs always produce bit-identical output.
    pub fn compute(
        &self,
        returns: &[f64],
        portfolio: &PortfolioState,
    ) -> Result<RiskMetrics, CoreError> {
        let nav = dec_to_f64(portfolio.nav, "nav")?;
        if nav <= 0.0 {
            return Err(CoreError::invalid_input(
                "nav",
                format!("NAV must be positive, got {}", portfolio.nav),
            ));
        }

        let degraded = returns.len() < MIN_OBSERVATIONS;
        let (var, mvar, cvar) = if degraded {
            (0.0, 0.0, 0.0)
        } else {
            tail_metrics(returns, self.config.confidence)
        };

        let mut largest_position = 0.0_f64;
        for pos in &portfolio.positions {
            let fraction = dec_to_f64(pos.notional, "position notional")? / nav;
            largest_position = largest_position.max(fraction);
        }

        let mut category_concentration = HashMap::new();
        for (category, exposure) in &portfolio.category_exposure {
            category_concentration.insert(
                category.clone(),
                dec_to_f64(*exposure, "category_exposure")? / nav,
            );
        }

        Ok(RiskMetrics {
            var,
            mvar,
            cvar,
            portfolio_correlation: average_pairwise_correlation(portfolio),
            current_drawdown: drawdown_from_returns(returns),
            total_exposure: dec_to_f64(portfolio.total_exposure, "total_exposure")? / nav,
            position_count: portfolio.positions.len(),
            largest_position,
            category_concentration,
            observations: returns.len(),
            degraded,
        })
    }
}

impl Default for RiskMetricsEngine {
    fn default() -> Self {
        Self::new(RiskMetricsConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tail metrics
// ---------------------------------------------------------------------------

fn tail_metrics(returns: &[f64], confidence: f64) -> (f64, f64, f64) {
    let mean = mean(returns);
    let std = std_dev(returns, mean);
    let skew = skewness(returns, mean, std);
    let kurt = excess_kurtosis(returns, mean, std);

    let normal = Normal::new(0.0, 1.0).expect("unit normal is valid");
    let z = normal.inverse_cdf(1.0 - confidence);

    // Cornish-Fisher expansion of the quantile.
    let z_cf = z + (z * z - 1.0) * skew / 6.0 + (z * z * z - 3.0 * z) * kurt / 24.0
        - (2.0 * z * z * z - 5.0 * z) * skew * skew / 36.0;

    let var = -(mean + z * std);
    let mvar = -(mean + z_cf * std);
    let cvar = expected_shortfall(returns, confidence);

    (var, mvar, cvar)
}

fn expected_shortfall(returns: &[f64], confidence: f64) -> f64 {
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let idx = (((1.0 - confidence) * sorted.len() as f64).floor() as usize)
        .min(sorted.len() - 1);
    let threshold = sorted[idx];

    let tail: Vec<f64> = sorted.iter().copied().filter(|r| *r <= threshold).collect();
    if tail.is_empty() {
        threshold.abs()
    } else {
        -mean(&tail)
    }
}

// ---------------------------------------------------------------------------
// Moments
// ---------------------------------------------------------------------------

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    let n = values.len() as f64;
    (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
}

fn skewness(values: &[f64], mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        return 0.0;
    }
    let n = values.len() as f64;
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
    m3 / std.powi(3)
}

fn excess_kurtosis(values: &[f64], mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        return 0.0;
    }
    let n = values.len() as f64;
    let m4 = values.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / n;
    m4 / std.powi(4) - 3.0
}

// ---------------------------------------------------------------------------
// Portfolio-level estimates
// ---------------------------------------------------------------------------

fn average_pairwise_correlation(portfolio: &PortfolioState) -> f64 {
    let positions = &portfolio.positions;
    if positions.len() < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            sum += correlation_proxy(
                &positions[i].category,
                positions[i].resolution_date,
                &positions[j].category,
                positions[j].resolution_date,
            );
            pairs += 1;
        }
    }
    sum / pairs as f64
}

/// Peak-to-current drawdown of the compounded equity curve.
fn drawdown_from_returns(returns: &[f64]) -> f64 {
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    for r in returns {
        equity *= 1.0 + r;
        peak = peak.max(equity);
    }
    if peak <= 0.0 {
        return 1.0;
    }
    (1.0 - equity / peak).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OpenPosition, Side};
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn fat_tailed_series() -> Vec<f64> {
        vec![
            0.01, -0.02, 0.015, -0.30, 0.02, 0.012, -0.008, 0.018, 0.005, -0.011, 0.009, 0.014,
        ]
    }

    fn portfolio_with(positions: Vec<OpenPosition>) -> PortfolioState {
        let total: rust_decimal::Decimal = positions.iter().map(|p| p.notional).sum();
        let mut category_exposure = HashMap::new();
        for p in &positions {
            *category_exposure
                .entry(p.category.clone())
                .or_insert(rust_decimal::Decimal::ZERO) += p.notional;
        }
        PortfolioState {
            nav: dec!(100_000),
            total_exposure: total,
            category_exposure,
            positions,
        }
    }

    fn position(category: &str, notional: rust_decimal::Decimal, days_out: i64) -> OpenPosition {
        OpenPosition {
            id: Uuid::new_v4(),
            market_id: format!("mkt-{category}"),
            category: category.to_string(),
            side: Side::Buy,
            notional,
            entry_price: dec!(0.5),
            resolution_date: Utc::now() + Duration::days(days_out),
        }
    }

    #[test]
    fn test_degraded_below_ten_observations() {
        let engine = RiskMetricsEngine::default();
        let metrics = engine
            .compute(&[0.01, -0.02, 0.015], &portfolio_with(vec![]))
            .unwrap();
        assert!(metrics.degraded);
        assert_eq!(metrics.var, 0.0);
        assert_eq!(metrics.mvar, 0.0);
        assert_eq!(metrics.cvar, 0.0);
        assert_eq!(metrics.observations, 3);
    }

    #[test]
    fn test_fat_left_tail_inflates_mvar_over_var() {
        let engine = RiskMetricsEngine::default();
        let returns = fat_tailed_series();

        let m = mean(&returns);
        let s = std_dev(&returns, m);
        assert!(skewness(&returns, m, s) < 0.0, "series should be left-skewed");
        assert!(
            excess_kurtosis(&returns, m, s) > 0.0,
            "series should be leptokurtic"
        );

        let metrics = engine.compute(&returns, &portfolio_with(vec![])).unwrap();
        assert!(!metrics.degraded);
        assert!(
            metrics.mvar > metrics.var,
            "mVaR {} should exceed VaR {} for a fat left tail",
            metrics.mvar,
            metrics.var
        );
    }

    #[test]
    fn test_cvar_is_mean_tail_loss() {
        let engine = RiskMetricsEngine::default();
        let returns = fat_tailed_series();
        let metrics = engine.compute(&returns, &portfolio_with(vec![])).unwrap();
        // The single worst return dominates the 5% tail of 12 observations.
        assert!((metrics.cvar - 0.30).abs() < 1e-12);
    }

    #[test]
    fn test_recompute_is_bit_identical() {
        let engine = RiskMetricsEngine::default();
        let returns = fat_tailed_series();
        let portfolio = portfolio_with(vec![
            position("politics", dec!(10_000), 10),
            position("crypto", dec!(5_000), 40),
        ]);
        let a = engine.compute(&returns, &portfolio).unwrap();
        let b = engine.compute(&returns, &portfolio).unwrap();
        assert_eq!(a.var.to_bits(), b.var.to_bits());
        assert_eq!(a.mvar.to_bits(), b.mvar.to_bits());
        assert_eq!(a.cvar.to_bits(), b.cvar.to_bits());
    }

    #[test]
    fn test_exposure_and_concentration_fractions() {
        let engine = RiskMetricsEngine::default();
        let portfolio = portfolio_with(vec![
            position("politics", dec!(20_000), 10),
            position("politics", dec!(10_000), 20),
            position("sports", dec!(5_000), 30),
        ]);
        let metrics = engine.compute(&fat_tailed_series(), &portfolio).unwrap();
        assert!((metrics.total_exposure - 0.35).abs() < 1e-12);
        assert!((metrics.largest_position - 0.20).abs() < 1e-12);
        assert!(
            (metrics.category_concentration["politics"] - 0.30).abs() < 1e-12
        );
        assert_eq!(metrics.position_count, 3);
        assert!(metrics.portfolio_correlation > 0.0);
    }

    #[test]
    fn test_non_positive_nav_is_hard_error() {
        let engine = RiskMetricsEngine::default();
        let mut portfolio = portfolio_with(vec![]);
        portfolio.nav = dec!(0);
        assert!(engine.compute(&[], &portfolio).is_err());
    }

    #[test]
    fn test_drawdown_from_equity_curve() {
        // up 10%, down 20%: equity 0.88, peak 1.10, dd = 0.2
        let dd = drawdown_from_returns(&[0.10, -0.20]);
        assert!((dd - 0.2).abs() < 1e-12);
        assert_eq!(drawdown_from_returns(&[]), 0.0);
    }
}
