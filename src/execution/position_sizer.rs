//! Adaptive Kelly position sizing.
//!
//! Base Kelly fraction `f = (p*b - q) / b`, shrunk by half-Kelly and four
//! independent multiplicative factors (confidence, volatility, correlation,
//! drawdown), then hard-capped as a fraction of NAV.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::execution::volatility::VolatilityRegistry;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SizerConfig {
    /// Shrink base Kelly by 0.5 before the adjustment factors.
    pub half_kelly: bool,
    /// Hard cap as a fraction of NAV.
    pub max_fraction: f64,
    /// Below this adjusted fraction the position is not worth opening.
    pub min_fraction: f64,
    /// EWMA decay for the per-market volatility estimators.
    pub ewma_lambda: f64,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            half_kelly: true,
            max_fraction: 0.08,
            min_fraction: 0.01,
            ewma_lambda: crate::execution::volatility::DEFAULT_EWMA_LAMBDA,
        }
    }
}

// ---------------------------------------------------------------------------
// Request / result
// ---------------------------------------------------------------------------

/// Everything the sizer needs for one decision, supplied by the caller.
#[derive(Debug, Clone)]
pub struct SizeRequest<'a> {
    pub win_probability: f64,
    pub payoff_ratio: f64,
    /// Whale quality score, 0..100.
    pub quality_score: f64,
    pub market_id: &'a str,
    pub nav: Decimal,
    /// Current portfolio drawdown fraction.
    pub drawdown: f64,
    /// Estimated correlation with the existing portfolio.
    pub correlation: f64,
    /// Fresh returns for the market's volatility estimator (may be empty).
    pub new_returns: &'a [f64],
}

/// Why the sizer returned the size it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingVerdict {
    Sized,
    /// Base Kelly was non-positive: no edge, nothing further computed.
    NoEdge,
    /// Adjusted fraction fell below the minimum viable fraction.
    PositionTooSmall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSizeResult {
    /// Fraction of NAV actually risked (zero unless `Sized`).
    pub fraction: f64,
    /// Dollar equivalent of `fraction`.
    pub dollar_size: Decimal,
    /// Unadjusted base Kelly fraction.
    pub base_kelly: f64,
    /// Fully adjusted fraction. Reported even for `PositionTooSmall`, for
    /// diagnostics.
    pub adjusted_fraction: f64,
    pub confidence_factor: f64,
    pub volatility_factor: f64,
    pub correlation_factor: f64,
    pub drawdown_factor: f64,
    /// The hard cap bound the result.
    pub capped: bool,
    pub verdict: SizingVerdict,
    pub explanation: String,
}

impl PositionSizeResult {
    fn zero(base_kelly: f64, verdict: SizingVerdict, explanation: String) -> Self {
        Self {
            fraction: 0.0,
            dollar_size: Decimal::ZERO,
            base_kelly,
            adjusted_fraction: 0.0,
            confidence_factor: 0.0,
            volatility_factor: 0.0,
            correlation_factor: 0.0,
            drawdown_factor: 0.0,
            capped: false,
            verdict,
            explanation,
        }
    }
}

// ---------------------------------------------------------------------------
// Sizer
// ---------------------------------------------------------------------------

pub struct AdaptiveKellySizer {
    config: SizerConfig,
    volatility: VolatilityRegistry,
}

impl AdaptiveKellySizer {
    pub fn new(config: SizerConfig) -> Self {
        let lambda = config.ewma_lambda;
        Self {
            config,
            volatility: VolatilityRegistry::new(lambda),
        }
    }

    pub fn config(&self) -> &SizerConfig {
        &self.config
    }

    /// Read-only view of the per-market volatility state.
    pub fn volatility(&self) -> &VolatilityRegistry {
        &self.volatility
    }

    pub fn volatility_mut(&mut self) -> &mut VolatilityRegistry {
        &mut self.volatility
    }

    /// Convert a surviving signal into a bounded position size.
    ///
    /// Never fails for valid numeric input: no-edge and too-small outcomes
    /// are zero-size results tagged with a verdict. Hard errors are reserved
    /// for negative NAV and non-finite numerics.
    pub fn size(&mut self, req: &SizeRequest<'_>) -> Result<PositionSizeResult, CoreError> {
        validate_request(req)?;

        let p = req.win_probability;
        let b = req.payoff_ratio;

        // Step 1: base Kelly. Early exits also guard the division.
        if p <= 0.0 || p >= 1.0 || b <= 0.0 {
            return Ok(PositionSizeResult::zero(
                0.0,
                SizingVerdict::NoEdge,
                format!("no edge: p={p:.4}, b={b:.4}"),
            ));
        }
        let base_kelly = (p * b - (1.0 - p)) / b;
        if base_kelly <= 0.0 {
            return Ok(PositionSizeResult::zero(
                base_kelly,
                SizingVerdict::NoEdge,
                format!("no edge: base kelly {base_kelly:.4} <= 0"),
            ));
        }

        // Steps 2-5: adjustment factors, each clamped to its documented range.
        let confidence_factor = confidence_factor(req.quality_score);

        let estimator = self.volatility.estimator_mut(req.market_id);
        estimator.update(req.new_returns);
        let sigma = estimator.volatility();
        let volatility_factor = volatility_factor(sigma);

        let correlation_factor = correlation_factor(req.correlation);
        let drawdown_factor = drawdown_factor(req.drawdown);

        // Steps 6-7: half-Kelly, then the multiplicative stack.
        let kelly_multiplier = if self.config.half_kelly { 0.5 } else { 1.0 };
        let mut adjusted = base_kelly
            * kelly_multiplier
            * confidence_factor
            * volatility_factor
            * correlation_factor
            * drawdown_factor;

        // Step 8: hard cap.
        let capped = adjusted > self.config.max_fraction;
        if capped {
            adjusted = self.config.max_fraction;
        }

        // Step 9: minimum viable fraction. The adjusted fraction is still
        // reported for diagnostics.
        if adjusted < self.config.min_fraction {
            return Ok(PositionSizeResult {
                fraction: 0.0,
                dollar_size: Decimal::ZERO,
                base_kelly,
                adjusted_fraction: adjusted,
                confidence_factor,
                volatility_factor,
                correlation_factor,
                drawdown_factor,
                capped,
                verdict: SizingVerdict::PositionTooSmall,
                explanation: format!(
                    "position too small: adjusted fraction {adjusted:.4} below minimum {:.4}",
                    self.config.min_fraction
                ),
            });
        }

        // Step 10: dollar size.
        let fraction_dec = Decimal::from_f64(adjusted).ok_or_else(|| {
            CoreError::invalid_input("fraction", format!("not representable: {adjusted}"))
        })?;
        let dollar_size = req.nav * fraction_dec;

        let explanation = format!(
            "kelly {base_kelly:.4} x {kelly_multiplier:.1} x conf {confidence_factor:.3} \
             x vol {volatility_factor:.3} x corr {correlation_factor:.3} \
             x dd {drawdown_factor:.3} = {adjusted:.4} of NAV (${dollar_size:.2}){}",
            if capped { ", capped" } else { "" }
        );

        tracing::debug!(
            market = %req.market_id,
            base_kelly = base_kelly,
            adjusted = adjusted,
            sigma = sigma,
            capped = capped,
            "Position sized"
        );

        Ok(PositionSizeResult {
            fraction: adjusted,
            dollar_size,
            base_kelly,
            adjusted_fraction: adjusted,
            confidence_factor,
            volatility_factor,
            correlation_factor,
            drawdown_factor,
            capped,
            verdict: SizingVerdict::Sized,
            explanation,
        })
    }
}

impl Default for AdaptiveKellySizer {
    fn default() -> Self {
        Self::new(SizerConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Adjustment factors
// ---------------------------------------------------------------------------

/// `0.4 + 0.6 * quality/100`, quality clamped to [0, 100]. Range [0.4, 1.0].
fn confidence_factor(quality: f64) -> f64 {
    let quality = quality.clamp(0.0, 100.0);
    0.4 + 0.6 * quality / 100.0
}

/// `1 / (1 + 5*sigma)`, clamped to [0.5, 1.2].
fn volatility_factor(sigma: f64) -> f64 {
    (1.0 / (1.0 + 5.0 * sigma)).clamp(0.5, 1.2)
}

/// `1 - rho^2`, floored at 0.3.
fn correlation_factor(rho: f64) -> f64 {
    (1.0 - rho * rho).clamp(0.3, 1.0)
}

/// `1 - 3*dd`, floored at 0.2.
fn drawdown_factor(dd: f64) -> f64 {
    (1.0 - 3.0 * dd).clamp(0.2, 1.0)
}

fn validate_request(req: &SizeRequest<'_>) -> Result<(), CoreError> {
    if req.nav < Decimal::ZERO {
        return Err(CoreError::invalid_input(
            "nav",
            format!("NAV must be non-negative, got {}", req.nav),
        ));
    }
    for (field, value) in [
        ("win_probability", req.win_probability),
        ("payoff_ratio", req.payoff_ratio),
        ("quality_score", req.quality_score),
        ("drawdown", req.drawdown),
        ("correlation", req.correlation),
    ] {
        if !value.is_finite() {
            return Err(CoreError::invalid_input(
                field,
                format!("must be finite, got {value}"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sized(sizer: &mut AdaptiveKellySizer, req: &SizeRequest<'_>) -> PositionSizeResult {
        sizer.size(req).expect("sizing should not hard-fail")
    }

    fn base_request<'a>() -> SizeRequest<'a> {
        SizeRequest {
            win_probability: 0.65,
            payoff_ratio: 0.67,
            quality_score: 90.0,
            market_id: "mkt-1",
            nav: dec!(100_000),
            drawdown: 0.0,
            correlation: 0.0,
            new_returns: &[],
        }
    }

    #[test]
    fn test_factor_ranges_are_total() {
        assert_eq!(confidence_factor(-50.0), 0.4);
        assert_eq!(confidence_factor(500.0), 1.0);
        assert_eq!(volatility_factor(0.0), 1.0);
        assert_eq!(volatility_factor(10.0), 0.5);
        assert_eq!(correlation_factor(0.0), 1.0);
        assert_eq!(correlation_factor(5.0), 0.3);
        assert_eq!(drawdown_factor(-1.0), 1.0);
        assert_eq!(drawdown_factor(0.9), 0.2);
    }

    #[test]
    fn test_no_edge_returns_zero_without_adjustment() {
        let mut sizer = AdaptiveKellySizer::default();
        let mut req = base_request();
        req.win_probability = 0.40;
        req.payoff_ratio = 1.0;
        let result = sized(&mut sizer, &req);
        assert_eq!(result.verdict, SizingVerdict::NoEdge);
        assert_eq!(result.fraction, 0.0);
        assert_eq!(result.dollar_size, Decimal::ZERO);
        // negative base kelly reported as-is
        assert!(result.base_kelly < 0.0);
    }

    #[test]
    fn test_degenerate_probabilities_are_no_edge() {
        let mut sizer = AdaptiveKellySizer::default();
        for (p, b) in [(0.0, 1.0), (1.0, 1.0), (-0.5, 1.0), (0.6, 0.0), (0.6, -1.0)] {
            let mut req = base_request();
            req.win_probability = p;
            req.payoff_ratio = b;
            let result = sized(&mut sizer, &req);
            assert_eq!(result.verdict, SizingVerdict::NoEdge, "p={p} b={b}");
        }
    }

    #[test]
    fn test_adjusted_fraction_never_exceeds_cap() {
        let mut sizer = AdaptiveKellySizer::default();
        // Strong edge: base kelly = (0.9*2 - 0.1) / 2 = 0.85
        let mut req = base_request();
        req.win_probability = 0.9;
        req.payoff_ratio = 2.0;
        req.quality_score = 100.0;
        let result = sized(&mut sizer, &req);
        assert!(result.capped);
        assert_eq!(result.fraction, 0.08);
        assert_eq!(result.dollar_size, dec!(8_000.00));
    }

    #[test]
    fn test_concrete_scenario_factors_multiply() {
        // p=0.65, b=0.67, quality=90, sigma=0.015, half-Kelly, no corr/dd.
        let mut sizer = AdaptiveKellySizer::default();
        sizer.volatility_mut().insert(
            "mkt-1",
            crate::execution::volatility::VolatilityEstimator::from_variance(
                0.94,
                0.015 * 0.015,
            ),
        );
        let req = base_request();
        let result = sized(&mut sizer, &req);

        let base: f64 = (0.65 * 0.67 - 0.35) / 0.67;
        let k_vol = 1.0 / (1.0 + 5.0 * 0.015);
        let expected = (base * 0.5 * 0.94 * k_vol).min(0.08);

        assert!((result.base_kelly - base).abs() < 1e-12);
        assert!((result.confidence_factor - 0.94).abs() < 1e-12);
        assert!((result.volatility_factor - k_vol).abs() < 1e-12);
        assert_eq!(result.correlation_factor, 1.0);
        assert_eq!(result.drawdown_factor, 1.0);
        assert!((result.fraction - expected).abs() < 1e-12);
        assert!(result.fraction <= 0.08);
    }

    #[test]
    fn test_below_minimum_reports_diagnostic_fraction() {
        let mut sizer = AdaptiveKellySizer::default();
        // Thin edge: base kelly = (0.52*1 - 0.48) / 1 = 0.04; halved and
        // drawdown-shrunk it lands under the 1% floor.
        let mut req = base_request();
        req.win_probability = 0.52;
        req.payoff_ratio = 1.0;
        req.quality_score = 50.0;
        req.drawdown = 0.20;
        let result = sized(&mut sizer, &req);
        assert_eq!(result.verdict, SizingVerdict::PositionTooSmall);
        assert_eq!(result.fraction, 0.0);
        assert_eq!(result.dollar_size, Decimal::ZERO);
        assert!(result.adjusted_fraction > 0.0);
        assert!(result.adjusted_fraction < 0.01);
    }

    #[test]
    fn test_negative_nav_is_hard_error() {
        let mut sizer = AdaptiveKellySizer::default();
        let mut req = base_request();
        req.nav = dec!(-1);
        assert!(sizer.size(&req).is_err());
    }

    #[test]
    fn test_non_finite_input_is_hard_error() {
        let mut sizer = AdaptiveKellySizer::default();
        let mut req = base_request();
        req.correlation = f64::NAN;
        assert!(sizer.size(&req).is_err());
    }

    #[test]
    fn test_sizing_updates_market_volatility() {
        let mut sizer = AdaptiveKellySizer::default();
        let mut req = base_request();
        req.new_returns = &[0.01, -0.02, 0.015];
        let _ = sized(&mut sizer, &req);
        assert!(sizer.volatility().volatility("mkt-1").unwrap() > 0.0);
    }
}
