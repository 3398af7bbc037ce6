//! Three-stage cascading signal filter.
//!
//! A candidate whale trade passes through trader fitness (Stage 1), trade
//! economics (Stage 2) and portfolio fit (Stage 3), in that order, short-
//! circuiting on the first failing check. Everything the stages need is
//! supplied by the caller's providers; the pipeline performs no I/O.

pub mod stats;

pub use stats::PipelineStats;

use metrics::counter;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::errors::CoreError;
use crate::models::{
    ConfidenceTier, ExecutableSignal, MarketContext, PortfolioState, RejectReason, Side,
    TraderState, UrgencyTier, WhaleSignal,
};
use crate::providers::{MarketDataProvider, PortfolioProvider, TraderStateProvider};
use crate::risk::correlation_proxy;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum whale quality score for admission.
    pub min_quality_score: f64,
    /// Maximum trader drawdown fraction.
    pub max_trader_drawdown: f64,
    /// Minimum conviction notional in dollars.
    pub min_notional: Decimal,
    /// Maximum estimated slippage fraction (square-root impact model).
    pub max_slippage: f64,
    /// Maximum holding window in days to resolution.
    pub max_days_to_resolution: i64,
    /// Minimum estimated edge.
    pub min_edge: f64,
    /// Win rate assumed when the trader has no history in the category.
    /// Injected explicitly here, never buried in the formula.
    pub default_win_rate: f64,
    /// Stage 3 correlation ceiling against the nearest open position.
    pub max_correlation: f64,
    /// Projected total exposure ceiling as a fraction of NAV.
    pub max_total_exposure: f64,
    /// Projected per-category exposure ceiling as a fraction of NAV.
    pub max_category_exposure: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_quality_score: 75.0,
            max_trader_drawdown: 0.25,
            min_notional: Decimal::from(5_000),
            max_slippage: 0.01,
            max_days_to_resolution: 90,
            min_edge: 0.03,
            default_win_rate: 0.55,
            max_correlation: 0.4,
            max_total_exposure: 0.95,
            max_category_exposure: 0.30,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of one pipeline run. Rejection is a normal outcome, not an error;
/// the rejected signal carries its reason in the `rejection` slot.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Admitted(Box<ExecutableSignal>),
    Rejected(WhaleSignal),
}

impl PipelineOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, PipelineOutcome::Admitted(_))
    }

    pub fn rejection(&self) -> Option<&RejectReason> {
        match self {
            PipelineOutcome::Admitted(_) => None,
            PipelineOutcome::Rejected(signal) => signal.rejection.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// SignalPipeline
// ---------------------------------------------------------------------------

pub struct SignalPipeline {
    config: PipelineConfig,
    stats: PipelineStats,
}

impl SignalPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            stats: PipelineStats::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Decide whether `signal` becomes an `ExecutableSignal`.
    ///
    /// Hard failures (`InvalidInput`, `MissingContext`) halt this signal only;
    /// every business rejection comes back as `PipelineOutcome::Rejected`.
    pub fn process(
        &mut self,
        signal: WhaleSignal,
        traders: &dyn TraderStateProvider,
        markets: &dyn MarketDataProvider,
        portfolio_provider: &dyn PortfolioProvider,
    ) -> Result<PipelineOutcome, CoreError> {
        self.stats.signals_seen += 1;
        counter!("signals_seen_total").increment(1);

        validate_signal(&signal)?;

        // --- Stage 1: trader fitness ---
        let trader = traders
            .trader_state(&signal.trader)
            .ok_or_else(|| CoreError::missing_context("trader state", &signal.trader))?;

        if let Some(reason) = self.stage1_trader(&trader) {
            return Ok(self.reject(signal, reason));
        }
        self.stats.stage1_passed += 1;

        // --- Stage 2: trade economics ---
        let market = markets
            .market_context(&signal.market_id)
            .ok_or_else(|| CoreError::missing_context("market context", &signal.market_id))?;

        let edge = self.estimate_edge(&signal, &trader)?;
        if let Some(reason) = self.stage2_trade(&signal, &market, edge)? {
            return Ok(self.reject(signal, reason));
        }
        self.stats.stage2_passed += 1;

        // --- Stage 3: portfolio fit ---
        let portfolio = portfolio_provider
            .portfolio()
            .ok_or_else(|| CoreError::missing_context("portfolio snapshot", "portfolio"))?;

        if let Some(reason) = self.stage3_portfolio(&signal, &market, &portfolio)? {
            return Ok(self.reject(signal, reason));
        }
        self.stats.stage3_passed += 1;

        self.admit(signal, edge)
    }

    // -- stages --------------------------------------------------------------

    fn stage1_trader(&self, trader: &TraderState) -> Option<RejectReason> {
        if trader.quality_score < self.config.min_quality_score {
            return Some(RejectReason::QualityTooLow {
                score: trader.quality_score,
                min: self.config.min_quality_score,
            });
        }
        if trader.sharpe_30d <= trader.sharpe_90d {
            return Some(RejectReason::NoMomentum {
                sharpe_30d: trader.sharpe_30d,
                sharpe_90d: trader.sharpe_90d,
            });
        }
        if trader.drawdown > self.config.max_trader_drawdown {
            return Some(RejectReason::DrawdownTooDeep {
                drawdown: trader.drawdown,
                max: self.config.max_trader_drawdown,
            });
        }
        None
    }

    fn stage2_trade(
        &self,
        signal: &WhaleSignal,
        market: &MarketContext,
        edge: f64,
    ) -> Result<Option<RejectReason>, CoreError> {
        let notional = signal.notional();
        if notional < self.config.min_notional {
            return Ok(Some(RejectReason::NotionalTooSmall {
                notional,
                min: self.config.min_notional,
            }));
        }

        let impact = estimate_impact(notional, market.liquidity)?;
        if impact > self.config.max_slippage {
            return Ok(Some(RejectReason::SlippageTooHigh {
                impact,
                max: self.config.max_slippage,
            }));
        }

        let days = (market.resolution_date - signal.observed_at).num_days();
        if days > self.config.max_days_to_resolution {
            return Ok(Some(RejectReason::HorizonTooLong {
                days,
                max: self.config.max_days_to_resolution,
            }));
        }

        if edge < self.config.min_edge {
            return Ok(Some(RejectReason::EdgeTooSmall {
                edge,
                min: self.config.min_edge,
            }));
        }

        Ok(None)
    }

    fn stage3_portfolio(
        &self,
        signal: &WhaleSignal,
        market: &MarketContext,
        portfolio: &PortfolioState,
    ) -> Result<Option<RejectReason>, CoreError> {
        let nav = dec_to_f64(portfolio.nav, "nav")?;
        if nav <= 0.0 {
            return Err(CoreError::invalid_input(
                "nav",
                format!("NAV must be positive, got {}", portfolio.nav),
            ));
        }

        // Nearest-position correlation, max over all open positions.
        let correlation = portfolio
            .positions
            .iter()
            .map(|pos| {
                correlation_proxy(
                    &signal.category,
                    market.resolution_date,
                    &pos.category,
                    pos.resolution_date,
                )
            })
            .fold(0.0_f64, f64::max);

        if correlation > self.config.max_correlation {
            return Ok(Some(RejectReason::CorrelationTooHigh {
                correlation,
                max: self.config.max_correlation,
            }));
        }

        let notional = dec_to_f64(signal.notional(), "notional")?;
        let total = dec_to_f64(portfolio.total_exposure, "total_exposure")?;

        let projected_total = (total + notional) / nav;
        if projected_total > self.config.max_total_exposure {
            return Ok(Some(RejectReason::ExposureLimit {
                projected: projected_total,
                max: self.config.max_total_exposure,
            }));
        }

        let category_exposure = portfolio
            .category_exposure
            .get(&signal.category)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let projected_category =
            (dec_to_f64(category_exposure, "category_exposure")? + notional) / nav;
        if projected_category > self.config.max_category_exposure {
            return Ok(Some(RejectReason::CategoryConcentration {
                category: signal.category.clone(),
                projected: projected_category,
                max: self.config.max_category_exposure,
            }));
        }

        Ok(None)
    }

    // -- edge ----------------------------------------------------------------

    /// Probability gap between the trader-implied outcome (category win rate)
    /// and the market-implied outcome (price), signed for side.
    fn estimate_edge(&self, signal: &WhaleSignal, trader: &TraderState) -> Result<f64, CoreError> {
        let win_rate = trader
            .category_win_rates
            .get(&signal.category)
            .copied()
            .unwrap_or(self.config.default_win_rate);
        let price = dec_to_f64(signal.price, "price")?;

        Ok(match signal.side {
            Side::Buy => win_rate - price,
            Side::Sell => price - win_rate,
        })
    }

    // -- terminal outcomes ---------------------------------------------------

    fn reject(&mut self, mut signal: WhaleSignal, reason: RejectReason) -> PipelineOutcome {
        tracing::debug!(
            trader = %signal.trader,
            market = %signal.market_id,
            stage = reason.stage(),
            reason = %reason,
            "Signal rejected"
        );
        counter!("signals_rejected_total", "reason" => reason.label()).increment(1);
        self.stats.record_rejection(&reason);
        signal.rejection = Some(reason);
        PipelineOutcome::Rejected(signal)
    }

    fn admit(&mut self, signal: WhaleSignal, edge: f64) -> Result<PipelineOutcome, CoreError> {
        // Half of the whale's own notional, scaled up to 2x by edge strength.
        let scale = (edge / self.config.min_edge).min(2.0);
        let scale_dec = Decimal::from_f64(scale)
            .ok_or_else(|| CoreError::invalid_input("edge", format!("not representable: {edge}")))?;
        let recommended_size = signal.notional() / dec!(2) * scale_dec;

        let edge_dec = Decimal::from_f64(edge)
            .ok_or_else(|| CoreError::invalid_input("edge", format!("not representable: {edge}")))?;
        let expected_pnl = recommended_size * edge_dec;

        let executable = ExecutableSignal {
            confidence: ConfidenceTier::from_quality(signal.quality_score),
            urgency: UrgencyTier::from_edge(edge),
            recommended_size,
            edge,
            expected_pnl,
            signal,
        };

        tracing::info!(
            trader = %executable.signal.trader,
            market = %executable.signal.market_id,
            side = %executable.signal.side,
            edge = edge,
            recommended_size = %executable.recommended_size,
            confidence = ?executable.confidence,
            urgency = ?executable.urgency,
            "Signal admitted"
        );
        counter!("signals_admitted_total").increment(1);
        self.stats.admitted += 1;

        Ok(PipelineOutcome::Admitted(Box::new(executable)))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_signal(signal: &WhaleSignal) -> Result<(), CoreError> {
    if signal.price < Decimal::ZERO || signal.price > Decimal::ONE {
        return Err(CoreError::invalid_input(
            "price",
            format!("price must be in [0, 1], got {}", signal.price),
        ));
    }
    if signal.size < Decimal::ZERO {
        return Err(CoreError::invalid_input(
            "size",
            format!("size must be non-negative, got {}", signal.size),
        ));
    }
    if !signal.quality_score.is_finite() {
        return Err(CoreError::invalid_input(
            "quality_score",
            "quality score must be finite",
        ));
    }
    Ok(())
}

/// Square-root market-impact model: `0.5 * sqrt(notional / liquidity)`,
/// clamped to [0, 1]. Zero or negative liquidity means the whole book would
/// move, so the impact saturates.
fn estimate_impact(notional: Decimal, liquidity: Decimal) -> Result<f64, CoreError> {
    if liquidity <= Decimal::ZERO {
        return Ok(1.0);
    }
    let notional = dec_to_f64(notional, "notional")?;
    let liquidity = dec_to_f64(liquidity, "liquidity")?;
    Ok((0.5 * (notional / liquidity).sqrt()).clamp(0.0, 1.0))
}

pub(crate) fn dec_to_f64(value: Decimal, field: &'static str) -> Result<f64, CoreError> {
    value
        .to_f64()
        .ok_or_else(|| CoreError::invalid_input(field, format!("not representable: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impact_square_root_model() {
        // 0.5 * sqrt(10_000 / 1_000_000) = 0.05
        let impact = estimate_impact(Decimal::from(10_000), Decimal::from(1_000_000)).unwrap();
        assert!((impact - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_impact_saturates_without_liquidity() {
        let impact = estimate_impact(Decimal::from(10_000), Decimal::ZERO).unwrap();
        assert_eq!(impact, 1.0);
    }

    #[test]
    fn test_impact_clamped_to_one() {
        // 0.5 * sqrt(100) = 5.0, clamped
        let impact = estimate_impact(Decimal::from(100_000), Decimal::from(1_000)).unwrap();
        assert_eq!(impact, 1.0);
    }
}
