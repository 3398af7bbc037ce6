use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Side;

// ---------------------------------------------------------------------------
// WhaleSignal
// ---------------------------------------------------------------------------

/// An observed trade by a tracked whale, produced by the external detector
/// and consumed once by the pipeline.
///
/// The `rejection` slot is the only mutable part: the first rejecting stage
/// sets it, later stages never run, so it holds at most one reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhaleSignal {
    /// Whale wallet address.
    pub trader: String,
    /// Market condition ID.
    pub market_id: String,
    /// Market category tag (politics, sports, crypto, ...).
    pub category: String,
    pub side: Side,
    /// Probability-style price in 0..1.
    pub price: Decimal,
    /// Shares traded.
    pub size: Decimal,
    pub observed_at: DateTime<Utc>,
    /// Trader's whale quality score at observation time, 0..100.
    pub quality_score: f64,
    /// Set by whichever stage rejects the signal; first rejection wins.
    pub rejection: Option<RejectReason>,
}

impl WhaleSignal {
    /// Dollar notional of the whale's own trade.
    pub fn notional(&self) -> Decimal {
        self.size * self.price
    }
}

// ---------------------------------------------------------------------------
// RejectReason
// ---------------------------------------------------------------------------

/// Why a signal was turned away. One variant per check, carrying only the
/// fields relevant to that check, so callers match instead of probing
/// optional keys.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    // Stage 1: trader fitness
    #[error("WQS too low: {score:.1} < {min:.1}")]
    QualityTooLow { score: f64, min: f64 },

    #[error("no momentum: 30d sharpe {sharpe_30d:.2} <= 90d sharpe {sharpe_90d:.2}")]
    NoMomentum { sharpe_30d: f64, sharpe_90d: f64 },

    #[error("trader drawdown {drawdown:.3} exceeds ceiling {max:.3}")]
    DrawdownTooDeep { drawdown: f64, max: f64 },

    // Stage 2: trade economics
    #[error("notional {notional} below conviction minimum {min}")]
    NotionalTooSmall { notional: Decimal, min: Decimal },

    #[error("estimated slippage {impact:.4} exceeds ceiling {max:.4}")]
    SlippageTooHigh { impact: f64, max: f64 },

    #[error("resolution {days}d out exceeds max holding window {max}d")]
    HorizonTooLong { days: i64, max: i64 },

    #[error("edge {edge:.4} below minimum {min:.4}")]
    EdgeTooSmall { edge: f64, min: f64 },

    // Stage 3: portfolio fit
    #[error("correlation {correlation:.2} with existing position exceeds ceiling {max:.2}")]
    CorrelationTooHigh { correlation: f64, max: f64 },

    #[error("projected exposure {projected:.3} of NAV exceeds ceiling {max:.3}")]
    ExposureLimit { projected: f64, max: f64 },

    #[error("projected {category} exposure {projected:.3} of NAV exceeds ceiling {max:.3}")]
    CategoryConcentration {
        category: String,
        projected: f64,
        max: f64,
    },
}

impl RejectReason {
    /// Stable key for the stats histogram and metrics labels.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::QualityTooLow { .. } => "quality_too_low",
            RejectReason::NoMomentum { .. } => "no_momentum",
            RejectReason::DrawdownTooDeep { .. } => "drawdown_too_deep",
            RejectReason::NotionalTooSmall { .. } => "notional_too_small",
            RejectReason::SlippageTooHigh { .. } => "slippage_too_high",
            RejectReason::HorizonTooLong { .. } => "horizon_too_long",
            RejectReason::EdgeTooSmall { .. } => "edge_too_small",
            RejectReason::CorrelationTooHigh { .. } => "correlation_too_high",
            RejectReason::ExposureLimit { .. } => "exposure_limit",
            RejectReason::CategoryConcentration { .. } => "category_concentration",
        }
    }

    /// Which filter stage produced this reason (1, 2 or 3).
    pub fn stage(&self) -> u8 {
        match self {
            RejectReason::QualityTooLow { .. }
            | RejectReason::NoMomentum { .. }
            | RejectReason::DrawdownTooDeep { .. } => 1,
            RejectReason::NotionalTooSmall { .. }
            | RejectReason::SlippageTooHigh { .. }
            | RejectReason::HorizonTooLong { .. }
            | RejectReason::EdgeTooSmall { .. } => 2,
            RejectReason::CorrelationTooHigh { .. }
            | RejectReason::ExposureLimit { .. }
            | RejectReason::CategoryConcentration { .. } => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// Derived from the whale quality score at admission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn from_quality(quality: f64) -> Self {
        if quality >= 85.0 {
            ConfidenceTier::VeryHigh
        } else if quality >= 80.0 {
            ConfidenceTier::High
        } else if quality >= 75.0 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// Derived from edge magnitude at admission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    High,
    Medium,
    Low,
}

impl UrgencyTier {
    pub fn from_edge(edge: f64) -> Self {
        if edge > 0.10 {
            UrgencyTier::High
        } else if edge > 0.05 {
            UrgencyTier::Medium
        } else {
            UrgencyTier::Low
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutableSignal
// ---------------------------------------------------------------------------

/// A signal that survived all three filter stages, hardened into an order
/// intent for the (external) execution layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutableSignal {
    pub signal: WhaleSignal,
    /// Recommended capital to commit, in dollars.
    pub recommended_size: Decimal,
    /// Estimated probability gap between trader-implied and market-implied
    /// outcome, signed for side.
    pub edge: f64,
    /// Expected P&L at the recommended size.
    pub expected_pnl: Decimal,
    pub confidence: ConfidenceTier,
    pub urgency: UrgencyTier,
}
