pub mod signal;

pub use signal::{
    ConfidenceTier, ExecutableSignal, RejectReason, UrgencyTier, WhaleSignal,
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" | "0" => Some(Side::Buy),
            "SELL" | "1" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trader state
// ---------------------------------------------------------------------------

/// Point-in-time performance state for a tracked trader, supplied by the
/// external trader-state provider. Consumed by Stage 1 and edge estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderState {
    /// Whale quality score (WQS), 0..100.
    pub quality_score: f64,
    pub sharpe_30d: f64,
    pub sharpe_90d: f64,
    /// Current drawdown as a fraction (0.25 = down 25% from peak).
    pub drawdown: f64,
    /// Historical win rate per market category.
    pub category_win_rates: HashMap<String, f64>,
}

/// One performance observation for the quarantine state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceUpdate {
    pub sharpe: f64,
    /// Drawdown fraction (0.35 = down 35%).
    pub drawdown: f64,
    /// Consistency score on a 0..15 scale.
    pub consistency: f64,
    pub win_rate: f64,
}

// ---------------------------------------------------------------------------
// Market context
// ---------------------------------------------------------------------------

/// What the market-data provider knows about a market: liquidity available
/// at the top of book, when the market resolves, and its category tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    pub liquidity: Decimal,
    pub resolution_date: DateTime<Utc>,
    pub category: String,
}

// ---------------------------------------------------------------------------
// Portfolio state
// ---------------------------------------------------------------------------

/// An open position as seen by Stage 3 and the risk manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub id: Uuid,
    pub market_id: String,
    pub category: String,
    pub side: Side,
    /// Dollar notional at risk.
    pub notional: Decimal,
    pub entry_price: Decimal,
    pub resolution_date: DateTime<Utc>,
}

/// Snapshot of the portfolio supplied by the external portfolio provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub nav: Decimal,
    /// Total dollar exposure across open positions.
    pub total_exposure: Decimal,
    /// Dollar exposure per category.
    pub category_exposure: HashMap<String, Decimal>,
    pub positions: Vec<OpenPosition>,
}

impl PortfolioState {
    pub fn empty(nav: Decimal) -> Self {
        Self {
            nav,
            total_exposure: Decimal::ZERO,
            category_exposure: HashMap::new(),
            positions: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Candle
// ---------------------------------------------------------------------------

/// High/low/close triple for one period, used for ATR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    pub fn new(high: Decimal, low: Decimal, close: Decimal) -> Self {
        Self { high, low, close }
    }
}
