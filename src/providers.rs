//! Contracts for the external collaborators the core consults.
//!
//! All I/O lives behind these traits: the core never fetches anything itself,
//! it is handed point-in-time state by the caller. Lookup misses surface as
//! `CoreError::MissingContext` inside the pipeline, never as silent defaults.

use crate::models::{MarketContext, PortfolioState, TraderState};

/// Supplies trader-level state for Stage 1 and edge estimation. Expected to
/// already exclude quarantined traders (the quarantine status query on
/// `RiskManager` closes that loop).
pub trait TraderStateProvider {
    fn trader_state(&self, trader: &str) -> Option<TraderState>;
}

/// Supplies liquidity, resolution date and category for a market.
pub trait MarketDataProvider {
    fn market_context(&self, market_id: &str) -> Option<MarketContext>;
}

/// Supplies the current portfolio snapshot for Stage 3 and the risk manager.
pub trait PortfolioProvider {
    fn portfolio(&self) -> Option<PortfolioState>;
}

/// Time-ordered portfolio returns for the risk metrics engine.
pub trait ReturnSeriesSource {
    fn portfolio_returns(&self) -> Vec<f64>;
}
