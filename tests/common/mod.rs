//! In-memory providers and builders shared by the integration tests.

use std::cell::Cell;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use polycopy::models::{
    MarketContext, OpenPosition, PortfolioState, Side, TraderState, WhaleSignal,
};
use polycopy::providers::{MarketDataProvider, PortfolioProvider, TraderStateProvider};

pub struct InMemoryTraders {
    pub traders: HashMap<String, TraderState>,
}

impl TraderStateProvider for InMemoryTraders {
    fn trader_state(&self, trader: &str) -> Option<TraderState> {
        self.traders.get(trader).cloned()
    }
}

pub struct InMemoryMarkets {
    pub markets: HashMap<String, MarketContext>,
    pub lookups: Cell<u32>,
}

impl InMemoryMarkets {
    pub fn new(markets: HashMap<String, MarketContext>) -> Self {
        Self {
            markets,
            lookups: Cell::new(0),
        }
    }
}

impl MarketDataProvider for InMemoryMarkets {
    fn market_context(&self, market_id: &str) -> Option<MarketContext> {
        self.lookups.set(self.lookups.get() + 1);
        self.markets.get(market_id).cloned()
    }
}

pub struct StaticPortfolio(pub PortfolioState);

impl PortfolioProvider for StaticPortfolio {
    fn portfolio(&self) -> Option<PortfolioState> {
        Some(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn fit_trader() -> TraderState {
    let mut category_win_rates = HashMap::new();
    category_win_rates.insert("politics".to_string(), 0.65);
    TraderState {
        quality_score: 85.0,
        sharpe_30d: 1.5,
        sharpe_90d: 1.0,
        drawdown: 0.10,
        category_win_rates,
    }
}

pub fn make_signal(trader: &str, market_id: &str, price: Decimal, size: Decimal) -> WhaleSignal {
    WhaleSignal {
        trader: trader.to_string(),
        market_id: market_id.to_string(),
        category: "politics".to_string(),
        side: Side::Buy,
        price,
        size,
        observed_at: Utc::now(),
        quality_score: 85.0,
        rejection: None,
    }
}

pub fn liquid_market(days_out: i64) -> MarketContext {
    MarketContext {
        liquidity: dec!(50_000_000),
        resolution_date: Utc::now() + Duration::days(days_out),
        category: "politics".to_string(),
    }
}

pub fn open_position(
    category: &str,
    notional: Decimal,
    resolution_date: DateTime<Utc>,
) -> OpenPosition {
    OpenPosition {
        id: Uuid::new_v4(),
        market_id: format!("mkt-{category}"),
        category: category.to_string(),
        side: Side::Buy,
        notional,
        entry_price: dec!(0.5),
        resolution_date,
    }
}

/// NAV 100k, one uncorrelated sports position, modest exposure.
pub fn roomy_portfolio() -> PortfolioState {
    let sports = open_position("sports", dec!(10_000), Utc::now() + Duration::days(200));
    let mut category_exposure = HashMap::new();
    category_exposure.insert("sports".to_string(), dec!(10_000));
    category_exposure.insert("politics".to_string(), dec!(10_000));
    PortfolioState {
        nav: dec!(100_000),
        total_exposure: dec!(20_000),
        category_exposure,
        positions: vec![sports],
    }
}
