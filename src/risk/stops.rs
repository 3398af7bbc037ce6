//! ATR-derived trailing stops, one per open position.
//!
//! The stop only ratchets in the position's favor: monotonically
//! non-decreasing for longs, non-increasing for shorts. Trailing engages
//! once unrealized profit clears the activation threshold.

use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Candle, Side};

#[derive(Debug, Clone)]
pub struct StopConfig {
    /// True-range lookback window.
    pub atr_window: usize,
    /// Stop distance in ATR multiples.
    pub atr_multiplier: Decimal,
    /// Unrealized profit fraction required before trailing engages.
    pub trailing_activation: Decimal,
    /// Stop distance as a fraction of entry when ATR cannot be computed.
    pub fallback_stop_fraction: Decimal,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            atr_window: 14,
            atr_multiplier: dec!(2.5),
            trailing_activation: dec!(0.05),
            fallback_stop_fraction: dec!(0.05),
        }
    }
}

/// Stop state for one open position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLoss {
    pub position_id: Uuid,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    /// ATR used to derive the stop distance.
    pub atr: Decimal,
    /// Too few candles for a true range; the stop fell back to a fixed
    /// percent of entry.
    pub atr_degraded: bool,
    pub trailing_enabled: bool,
    /// Highest price seen since entry for longs, lowest for shorts.
    pub best_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of one price tick against a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopCheck {
    pub triggered: bool,
    pub trailing_enabled: bool,
}

pub struct TrailingStopTracker {
    config: StopConfig,
    stops: HashMap<Uuid, StopLoss>,
}

impl TrailingStopTracker {
    pub fn new(config: StopConfig) -> Self {
        Self {
            config,
            stops: HashMap::new(),
        }
    }

    /// Arm a stop for a newly opened position.
    pub fn open_position(
        &mut self,
        position_id: Uuid,
        side: Side,
        entry_price: Decimal,
        candles: &[Candle],
        now: DateTime<Utc>,
    ) -> &StopLoss {
        let (atr, atr_degraded) = match compute_atr(candles, self.config.atr_window) {
            Some(atr) => (atr, false),
            None => (entry_price * self.config.fallback_stop_fraction, true),
        };

        let distance = atr * self.config.atr_multiplier;
        let stop_price = match side {
            Side::Buy => (entry_price - distance).max(Decimal::ZERO),
            Side::Sell => (entry_price + distance).min(Decimal::ONE),
        };

        tracing::info!(
            position = %position_id,
            side = %side,
            entry = %entry_price,
            stop = %stop_price,
            atr = %atr,
            degraded = atr_degraded,
            "Stop armed"
        );

        self.stops.entry(position_id).or_insert(StopLoss {
            position_id,
            side,
            entry_price,
            stop_price,
            atr,
            atr_degraded,
            trailing_enabled: false,
            best_price: entry_price,
            created_at: now,
            updated_at: now,
        })
    }

    /// Feed one price tick: ratchet the stop on favorable moves, then check
    /// the trigger. `None` when no stop exists for the position.
    pub fn on_price(
        &mut self,
        position_id: Uuid,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Option<StopCheck> {
        let multiplier = self.config.atr_multiplier;
        let activation = self.config.trailing_activation;
        let stop = self.stops.get_mut(&position_id)?;

        let favorable = match stop.side {
            Side::Buy => price > stop.best_price,
            Side::Sell => price < stop.best_price,
        };
        if favorable {
            stop.best_price = price;
        }

        if !stop.trailing_enabled && stop.entry_price > Decimal::ZERO {
            let profit = match stop.side {
                Side::Buy => (price - stop.entry_price) / stop.entry_price,
                Side::Sell => (stop.entry_price - price) / stop.entry_price,
            };
            if profit >= activation {
                stop.trailing_enabled = true;
                tracing::debug!(position = %position_id, profit = %profit, "Trailing engaged");
            }
        }

        if stop.trailing_enabled && favorable {
            let candidate = match stop.side {
                Side::Buy => (stop.best_price - stop.atr * multiplier).max(Decimal::ZERO),
                Side::Sell => (stop.best_price + stop.atr * multiplier).min(Decimal::ONE),
            };
            let improves = match stop.side {
                Side::Buy => candidate > stop.stop_price,
                Side::Sell => candidate < stop.stop_price,
            };
            if improves {
                stop.stop_price = candidate;
            }
        }

        stop.updated_at = now;

        let triggered = match stop.side {
            Side::Buy => price <= stop.stop_price,
            Side::Sell => price >= stop.stop_price,
        };
        if triggered {
            tracing::info!(
                position = %position_id,
                price = %price,
                stop = %stop.stop_price,
                "Stop triggered"
            );
            counter!("stops_triggered_total").increment(1);
        }

        Some(StopCheck {
            triggered,
            trailing_enabled: stop.trailing_enabled,
        })
    }

    /// Position closed, by any means: drop its stop state.
    pub fn close_position(&mut self, position_id: Uuid) -> Option<StopLoss> {
        self.stops.remove(&position_id)
    }

    pub fn stop(&self, position_id: Uuid) -> Option<&StopLoss> {
        self.stops.get(&position_id)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

impl Default for TrailingStopTracker {
    fn default() -> Self {
        Self::new(StopConfig::default())
    }
}

/// Mean true range over the last `window` periods. Needs at least two
/// candles for a previous close; returns `None` otherwise.
pub fn compute_atr(candles: &[Candle], window: usize) -> Option<Decimal> {
    if candles.len() < 2 || window == 0 {
        return None;
    }

    let mut ranges = Vec::with_capacity(candles.len() - 1);
    for pair in candles.windows(2) {
        let prev_close = pair[0].close;
        let c = pair[1];
        let tr = (c.high - c.low)
            .max((c.high - prev_close).abs())
            .max((c.low - prev_close).abs());
        ranges.push(tr);
    }

    let start = ranges.len().saturating_sub(window);
    let recent = &ranges[start..];
    Some(recent.iter().copied().sum::<Decimal>() / Decimal::from(recent.len() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_candles(n: usize, close: Decimal, range: Decimal) -> Vec<Candle> {
        (0..n)
            .map(|_| Candle::new(close + range, close - range, close))
            .collect()
    }

    #[test]
    fn test_atr_is_mean_true_range() {
        // Constant 0.02 high-low range, closes unchanged: ATR = 0.04.
        let candles = flat_candles(15, dec!(0.50), dec!(0.02));
        let atr = compute_atr(&candles, 14).unwrap();
        assert_eq!(atr, dec!(0.04));
    }

    #[test]
    fn test_atr_uses_gap_from_previous_close() {
        let candles = vec![
            Candle::new(dec!(0.52), dec!(0.48), dec!(0.50)),
            // Gapped up: high - prev_close = 0.20 dominates high - low.
            Candle::new(dec!(0.70), dec!(0.68), dec!(0.69)),
        ];
        let atr = compute_atr(&candles, 14).unwrap();
        assert_eq!(atr, dec!(0.20));
    }

    #[test]
    fn test_insufficient_candles_degrades_to_fallback() {
        let mut tracker = TrailingStopTracker::default();
        let id = Uuid::new_v4();
        let stop = tracker.open_position(id, Side::Buy, dec!(0.60), &[], Utc::now());
        assert!(stop.atr_degraded);
        // fallback atr = 0.60 * 0.05 = 0.03; stop = 0.60 - 0.03 * 2.5 = 0.525
        assert_eq!(stop.stop_price, dec!(0.525));
    }

    #[test]
    fn test_long_stop_below_entry() {
        let mut tracker = TrailingStopTracker::default();
        let id = Uuid::new_v4();
        let candles = flat_candles(15, dec!(0.50), dec!(0.01)); // ATR = 0.02
        let stop = tracker.open_position(id, Side::Buy, dec!(0.50), &candles, Utc::now());
        assert_eq!(stop.stop_price, dec!(0.45)); // 0.50 - 0.02 * 2.5
        assert!(!stop.trailing_enabled);
    }

    #[test]
    fn test_short_stop_above_entry_and_clamped() {
        let mut tracker = TrailingStopTracker::default();
        let id = Uuid::new_v4();
        let candles = flat_candles(15, dec!(0.90), dec!(0.05)); // ATR = 0.10
        let stop = tracker.open_position(id, Side::Sell, dec!(0.90), &candles, Utc::now());
        // 0.90 + 0.25 clamps to 1.
        assert_eq!(stop.stop_price, Decimal::ONE);
    }

    #[test]
    fn test_no_trailing_below_activation_profit() {
        let mut tracker = TrailingStopTracker::default();
        let id = Uuid::new_v4();
        let candles = flat_candles(15, dec!(0.50), dec!(0.01));
        tracker.open_position(id, Side::Buy, dec!(0.50), &candles, Utc::now());

        // +2% profit: below the 5% activation, stop must not move.
        let check = tracker.on_price(id, dec!(0.51), Utc::now()).unwrap();
        assert!(!check.triggered);
        assert!(!check.trailing_enabled);
        assert_eq!(tracker.stop(id).unwrap().stop_price, dec!(0.45));
    }

    #[test]
    fn test_long_stop_ratchets_monotonically() {
        let mut tracker = TrailingStopTracker::default();
        let id = Uuid::new_v4();
        let candles = flat_candles(15, dec!(0.50), dec!(0.01)); // ATR 0.02, dist 0.05
        tracker.open_position(id, Side::Buy, dec!(0.50), &candles, Utc::now());

        let mut last_stop = tracker.stop(id).unwrap().stop_price;
        for price in [dec!(0.55), dec!(0.60), dec!(0.58), dec!(0.65)] {
            let check = tracker.on_price(id, price, Utc::now()).unwrap();
            assert!(!check.triggered);
            let stop = tracker.stop(id).unwrap().stop_price;
            assert!(stop >= last_stop, "stop must never move down for a long");
            last_stop = stop;
        }
        // Best price 0.65, stop = 0.65 - 0.05 = 0.60.
        assert_eq!(last_stop, dec!(0.60));
    }

    #[test]
    fn test_long_stop_triggers_on_breach() {
        let mut tracker = TrailingStopTracker::default();
        let id = Uuid::new_v4();
        let candles = flat_candles(15, dec!(0.50), dec!(0.01));
        tracker.open_position(id, Side::Buy, dec!(0.50), &candles, Utc::now());

        tracker.on_price(id, dec!(0.60), Utc::now()).unwrap(); // stop ratchets to 0.55
        let check = tracker.on_price(id, dec!(0.54), Utc::now()).unwrap();
        assert!(check.triggered);
    }

    #[test]
    fn test_short_stop_ratchets_down() {
        let mut tracker = TrailingStopTracker::default();
        let id = Uuid::new_v4();
        let candles = flat_candles(15, dec!(0.50), dec!(0.01)); // dist 0.05
        tracker.open_position(id, Side::Sell, dec!(0.50), &candles, Utc::now());
        assert_eq!(tracker.stop(id).unwrap().stop_price, dec!(0.55));

        tracker.on_price(id, dec!(0.40), Utc::now()).unwrap();
        assert_eq!(tracker.stop(id).unwrap().stop_price, dec!(0.45));

        let check = tracker.on_price(id, dec!(0.46), Utc::now()).unwrap();
        assert!(check.triggered);
    }

    #[test]
    fn test_close_destroys_stop_state() {
        let mut tracker = TrailingStopTracker::default();
        let id = Uuid::new_v4();
        tracker.open_position(id, Side::Buy, dec!(0.50), &[], Utc::now());
        assert_eq!(tracker.len(), 1);
        assert!(tracker.close_position(id).is_some());
        assert!(tracker.is_empty());
        assert!(tracker.on_price(id, dec!(0.10), Utc::now()).is_none());
    }
}
