//! Per-trader quarantine state machine.
//!
//! Active (no record) -> strike accumulation -> quarantined -> Active again
//! once the release time passes. Release is a lazy query-time transition, a
//! pure function of (state, now); there is no background timer.

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::PerformanceUpdate;

#[derive(Debug, Clone)]
pub struct QuarantineConfig {
    /// Sharpe below this is a violation.
    pub min_sharpe: f64,
    /// Drawdown fraction above this is a violation.
    pub max_drawdown: f64,
    /// Consistency (0..15 scale) below this is a violation.
    pub min_consistency: f64,
    /// Violating updates before the trader is quarantined.
    pub strikes_before_quarantine: u32,
    /// Length of the quarantine window.
    pub quarantine_days: i64,
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            min_sharpe: 0.5,
            max_drawdown: 0.30,
            min_consistency: 5.0,
            strikes_before_quarantine: 3,
            quarantine_days: 30,
        }
    }
}

/// Per-trader quarantine record. Absence of a record means Active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhaleQuarantineStatus {
    pub trader: String,
    pub is_quarantined: bool,
    /// Concatenated violation messages from the most recent strike.
    pub reason: String,
    pub strikes: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub release_at: Option<DateTime<Utc>>,
    /// The performance snapshot that triggered quarantine.
    pub triggering_snapshot: Option<PerformanceUpdate>,
}

pub struct QuarantineTracker {
    config: QuarantineConfig,
    statuses: HashMap<String, WhaleQuarantineStatus>,
}

impl QuarantineTracker {
    pub fn new(config: QuarantineConfig) -> Self {
        Self {
            config,
            statuses: HashMap::new(),
        }
    }

    /// Evaluate one performance update. A clean update neither adds nor
    /// removes strikes; only release resets them. Returns the status after
    /// the update, or `None` while the trader stays Active.
    pub fn record_performance(
        &mut self,
        trader: &str,
        update: &PerformanceUpdate,
        now: DateTime<Utc>,
    ) -> Option<&WhaleQuarantineStatus> {
        let violations = self.violations(update);
        if violations.is_empty() {
            return self.statuses.get(trader);
        }

        let status = self
            .statuses
            .entry(trader.to_string())
            .or_insert_with(|| WhaleQuarantineStatus {
                trader: trader.to_string(),
                is_quarantined: false,
                reason: String::new(),
                strikes: 0,
                started_at: None,
                release_at: None,
                triggering_snapshot: None,
            });

        // Already quarantined: no further strikes, no window extension.
        if status.is_quarantined {
            return Some(status);
        }

        status.strikes += 1;
        status.reason = violations.join("; ");

        if status.strikes >= self.config.strikes_before_quarantine {
            status.is_quarantined = true;
            status.started_at = Some(now);
            status.release_at = Some(now + Duration::days(self.config.quarantine_days));
            status.triggering_snapshot = Some(*update);

            tracing::warn!(
                trader = %trader,
                strikes = status.strikes,
                reason = %status.reason,
                release_at = ?status.release_at,
                "Whale quarantined"
            );
            counter!("whales_quarantined_total").increment(1);
        } else {
            tracing::info!(
                trader = %trader,
                strikes = status.strikes,
                reason = %status.reason,
                "Whale strike recorded"
            );
        }

        Some(status)
    }

    /// Current status, applying the lazy release transition: once `now` has
    /// passed the release time the record is removed and strikes reset.
    pub fn status(
        &mut self,
        trader: &str,
        now: DateTime<Utc>,
    ) -> Option<WhaleQuarantineStatus> {
        let release_due = matches!(
            self.statuses.get(trader),
            Some(status) if status.is_quarantined
                && status.release_at.is_some_and(|release| now >= release)
        );
        if release_due {
            self.statuses.remove(trader);
            tracing::info!(trader = %trader, "Whale quarantine released");
            return None;
        }
        self.statuses.get(trader).cloned()
    }

    pub fn is_quarantined(&mut self, trader: &str, now: DateTime<Utc>) -> bool {
        self.status(trader, now)
            .map(|s| s.is_quarantined)
            .unwrap_or(false)
    }

    /// Traders currently holding a quarantine or strike record.
    pub fn tracked_traders(&self) -> impl Iterator<Item = &str> {
        self.statuses.keys().map(String::as_str)
    }

    fn violations(&self, update: &PerformanceUpdate) -> Vec<String> {
        let mut violations = Vec::new();
        if update.sharpe < self.config.min_sharpe {
            violations.push(format!(
                "sharpe {:.2} below {:.2}",
                update.sharpe, self.config.min_sharpe
            ));
        }
        if update.drawdown > self.config.max_drawdown {
            violations.push(format!(
                "drawdown {:.2} above {:.2}",
                update.drawdown, self.config.max_drawdown
            ));
        }
        if update.consistency < self.config.min_consistency {
            violations.push(format!(
                "consistency {:.1} below {:.1}",
                update.consistency, self.config.min_consistency
            ));
        }
        violations
    }
}

impl Default for QuarantineTracker {
    fn default() -> Self {
        Self::new(QuarantineConfig::default())
    }
}
