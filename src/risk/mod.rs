pub mod manager;
pub mod metrics;
pub mod quarantine;
pub mod stops;

pub use manager::{
    AlertKind, AlertSeverity, RecommendedAction, RiskAlert, RiskLimits, RiskManager,
};
pub use metrics::{RiskMetrics, RiskMetricsConfig, RiskMetricsEngine};
pub use quarantine::{QuarantineConfig, QuarantineTracker, WhaleQuarantineStatus};
pub use stops::{StopConfig, StopLoss, TrailingStopTracker};

use chrono::{DateTime, Utc};

/// Coarse correlation proxy between two positions (or a candidate trade and
/// a position): the average of a category-match term and a time-decay term
/// over the gap between resolution dates.
///
/// Deliberately not a statistical estimator. The 0.4 portfolio ceiling was
/// tuned against this exact formula, so it is preserved as-is.
pub fn correlation_proxy(
    category_a: &str,
    resolution_a: DateTime<Utc>,
    category_b: &str,
    resolution_b: DateTime<Utc>,
) -> f64 {
    let category_term = if category_a == category_b { 0.6 } else { 0.1 };
    let days_apart = (resolution_a - resolution_b).num_days().abs() as f64;
    let time_term = (0.5 - days_apart / 60.0).max(0.0);
    (category_term + time_term) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_same_category_same_day_is_most_correlated() {
        let now = Utc::now();
        let corr = correlation_proxy("politics", now, "politics", now);
        assert!((corr - 0.55).abs() < 1e-12); // (0.6 + 0.5) / 2
    }

    #[test]
    fn test_time_decay_vanishes_past_thirty_days() {
        let now = Utc::now();
        let corr = correlation_proxy("politics", now, "sports", now + Duration::days(45));
        assert!((corr - 0.05).abs() < 1e-12); // (0.1 + 0.0) / 2
    }

    #[test]
    fn test_gap_direction_does_not_matter() {
        let now = Utc::now();
        let later = now + Duration::days(12);
        assert_eq!(
            correlation_proxy("crypto", now, "crypto", later),
            correlation_proxy("crypto", later, "crypto", now)
        );
    }
}
