//! Per-market EWMA volatility estimation.

use std::collections::HashMap;

/// RiskMetrics-style decay constant.
pub const DEFAULT_EWMA_LAMBDA: f64 = 0.94;

/// Seed variance when the first batch holds a single observation.
const SINGLE_VALUE_SEED_VARIANCE: f64 = 0.01;

/// Exponentially-weighted moving variance for one market.
///
/// The first batch seeds the variance (sample variance of the batch, or a
/// fixed seed for a lone value); every later return `r` applies
/// `variance = lambda * variance + (1 - lambda) * r^2`.
#[derive(Debug, Clone)]
pub struct VolatilityEstimator {
    lambda: f64,
    variance: Option<f64>,
}

impl VolatilityEstimator {
    pub fn new(lambda: f64) -> Self {
        Self {
            lambda,
            variance: None,
        }
    }

    /// Start from a known variance, skipping the seeding phase.
    pub fn from_variance(lambda: f64, variance: f64) -> Self {
        Self {
            lambda,
            variance: Some(variance.max(0.0)),
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.variance.is_some()
    }

    /// Fold a batch of returns into the estimate.
    pub fn update(&mut self, returns: &[f64]) {
        if returns.is_empty() {
            return;
        }
        match self.variance {
            None => {
                self.variance = Some(if returns.len() == 1 {
                    SINGLE_VALUE_SEED_VARIANCE
                } else {
                    sample_variance(returns)
                });
            }
            Some(mut variance) => {
                for r in returns {
                    variance = self.lambda * variance + (1.0 - self.lambda) * r * r;
                }
                self.variance = Some(variance);
            }
        }
    }

    pub fn variance(&self) -> f64 {
        self.variance.unwrap_or(0.0)
    }

    /// Current standard-deviation estimate. Zero before seeding.
    pub fn volatility(&self) -> f64 {
        self.variance().sqrt()
    }
}

fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Owns one estimator per market, created lazily on first use and kept for
/// the process lifetime. External reads go through accessors; the map itself
/// is never handed out.
#[derive(Debug)]
pub struct VolatilityRegistry {
    lambda: f64,
    estimators: HashMap<String, VolatilityEstimator>,
}

impl VolatilityRegistry {
    pub fn new(lambda: f64) -> Self {
        Self {
            lambda,
            estimators: HashMap::new(),
        }
    }

    pub fn estimator_mut(&mut self, market_id: &str) -> &mut VolatilityEstimator {
        self.estimators
            .entry(market_id.to_string())
            .or_insert_with(|| VolatilityEstimator::new(self.lambda))
    }

    /// Install a pre-seeded estimator (e.g. warm start from persisted state).
    pub fn insert(&mut self, market_id: &str, estimator: VolatilityEstimator) {
        self.estimators.insert(market_id.to_string(), estimator);
    }

    pub fn volatility(&self, market_id: &str) -> Option<f64> {
        self.estimators.get(market_id).map(|e| e.volatility())
    }

    pub fn len(&self) -> usize {
        self.estimators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimators.is_empty()
    }
}

impl Default for VolatilityRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_EWMA_LAMBDA)
    }
}
