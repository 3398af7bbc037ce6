use serde::Serialize;
use std::collections::HashMap;

use crate::models::RejectReason;

/// Cumulative pipeline counters for production monitoring. Not used for
/// correctness decisions.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PipelineStats {
    pub signals_seen: u64,
    pub stage1_passed: u64,
    pub stage2_passed: u64,
    pub stage3_passed: u64,
    pub admitted: u64,
    /// Rejection-reason label -> occurrence count.
    pub rejections: HashMap<String, u64>,
}

impl PipelineStats {
    pub(crate) fn record_rejection(&mut self, reason: &RejectReason) {
        *self.rejections.entry(reason.label().to_string()).or_insert(0) += 1;
    }

    /// Fraction of seen signals that were admitted. Historically the
    /// pipeline rejects 95%+ of candidates.
    pub fn pass_rate(&self) -> f64 {
        if self.signals_seen == 0 {
            return 0.0;
        }
        self.admitted as f64 / self.signals_seen as f64
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejections.values().sum()
    }
}
