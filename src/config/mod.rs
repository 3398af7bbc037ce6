use rust_decimal::Decimal;
use std::env;

use crate::execution::SizerConfig;
use crate::pipeline::PipelineConfig;
use crate::risk::{QuarantineConfig, RiskLimits, RiskMetricsConfig, StopConfig};

/// Aggregated configuration for the decision core. Every field has the
/// documented default; env vars override individually. Unparseable values
/// fall back to the default rather than aborting, matching how the rest of
/// the platform treats tuning knobs.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub pipeline: PipelineConfig,
    pub sizer: SizerConfig,
    pub limits: RiskLimits,
    pub metrics: RiskMetricsConfig,
    pub quarantine: QuarantineConfig,
    pub stops: StopConfig,
    /// Risk poller cadence in seconds.
    pub risk_poll_interval_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            sizer: SizerConfig::default(),
            limits: RiskLimits::default(),
            metrics: RiskMetricsConfig::default(),
            quarantine: QuarantineConfig::default(),
            stops: StopConfig::default(),
            risk_poll_interval_secs: 60,
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = CoreConfig::default();

        // Pipeline
        config.pipeline.min_quality_score =
            env_f64("MIN_QUALITY_SCORE", config.pipeline.min_quality_score);
        config.pipeline.max_trader_drawdown =
            env_f64("MAX_TRADER_DRAWDOWN", config.pipeline.max_trader_drawdown);
        config.pipeline.min_notional = env_decimal("MIN_NOTIONAL", config.pipeline.min_notional);
        config.pipeline.max_slippage = env_f64("MAX_SLIPPAGE", config.pipeline.max_slippage);
        config.pipeline.max_days_to_resolution = env_i64(
            "MAX_DAYS_TO_RESOLUTION",
            config.pipeline.max_days_to_resolution,
        );
        config.pipeline.min_edge = env_f64("MIN_EDGE", config.pipeline.min_edge);
        config.pipeline.default_win_rate =
            env_f64("DEFAULT_WIN_RATE", config.pipeline.default_win_rate);
        config.pipeline.max_correlation =
            env_f64("MAX_CORRELATION", config.pipeline.max_correlation);
        config.pipeline.max_total_exposure =
            env_f64("MAX_TOTAL_EXPOSURE", config.pipeline.max_total_exposure);
        config.pipeline.max_category_exposure =
            env_f64("MAX_CATEGORY_EXPOSURE", config.pipeline.max_category_exposure);

        // Sizer
        config.sizer.half_kelly = env_bool("HALF_KELLY", config.sizer.half_kelly);
        config.sizer.max_fraction = env_f64("MAX_POSITION_FRACTION", config.sizer.max_fraction);
        config.sizer.min_fraction = env_f64("MIN_POSITION_FRACTION", config.sizer.min_fraction);
        config.sizer.ewma_lambda = env_f64("EWMA_LAMBDA", config.sizer.ewma_lambda);

        // Risk limits + metrics
        config.limits.max_mvar = env_f64("MAX_MVAR", config.limits.max_mvar);
        config.limits.max_correlation =
            env_f64("MAX_PORTFOLIO_CORRELATION", config.limits.max_correlation);
        config.limits.max_category_concentration = env_f64(
            "MAX_CATEGORY_CONCENTRATION",
            config.limits.max_category_concentration,
        );
        config.limits.max_total_exposure =
            env_f64("MAX_EXPOSURE_LIMIT", config.limits.max_total_exposure);
        config.metrics.confidence = env_f64("VAR_CONFIDENCE", config.metrics.confidence);

        // Quarantine
        config.quarantine.min_sharpe =
            env_f64("QUARANTINE_MIN_SHARPE", config.quarantine.min_sharpe);
        config.quarantine.max_drawdown =
            env_f64("QUARANTINE_MAX_DRAWDOWN", config.quarantine.max_drawdown);
        config.quarantine.min_consistency =
            env_f64("QUARANTINE_MIN_CONSISTENCY", config.quarantine.min_consistency);
        config.quarantine.strikes_before_quarantine = env_u32(
            "QUARANTINE_STRIKES",
            config.quarantine.strikes_before_quarantine,
        );
        config.quarantine.quarantine_days =
            env_i64("QUARANTINE_DAYS", config.quarantine.quarantine_days);

        // Stops
        config.stops.atr_window = env_usize("ATR_WINDOW", config.stops.atr_window);
        config.stops.atr_multiplier = env_decimal("ATR_MULTIPLIER", config.stops.atr_multiplier);
        config.stops.trailing_activation = env_decimal(
            "TRAILING_ACTIVATION",
            config.stops.trailing_activation,
        );

        config.risk_poll_interval_secs =
            env_u64("RISK_POLL_INTERVAL_SECS", config.risk_poll_interval_secs);

        Ok(config)
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_decimal(key: &str, default: Decimal) -> Decimal {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
