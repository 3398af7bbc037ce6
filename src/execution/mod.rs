pub mod position_sizer;
pub mod volatility;

pub use position_sizer::{
    AdaptiveKellySizer, PositionSizeResult, SizeRequest, SizerConfig, SizingVerdict,
};
pub use volatility::{VolatilityEstimator, VolatilityRegistry, DEFAULT_EWMA_LAMBDA};
