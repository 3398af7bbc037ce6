//! Decision core of a whale copy-trading platform for prediction markets.
//!
//! Three subsystems turn one observed whale trade into an admit/reject
//! decision with a risk-bounded size, without lookahead:
//!
//! - [`pipeline::SignalPipeline`]: three cascading filter stages (trader
//!   fitness, trade economics, portfolio fit) that reject most candidates
//!   before any capital is committed.
//! - [`execution::AdaptiveKellySizer`]: risk-adjusted Kelly sizing with
//!   confidence, volatility, correlation and drawdown factors.
//! - [`risk::RiskManager`]: Cornish-Fisher VaR and limit alerts, the whale
//!   quarantine state machine, and ATR trailing stops.
//!
//! All I/O stays at the boundary: callers hand in trader, market and
//! portfolio state through the [`providers`] traits, and every decision is
//! a synchronous function of that point-in-time snapshot.

pub mod config;
pub mod errors;
pub mod execution;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod risk;
pub mod services;
pub mod telemetry;

pub use config::CoreConfig;
pub use errors::CoreError;
pub use execution::{AdaptiveKellySizer, PositionSizeResult, SizeRequest};
pub use models::{ExecutableSignal, RejectReason, WhaleSignal};
pub use pipeline::{PipelineOutcome, SignalPipeline};
pub use risk::{RiskAlert, RiskManager, RiskMetrics};
