pub mod risk_poller;

pub use risk_poller::run_risk_poller;
