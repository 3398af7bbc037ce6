use thiserror::Error;

/// Hard failures surfaced by the decision core.
///
/// Business rejections and insufficient-data states are never errors: they
/// come back as values (`RejectReason`, zero-size results, degraded metrics)
/// because they are expected, high-frequency outcomes. `CoreError` is reserved
/// for contract violations that must halt processing of the offending signal.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed numeric input that caller-side validation should have
    /// excluded (negative NAV, non-finite probability). Not retryable.
    #[error("invalid input for {field}: {message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },

    /// A required external lookup (trader state, market data, portfolio
    /// snapshot) was not supplied. The pipeline never substitutes silent
    /// defaults for missing context: doing so would admit trades the real
    /// system would have rejected.
    #[error("missing context: no {dependency} available for {key}")]
    MissingContext {
        dependency: &'static str,
        key: String,
    },
}

impl CoreError {
    pub fn invalid_input(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            field,
            message: message.into(),
        }
    }

    pub fn missing_context(dependency: &'static str, key: impl Into<String>) -> Self {
        CoreError::MissingContext {
            dependency,
            key: key.into(),
        }
    }
}
