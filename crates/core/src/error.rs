//! Error types for the FinQA domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all FinQA operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Gateway transport errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Expression evaluation errors ---
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Transport-level failures talking to a reasoning backend.
///
/// A reply that arrives but does not match the requested schema is *not*
/// an error; the gateway reports it as an empty result instead.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether no later request can succeed either (bad credentials, no backend).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed(_) | Self::NotConfigured(_) | Self::ModelNotFound(_)
        )
    }
}

/// Failures from the sandboxed expression evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Malformed text or a name outside the sandbox.
    #[error("Invalid expression syntax: {message} in `{expression}`")]
    InvalidExpression { expression: String, message: String },

    /// Well-formed expression that failed during evaluation.
    #[error("Calculation failed: {message} in `{expression}`")]
    Calculation { expression: String, message: String },
}

impl EvalError {
    /// The offending expression text.
    pub fn expression(&self) -> &str {
        match self {
            Self::InvalidExpression { expression, .. } | Self::Calculation { expression, .. } => {
                expression
            }
        }
    }
}
