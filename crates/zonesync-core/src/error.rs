//! Error types for the zonesync engine
//!
//! This module defines all error types used throughout the crate, and the
//! classification the retry combinator and reconciler rely on.

use thiserror::Error;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the zonesync engine
#[derive(Error, Debug)]
pub enum Error {
    /// A mutation target falls outside the configured zone
    ///
    /// This is a security control, not a validation failure. It is never
    /// retried and is always logged under the `zonesync::security` target.
    #[error(
        "SECURITY: record name {name:?} is outside configured domain {root_domain:?} \
         (base domain: {base_domain:?}), refusing to modify"
    )]
    ScopeDenied {
        /// The rejected record name, as supplied by the caller
        name: String,
        /// Configured root domain
        root_domain: String,
        /// Configured base domain (equals root domain outside prefix mode)
        base_domain: String,
    },

    /// Transport-level timeout talking to the provider (retryable)
    #[error("Timeout ({provider}): {message}")]
    Timeout {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// HTTP transport errors other than timeouts
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The operation was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Mutation outside the configured zone
    ScopeDenied,
    /// Connect/timeout-class failure, safe to retry
    Transient,
    /// The provider rejected the request
    ProviderSemantic,
    /// External cancellation
    Cancelled,
    /// Configuration, serialization or other local failure
    Internal,
}

impl Error {
    /// Create a scope denial error
    pub fn scope_denied(
        name: impl Into<String>,
        root_domain: impl Into<String>,
        base_domain: impl Into<String>,
    ) -> Self {
        Self::ScopeDenied {
            name: name.into(),
            root_domain: root_domain.into(),
            base_domain: base_domain.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Timeout {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ScopeDenied { .. } => ErrorClass::ScopeDenied,
            Self::Timeout { .. } => ErrorClass::Transient,
            Self::Http(_)
            | Self::Authentication(_)
            | Self::RateLimited(_)
            | Self::NotFound(_)
            | Self::InvalidInput(_)
            | Self::Provider { .. } => ErrorClass::ProviderSemantic,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Config(_) | Self::Json(_) | Self::Other(_) => ErrorClass::Internal,
        }
    }

    /// Whether the retry combinator may retry this error
    ///
    /// Only transport-level timeouts qualify. Cancellation, scope denials and
    /// provider rejections fail on the first attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this is a security denial
    pub fn is_scope_denied(&self) -> bool {
        matches!(self, Self::ScopeDenied { .. })
    }

    /// Whether the provider reported the target as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error reports external cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
