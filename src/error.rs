//! Error types for the caching proxy
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for proxied calls.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The wrapped operation itself failed; passed through unchanged
    #[error(transparent)]
    Target(anyhow::Error),

    /// A store primitive failed unexpectedly
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Arguments could not be serialized for key derivation
    #[error("Cannot derive cache key for '{operation}': {source}")]
    Serialization {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// Replaying captured output to the sink failed
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    /// The target has no operation with this name
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}

impl CacheError {
    // == From Target ==
    /// Converts an error raised by a target back into a `CacheError`.
    ///
    /// Proxies are targets too, so errors from nested proxies arrive here
    /// wrapped in `anyhow`. Those are unwrapped so the caller sees the
    /// original variant rather than a `Target` around it.
    pub fn from_target(err: anyhow::Error) -> Self {
        match err.downcast::<CacheError>() {
            Ok(inner) => inner,
            Err(other) => CacheError::Target(other),
        }
    }

    // == Into Target ==
    /// Converts back into a target error, the inverse of [`Self::from_target`].
    pub fn into_target(self) -> anyhow::Error {
        match self {
            CacheError::Target(inner) => inner,
            other => anyhow::Error::new(other),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching proxy.
pub type Result<T> = std::result::Result<T, CacheError>;
