//! Transit client error types using thiserror 2.0.
//!
//! Provides engine-specific errors with retryability classification so the
//! circuit breaker only trips on transient failures.

use crate::store::StoreError;
use thiserror::Error;

/// Transit client errors.
#[derive(Error, Debug)]
pub enum TransitError {
    /// Login or token renewal failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Engine unreachable, sealed, or answering 5xx
    #[error("Transit engine unavailable: {0}")]
    Unavailable(String),

    /// Engine rejected a single encrypt/decrypt/rewrap operation
    #[error("Cipher operation failed: {0}")]
    CipherOperation(String),

    /// One item inside a batch failed; `index` is the caller's input position
    #[error("Batch item {index} failed: {reason}")]
    BatchItem {
        /// Position of the failing value in the caller's input
        index: usize,
        /// Engine-reported reason
        reason: String,
    },

    /// Token lacks a policy for the requested path
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limited
    #[error("Rate limited")]
    RateLimited,

    /// Circuit breaker open
    #[error("Circuit breaker open")]
    CircuitOpen,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record store failure
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for transit operations.
pub type TransitResult<T> = Result<T, TransitError>;

impl TransitError {
    /// Check if the error is transient and worth counting against the breaker.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::RateLimited | Self::Http(_)
        )
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an authentication failed error.
    #[must_use]
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// Create a cipher operation error.
    #[must_use]
    pub fn cipher(msg: impl Into<String>) -> Self {
        Self::CipherOperation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransitError::unavailable("connection refused");
        assert_eq!(
            err.to_string(),
            "Transit engine unavailable: connection refused"
        );

        let err = TransitError::BatchItem {
            index: 2,
            reason: "invalid ciphertext".to_string(),
        };
        assert_eq!(err.to_string(), "Batch item 2 failed: invalid ciphertext");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(TransitError::Unavailable("timeout".to_string()).is_retryable());
        assert!(TransitError::RateLimited.is_retryable());
        assert!(!TransitError::auth_failed("bad role").is_retryable());
        assert!(!TransitError::cipher("bad payload").is_retryable());
        assert!(!TransitError::CircuitOpen.is_retryable());
    }

    #[test]
    fn test_from_store_error() {
        let store_err = StoreError::new("cursor expired");
        let err: TransitError = store_err.into();
        assert!(matches!(err, TransitError::Store(_)));
    }
}
