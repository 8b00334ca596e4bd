//! Error types for the reconciler crate.
//!
//! Every variant here is transient: the loop logs it and relies on the next
//! poll cycle to converge.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Listing properties from the registry failed.
    #[error("property source failed: {reason}")]
    SourceFailed { reason: String },
    /// The target document does not exist.
    #[error("document '{document}' not found")]
    NotFound { document: String },
    /// A document store call failed.
    #[error("document store {operation} failed: {reason}")]
    StoreFailed { operation: String, reason: String },
    /// A document store call did not finish in time.
    #[error("document store {operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },
    /// The merged file could not be serialized.
    #[error("failed to encode '{file_name}': {reason}")]
    EncodeFailed { file_name: String, reason: String },
}

impl Error {
    /// Create a source failed error.
    pub fn source_failed(reason: impl Into<String>) -> Self {
        Self::SourceFailed {
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(document: impl Into<String>) -> Self {
        Self::NotFound {
            document: document.into(),
        }
    }

    /// Create a store failed error.
    pub fn store_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoreFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Create an encode failed error.
    pub fn encode_failed(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EncodeFailed {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }
}
