//! Startup error types.
//!
//! All of these abort the process before the reconciliation loop starts.

use thiserror::Error;

/// Core error type for configuration and bootstrap.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("invalid log level '{value}'")]
    InvalidLogLevel { value: String },

    #[error("invalid duration '{value}' for {field}")]
    InvalidDuration { field: String, value: String },

    #[error("invalid translation map entry '{entry}': expected key:value")]
    InvalidTranslationMap { entry: String },
}

impl Error {
    /// Create an invalid config error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid log level error.
    pub fn invalid_log_level(value: impl Into<String>) -> Self {
        Self::InvalidLogLevel {
            value: value.into(),
        }
    }

    /// Create an invalid duration error.
    pub fn invalid_duration(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidDuration {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create an invalid translation map error.
    pub fn invalid_translation_map(entry: impl Into<String>) -> Self {
        Self::InvalidTranslationMap {
            entry: entry.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_config("NSM_NAMESPACE", "must not be empty");
        assert!(err.to_string().contains("NSM_NAMESPACE"));
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_translation_map_error_names_entry() {
        let err = Error::invalid_translation_map("broken");
        assert!(err.to_string().contains("'broken'"));
    }
}
