use thiserror::Error;

use crate::parameters::{ParameterName, ParameterValue};

/// Main error type for the Hypersweep system
#[derive(Error, Debug)]
pub enum HsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameters: {parameters}")]
    InvalidParameter { parameters: String },

    #[error("Dispatch rejected: {reason}")]
    DispatchRejected { reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Parameter {name} assigned twice: {existing} and {incoming}")]
    ConflictingAssignment {
        name: ParameterName,
        existing: ParameterValue,
        incoming: ParameterValue,
    },

    #[error("No jobs left to explore")]
    NoJobsLeft,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised at the results store boundary
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Results store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Corrupted record at line {line}: {message}")]
    Corrupted { line: usize, message: String },
}

impl HsError {
    /// Whether the orchestration loop may retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HsError::Store(StoreError::Unavailable { .. }))
    }
}

/// Result type alias for Hypersweep operations
pub type HsResult<T> = Result<T, HsError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HsError::Config(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::HsError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = HsError::ConflictingAssignment {
            name: ParameterName::new("lr"),
            existing: ParameterValue::Float(0.1),
            incoming: ParameterValue::Float(0.01),
        };

        let message = error.to_string();
        assert!(message.contains("lr"));
        assert!(message.contains("0.1"));
        assert!(message.contains("0.01"));
    }

    #[test]
    fn test_store_error_conversion() {
        let store_error = StoreError::Unavailable {
            message: "connection refused".to_string(),
        };
        let hs_error: HsError = store_error.into();

        assert!(hs_error.is_retryable());
        match hs_error {
            HsError::Store(StoreError::Unavailable { .. }) => (),
            _ => panic!("Expected Store error"),
        }
    }

    #[test]
    fn test_corruption_is_not_retryable() {
        let err: HsError = StoreError::Corrupted {
            line: 3,
            message: "eof".into(),
        }
        .into();
        assert!(!err.is_retryable());
        assert!(!HsError::NoJobsLeft.is_retryable());
    }

    #[test]
    fn test_macros() {
        let config_err = config_error!("Missing domain for parameter: {}", "lr");
        assert!(matches!(config_err, HsError::Config(_)));
        let internal_err = internal_error!("Something went wrong");
        assert!(matches!(internal_err, HsError::Internal(_)));
    }
}
