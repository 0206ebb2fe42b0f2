use std::fmt;

use crate::oracle::OracleError;

/// Error types for the move learner
#[derive(Debug, Clone)]
pub enum LearnerError {
    /// Invalid chess position (unparsable or illegal FEN)
    InvalidPosition(String),
    /// Move id that does not parse or is not legal in the position
    InvalidMove(String),
    /// File I/O operation failed
    IoError(String),
    /// Memory file could not be encoded or decoded
    SerializationError(String),
    /// Configuration error
    ConfigurationError(String),
    /// Validation error with context
    ValidationError {
        field: String,
        value: String,
        expected: String,
    },
    /// Opponent oracle failure that could not be recovered locally
    OracleError(String),
}

impl fmt::Display for LearnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearnerError::InvalidPosition(msg) => write!(f, "Invalid position: {}", msg),
            LearnerError::InvalidMove(msg) => write!(f, "Invalid move: {}", msg),
            LearnerError::IoError(msg) => write!(f, "I/O error: {}", msg),
            LearnerError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            LearnerError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            LearnerError::ValidationError {
                field,
                value,
                expected,
            } => {
                write!(
                    f,
                    "Validation failed for field '{}': got '{}', expected '{}'",
                    field, value, expected
                )
            }
            LearnerError::OracleError(msg) => write!(f, "Oracle error: {}", msg),
        }
    }
}

impl std::error::Error for LearnerError {}

// Convenience type alias
pub type Result<T> = std::result::Result<T, LearnerError>;

impl From<std::io::Error> for LearnerError {
    fn from(error: std::io::Error) -> Self {
        LearnerError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for LearnerError {
    fn from(error: serde_json::Error) -> Self {
        LearnerError::SerializationError(format!("JSON error: {}", error))
    }
}

impl From<OracleError> for LearnerError {
    fn from(error: OracleError) -> Self {
        LearnerError::OracleError(error.to_string())
    }
}

#[macro_export]
macro_rules! invalid_position {
    ($msg:expr) => {
        $crate::errors::LearnerError::InvalidPosition($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::errors::LearnerError::InvalidPosition(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::errors::LearnerError::ConfigurationError($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::errors::LearnerError::ConfigurationError(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! validation_error {
    ($field:expr, $value:expr, $expected:expr) => {
        $crate::errors::LearnerError::ValidationError {
            field: $field.to_string(),
            value: $value.to_string(),
            expected: $expected.to_string(),
        }
    };
}
