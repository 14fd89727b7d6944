use std::fmt;

/// Result type for ember operations
pub type Result<T> = std::result::Result<T, EmberError>;

/// Main error type for the ember engine
#[derive(Debug, Clone)]
pub enum EmberError {
    /// Invalid dimensions for operations
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Action index outside the configured action space
    InvalidAction {
        action: usize,
        action_size: usize,
    },

    /// IO errors (blob store, file operations)
    IoError(String),

    /// Serialization/deserialization errors
    SerializationError(String),

    /// Numeric backend failures (malformed tensors, failed fit)
    NumericError(String),

    /// A checkpoint artifact was not found in the store
    NotFound(String),
}

impl fmt::Display for EmberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmberError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            EmberError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            EmberError::InvalidAction { action, action_size } => {
                write!(f, "Invalid action {}: must be less than {}", action, action_size)
            }
            EmberError::IoError(msg) => write!(f, "IO error: {}", msg),
            EmberError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            EmberError::NumericError(msg) => write!(f, "Numeric error: {}", msg),
            EmberError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl std::error::Error for EmberError {}

// Conversion from std::io::Error
impl From<std::io::Error> for EmberError {
    fn from(err: std::io::Error) -> Self {
        EmberError::IoError(err.to_string())
    }
}

// Conversion from bincode::Error
impl From<bincode::Error> for EmberError {
    fn from(err: bincode::Error) -> Self {
        EmberError::SerializationError(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for EmberError {
    fn from(err: serde_json::Error) -> Self {
        EmberError::SerializationError(err.to_string())
    }
}

// Helper functions for common error patterns
impl EmberError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        EmberError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        EmberError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
