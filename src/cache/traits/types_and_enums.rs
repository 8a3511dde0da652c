//! Error taxonomy shared by the cache tiers and the cost resolver
//!
//! Normal cache misses are `Option::None` everywhere; the variants below are
//! reserved for conditions a caller has to react to.

use std::fmt;

/// Cache and resolution error
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOperationError {
    /// Internal invariant broken (index/sequence mismatch, dangling slot)
    ConsistencyError(String),
    /// Key absent where the caller assumed presence
    NotFound,
    /// Stage cannot answer (no predictor, service unreachable or silent)
    Unavailable(String),
    /// Predictor output outside the sane interval
    InvalidOutputRange { value: f32, low: f32, high: f32 },
    /// Workload rejected by the sanitizer
    InvalidInput(String),
    /// File missing, unreadable, malformed or write refused
    Io(String),
    /// Builder or configuration file problem
    ConfigurationError(String),
    /// Configuration could not be parsed or written
    SerializationError(String),
    /// External measurement service reported a hard failure
    ServiceError(String),
}

impl fmt::Display for CacheOperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOperationError::ConsistencyError(msg) => {
                write!(f, "Cache consistency violated: {}", msg)
            }
            CacheOperationError::NotFound => write!(f, "Not found"),
            CacheOperationError::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
            CacheOperationError::InvalidOutputRange { value, low, high } => write!(
                f,
                "Predictor output {} outside of valid interval [{}, {}]",
                value, low, high
            ),
            CacheOperationError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            CacheOperationError::Io(msg) => write!(f, "I/O error: {}", msg),
            CacheOperationError::ConfigurationError(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            CacheOperationError::SerializationError(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            CacheOperationError::ServiceError(msg) => write!(f, "Measurement service error: {}", msg),
        }
    }
}

impl std::error::Error for CacheOperationError {}

impl CacheOperationError {
    /// Create consistency error
    #[inline(always)]
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::ConsistencyError(msg.into())
    }

    /// Create unavailable error
    #[inline(always)]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create IO error
    #[inline(always)]
    pub fn io_failed(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Create configuration error
    #[inline(always)]
    pub fn configuration_error(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create service error
    #[inline(always)]
    pub fn service_failed(msg: impl Into<String>) -> Self {
        Self::ServiceError(msg.into())
    }

    /// True when the resolution chain must stop instead of trying the next stage
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CacheOperationError::ConsistencyError(_)
                | CacheOperationError::InvalidOutputRange { .. }
                | CacheOperationError::InvalidInput(_)
                | CacheOperationError::ServiceError(_)
        )
    }
}

impl From<std::io::Error> for CacheOperationError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CacheOperationError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(CacheOperationError::consistency("x").is_terminal());
        assert!(
            CacheOperationError::InvalidOutputRange {
                value: -1.0,
                low: 0.0,
                high: 10.0
            }
            .is_terminal()
        );
        assert!(CacheOperationError::service_failed("down hard").is_terminal());
        assert!(!CacheOperationError::unavailable("no model").is_terminal());
        assert!(!CacheOperationError::NotFound.is_terminal());
        assert!(!CacheOperationError::io_failed("missing").is_terminal());
    }

    #[test]
    fn test_io_conversion() {
        let err: CacheOperationError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, CacheOperationError::Io(ref msg) if msg.contains("gone")));
    }
}
