//! Error types
//!
//! Rejections of hostile input (disallowed URL schemes, capped collectors) are
//! flags on the data, not errors. The errors here cover programmer misuse,
//! input admission and collector faults.

use std::time::Duration;
use thiserror::Error;

/// Warehouse error type
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// A collector was registered after dispatch started
    #[error("Registration closed: cannot register collector '{name}' after dispatch started")]
    RegistrationClosed { name: String },

    /// `dispatch_all` was called a second time
    #[error("Dispatch already ran for this document")]
    AlreadyDispatched,

    /// Two collectors share an output name
    #[error("Duplicate collector name: {name}")]
    DuplicateCollector { name: String },

    /// More distinct ignore-subtree types than the routing mask can hold
    #[error("Too many ignore-subtree types: {count} (max {max})")]
    TooManyIgnoreTypes { count: usize, max: usize },

    /// Source text exceeds the configured limit
    #[error("Document too large: {size} bytes (max {max} bytes)")]
    DocumentTooLarge { size: usize, max: usize },

    /// Token stream exceeds the configured limit
    #[error("Too many tokens: {count} (max {max})")]
    TooManyTokens { count: usize, max: usize },

    /// A collector failed under the strict fault policy
    #[error("Collector '{name}' failed: {source}")]
    Collector {
        name: String,
        #[source]
        source: CollectorError,
    },
}

/// Specialized Result type for warehouse operations
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// Errors raised by collectors
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Collector-specific failure
    #[error("{0}")]
    Failed(String),

    /// `finalize()` ran past its budget
    #[error("Timed out after {elapsed:?} (budget {budget:?})")]
    Timeout { budget: Duration, elapsed: Duration },

    /// The collector panicked (lenient policy only)
    #[error("Panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CollectorError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WarehouseError::DocumentTooLarge { size: 1000, max: 500 };
        assert_eq!(err.to_string(), "Document too large: 1000 bytes (max 500 bytes)");

        let err = WarehouseError::Collector {
            name: "links".into(),
            source: CollectorError::failed("boom"),
        };
        assert_eq!(err.to_string(), "Collector 'links' failed: boom");
    }

    #[test]
    fn test_timeout_classification() {
        let err = CollectorError::Timeout {
            budget: Duration::from_millis(10),
            elapsed: Duration::from_millis(20),
        };
        assert!(err.is_timeout());
        assert!(!CollectorError::failed("x").is_timeout());
    }

    #[test]
    fn test_anyhow_conversion() {
        fn inner() -> Result<(), CollectorError> {
            let n: i32 = "nope".parse().map_err(anyhow::Error::from)?;
            let _ = n;
            Ok(())
        }
        assert!(matches!(inner(), Err(CollectorError::Other(_))));
    }
}
