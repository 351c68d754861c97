//! Core Error Types
//!
//! Defines the foundational error type of the Proof Cascade workspace.
//! It is dependency-free (only thiserror + std) to keep the core crate
//! lightweight.

use thiserror::Error;

/// Core error type for the Proof Cascade workspace.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A wire value that does not name any known variant
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::parse("unknown step status 'maybe'");
        assert_eq!(err.to_string(), "Parse error: unknown step status 'maybe'");
    }
}
