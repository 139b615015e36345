//! Error types for expression evaluation and canonicalization.

use query_expr::{ExprError, Operator};
use thiserror::Error;

/// Errors that can occur while evaluating or canonicalizing expressions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Error from the expression crate (indexing, parsing).
    #[error("expression error: {0}")]
    Expression(#[from] ExprError),

    /// Operands of different types were compared.
    #[error("cannot compare {left} with {right}")]
    TypeMismatch {
        /// Type of the subject value.
        left: &'static str,
        /// Type of the condition value.
        right: &'static str,
    },

    /// Operands that have no ordering (lists, NaN).
    #[error("values are not comparable: {0}")]
    NotComparable(String),

    /// Operator that evaluation does not support.
    #[error("unsupported comparison operator: {0}")]
    UnsupportedOperator(Operator),

    /// Divide-and-conquer threshold below 1.
    #[error("invalid threshold {0}: must be at least 1")]
    InvalidThreshold(usize),

    /// A compound without children nested inside another expression.
    #[error("empty compound expression cannot be canonicalized")]
    EmptyCompound,
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_type_mismatch() {
        let err = EngineError::TypeMismatch {
            left: "integer",
            right: "string",
        };
        assert_eq!(err.to_string(), "cannot compare integer with string");
    }

    #[test]
    fn test_error_display_unsupported_operator() {
        let err = EngineError::UnsupportedOperator(Operator::In);
        assert_eq!(err.to_string(), "unsupported comparison operator: IN");
    }

    #[test]
    fn test_error_from_expr_error() {
        let err: EngineError = ExprError::IndexOutOfBounds { index: 1, len: 0 }.into();
        assert!(matches!(err, EngineError::Expression(_)));
    }
}
