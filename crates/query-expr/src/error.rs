//! Error types for expression construction and parsing.

use thiserror::Error;

/// Errors that can occur while building, mutating or parsing expressions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// A child or operator index outside `[0, len)`.
    #[error("index {index} out of bounds for expression with {len} sub-expressions")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// Number of sub-expressions in the node.
        len: usize,
    },

    /// A logical combinator other than AND/OR.
    #[error("invalid logical operator: {0}")]
    InvalidLogicalOperator(String),

    /// A comparison operator that is not part of the grammar.
    #[error("invalid comparison operator: {0}")]
    InvalidOperator(String),

    /// An operator side other than left/right.
    #[error("invalid operator side: {0}")]
    InvalidSide(String),

    /// A literal that is neither a string, list, null, boolean, date nor number.
    #[error("invalid literal at position {position}: '{literal}'")]
    InvalidLiteral {
        /// Position in the input where the literal starts.
        position: usize,
        /// The literal text.
        literal: String,
    },

    /// A malformed sort specification.
    #[error("invalid sort specification: {0}")]
    InvalidSort(String),
}

/// Result type for expression operations.
pub type ExprResult<T> = std::result::Result<T, ExprError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_out_of_bounds() {
        let err = ExprError::IndexOutOfBounds { index: 3, len: 2 };
        assert_eq!(
            err.to_string(),
            "index 3 out of bounds for expression with 2 sub-expressions"
        );
    }

    #[test]
    fn test_error_display_invalid_literal() {
        let err = ExprError::InvalidLiteral {
            position: 12,
            literal: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "invalid literal at position 12: 'abc'");
    }
}
