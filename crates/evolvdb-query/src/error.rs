//! Error types for planning and execution.

use evolvdb_core::CoreError;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Broad classification of a [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The query references something that does not resolve, or mixes types.
    Binding,
    /// The planner met a plan it cannot handle. Indicates a bug, not user error.
    Planning,
    /// An operator failed while producing rows.
    Execution,
}

/// Errors raised while rewriting, planning or executing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A column reference does not resolve.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// An unqualified column exists on both sides of a join.
    #[error("ambiguous column: {0}")]
    AmbiguousColumn(String),

    /// A qualifier matches neither side of a join.
    #[error("unknown table qualifier: {0}")]
    UnknownTableQualifier(String),

    /// An operand has the wrong type for its operator.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: String,
        /// The actual type.
        actual: String,
    },

    /// An aggregate call reached the scalar evaluator.
    #[error("aggregate {0} cannot be evaluated in scalar context")]
    AggregateInScalarContext(String),

    /// A row has the wrong number of values.
    #[error("expected {expected} values, got {actual}")]
    ArityMismatch {
        /// Expected count.
        expected: usize,
        /// Actual count.
        actual: usize,
    },

    /// No rule produced a physical plan for a logical node.
    #[error("no physical alternative for {0}")]
    NoPhysicalAlternative(String),

    /// The planner does not support this logical node here.
    #[error("unsupported logical node: {0}")]
    UnsupportedLogicalNode(String),

    /// An INSERT left a column without a value.
    #[error("column {0} not specified in INSERT and has no default")]
    MissingColumnDefault(String),

    /// Overflow or integer division by zero.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// An operator method was called in the wrong lifecycle state.
    #[error("invalid operator state: {0}")]
    InvalidState(String),

    /// The storage or type layer failed.
    #[error(transparent)]
    Storage(#[from] CoreError),
}

impl QueryError {
    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch { expected: expected.into(), actual: actual.into() }
    }

    /// Returns the category of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownColumn(_)
            | Self::AmbiguousColumn(_)
            | Self::UnknownTableQualifier(_)
            | Self::TypeMismatch { .. }
            | Self::AggregateInScalarContext(_)
            | Self::ArityMismatch { .. } => ErrorCategory::Binding,
            Self::NoPhysicalAlternative(_) | Self::UnsupportedLogicalNode(_) => {
                ErrorCategory::Planning
            }
            Self::MissingColumnDefault(_)
            | Self::Arithmetic(_)
            | Self::InvalidState(_)
            | Self::Storage(_) => ErrorCategory::Execution,
        }
    }
}
