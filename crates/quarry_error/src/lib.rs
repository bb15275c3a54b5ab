//! Error type shared across the quarry crates.

use std::fmt;

/// Classification of an engine error.
///
/// Every error carries a kind so callers can branch on failure class
/// without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No registered implementation matches an operation and its operand
    /// types.
    NoImplementationFound,
    /// A logical type has no native runtime mapping, or a runtime value
    /// cannot be classified.
    UnsupportedType,
    /// A value is not representable as the requested target type.
    Cast,
    /// Row-wise combination of arrays with inconsistent lengths.
    ShapeMismatch,
    /// A time-restricted table has no designated time column.
    MissingTimeColumn,
    /// Structurally invalid aggregation, e.g. a having filter without
    /// grouping keys.
    InvalidAggregation,
    /// A logically valid operation that is intentionally unimplemented.
    OperationNotDefined,
    /// Broken internal invariant.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoImplementationFound => write!(f, "no implementation found"),
            Self::UnsupportedType => write!(f, "unsupported type"),
            Self::Cast => write!(f, "cast error"),
            Self::ShapeMismatch => write!(f, "shape mismatch"),
            Self::MissingTimeColumn => write!(f, "missing time column"),
            Self::InvalidAggregation => write!(f, "invalid aggregation"),
            Self::OperationNotDefined => write!(f, "operation not defined"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}: {msg}")]
pub struct EngineError {
    kind: ErrorKind,
    msg: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        EngineError {
            kind,
            msg: msg.into(),
        }
    }

    /// Internal invariant violation.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    pub fn unsupported_type(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedType, msg)
    }

    pub fn cast(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cast, msg)
    }

    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ShapeMismatch, msg)
    }

    pub fn invalid_aggregation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidAggregation, msg)
    }

    pub fn operation_not_defined(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::OperationNotDefined, msg)
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = EngineError::cast("cannot cast Boolean to Timestamp");
        assert_eq!(err.kind(), ErrorKind::Cast);
        assert_eq!(
            err.to_string(),
            "cast error: cannot cast Boolean to Timestamp"
        );
    }
}
