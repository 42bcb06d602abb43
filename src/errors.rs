//! Error types for query compilation and execution
//!
//! Error codes follow the `DEEGREE_<AREA>_<NAME>` format. Every error carries a
//! severity:
//! - `REJECT`: the request is invalid; nothing reached the database
//! - `ERROR`: the database or the output sink failed
//! - `DEFECT`: an internal invariant broke; the request is abandoned

use std::fmt;
use std::io;

use thiserror::Error;

use crate::mapping::MappingError;

/// Severity attached to a [`QueryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Request-level validation failure, recovered by the caller
    Reject,
    /// Database or I/O failure, surfaced with its cause
    Error,
    /// Internal invariant violation, fatal to the request
    Defect,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Reject => "REJECT",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Defect => "DEFECT",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failures raised by the database backend or the connection pool
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Pool(#[from] r2d2::Error),
}

/// Errors produced while compiling, assembling or executing a query
#[derive(Debug, Error)]
pub enum QueryError {
    // ==================
    // Compilation
    // ==================
    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error("unsupported comparison shape: {0}")]
    UnsupportedComparisonShape(String),

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("invalid literal '{value}' for property '{property}': expected {expected}")]
    InvalidLiteral {
        property: String,
        value: String,
        expected: &'static str,
    },

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("invalid paging: {0}")]
    InvalidPaging(String),

    // ==================
    // Assembly
    // ==================
    #[error("statement has {placeholders} placeholders but {parameters} parameters")]
    ParameterCountMismatch { placeholders: usize, parameters: usize },

    // ==================
    // Execution
    // ==================
    #[error("execution failed while {context}: {source}")]
    ExecutionFailed {
        context: String,
        #[source]
        source: BackendError,
    },

    #[error("cannot decode column '{column}': {reason}")]
    RowDecode { column: String, reason: String },

    #[error("failed to write record output: {0}")]
    Output(#[from] io::Error),

    // ==================
    // Configuration
    // ==================
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl QueryError {
    pub fn unknown_property(name: impl Into<String>) -> Self {
        QueryError::UnknownProperty(name.into())
    }

    pub fn unsupported_shape(message: impl Into<String>) -> Self {
        QueryError::UnsupportedComparisonShape(message.into())
    }

    pub fn unsupported_operator(message: impl Into<String>) -> Self {
        QueryError::UnsupportedOperator(message.into())
    }

    pub fn execution_failed(context: impl Into<String>, source: impl Into<BackendError>) -> Self {
        QueryError::ExecutionFailed {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn row_decode(column: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::RowDecode {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::UnknownProperty(_) => "DEEGREE_QUERY_UNKNOWN_PROPERTY",
            QueryError::UnsupportedComparisonShape(_) => "DEEGREE_QUERY_UNSUPPORTED_SHAPE",
            QueryError::UnsupportedOperator(_) => "DEEGREE_QUERY_UNSUPPORTED_OPERATOR",
            QueryError::InvalidLiteral { .. } => "DEEGREE_QUERY_INVALID_LITERAL",
            QueryError::InvalidEnvelope(_) => "DEEGREE_QUERY_INVALID_ENVELOPE",
            QueryError::InvalidPaging(_) => "DEEGREE_QUERY_INVALID_PAGING",
            QueryError::ParameterCountMismatch { .. } => "DEEGREE_STATEMENT_PARAMETER_MISMATCH",
            QueryError::ExecutionFailed { .. } => "DEEGREE_EXECUTION_FAILED",
            QueryError::RowDecode { .. } => "DEEGREE_EXECUTION_ROW_DECODE",
            QueryError::Output(_) => "DEEGREE_OUTPUT_FAILED",
            QueryError::Mapping(_) => "DEEGREE_CONFIG_MAPPING",
            QueryError::Config(_) => "DEEGREE_CONFIG_INVALID",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            QueryError::UnknownProperty(_)
            | QueryError::UnsupportedComparisonShape(_)
            | QueryError::UnsupportedOperator(_)
            | QueryError::InvalidLiteral { .. }
            | QueryError::InvalidEnvelope(_)
            | QueryError::InvalidPaging(_)
            | QueryError::Mapping(_)
            | QueryError::Config(_) => ErrorSeverity::Reject,
            QueryError::ExecutionFailed { .. }
            | QueryError::RowDecode { .. }
            | QueryError::Output(_) => ErrorSeverity::Error,
            QueryError::ParameterCountMismatch { .. } => ErrorSeverity::Defect,
        }
    }

    /// True when the failure indicates a defect rather than bad input or a
    /// database problem. Fatal to the current request only.
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Defect
    }

    /// True when the error was raised before any statement reached the database
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self,
            QueryError::UnknownProperty(_)
                | QueryError::UnsupportedComparisonShape(_)
                | QueryError::UnsupportedOperator(_)
                | QueryError::InvalidLiteral { .. }
                | QueryError::InvalidEnvelope(_)
                | QueryError::InvalidPaging(_)
                | QueryError::ParameterCountMismatch { .. }
        )
    }

    /// One-line report in `[SEVERITY] CODE: message` form, used in log fields
    pub fn report(&self) -> String {
        format!("[{}] {}: {}", self.severity(), self.code(), self)
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_property_is_reject() {
        let err = QueryError::unknown_property("doesNotExist");
        assert_eq!(err.severity(), ErrorSeverity::Reject);
        assert_eq!(err.code(), "DEEGREE_QUERY_UNKNOWN_PROPERTY");
        assert!(!err.is_fatal());
        assert!(err.is_compile_time());
    }

    #[test]
    fn test_parameter_mismatch_is_defect() {
        let err = QueryError::ParameterCountMismatch {
            placeholders: 2,
            parameters: 1,
        };
        assert!(err.is_fatal());
        assert_eq!(err.severity(), ErrorSeverity::Defect);
    }

    #[test]
    fn test_execution_failed_keeps_cause() {
        use std::error::Error;

        let err = QueryError::execution_failed(
            "counting rows",
            rusqlite::Error::InvalidQuery,
        );
        assert_eq!(err.severity(), ErrorSeverity::Error);
        assert!(!err.is_compile_time());
        assert!(err.source().is_some());
    }

    #[test]
    fn test_report_format() {
        let err = QueryError::unsupported_operator("temporal filter");
        let report = err.report();
        assert!(report.starts_with("[REJECT] DEEGREE_QUERY_UNSUPPORTED_OPERATOR"));
        assert!(report.contains("temporal filter"));
    }
}
