//! Errors raised while loading or validating a property mapping

use std::io;

use thiserror::Error;

/// A property mapping could not be loaded or is inconsistent
///
/// Raised at store initialization; never during query compilation.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to read mapping file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed mapping document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid identifier '{identifier}' in {context}")]
    InvalidIdentifier { identifier: String, context: String },

    #[error("join path of property '{property}' is broken: {reason}")]
    BrokenJoinPath { property: String, reason: String },

    #[error("property '{0}' is declared more than once")]
    DuplicateProperty(String),

    #[error("{role} property '{property}' is not declared")]
    UndeclaredRoleProperty { role: &'static str, property: String },

    #[error("identifier pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}

impl MappingError {
    pub fn invalid_identifier(identifier: impl Into<String>, context: impl Into<String>) -> Self {
        MappingError::InvalidIdentifier {
            identifier: identifier.into(),
            context: context.into(),
        }
    }

    pub fn broken_join_path(property: impl Into<String>, reason: impl Into<String>) -> Self {
        MappingError::BrokenJoinPath {
            property: property.into(),
            reason: reason.into(),
        }
    }
}

pub type MappingResult<T> = Result<T, MappingError>;
