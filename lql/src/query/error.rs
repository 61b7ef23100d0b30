//! Umbrella error for turning query text into a runnable query.

use super::lexer::LexError;
use super::parser::ParseError;
use super::validator::{SemanticError, ValidationResult};
use thiserror::Error;

/// Any error between query text and a `CompiledQuery`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The text did not tokenize or parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The query parsed but did not validate.
    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

impl QueryError {
    /// Byte offset of the error in the query text.
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::Parse(e) => e.position(),
            Self::Semantic(e) => e.offset(),
        }
    }

    /// Replacement candidates for the offending token, best first.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::Parse(_) => &[],
            Self::Semantic(e) => e.suggestions(),
        }
    }
}

impl From<LexError> for QueryError {
    fn from(error: LexError) -> Self {
        Self::Parse(error.into())
    }
}

impl From<&QueryError> for ValidationResult {
    fn from(error: &QueryError) -> Self {
        match error {
            QueryError::Parse(e) => e.into(),
            QueryError::Semantic(e) => e.into(),
        }
    }
}
