//! Errors surfaced by rule operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::rules::codec::CodecError;
use crate::rules::validation::FieldError;
use crate::storage::index::IndexError;

/// Error type for rule lifecycle operations.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("invalid rule name `{0}`: only letters, digits, '-' and '_' are allowed")]
    InvalidName(String),

    #[error("a rule named `{0}` already exists")]
    DuplicateName(String),

    #[error("rule `{0}` not found")]
    NotFound(String),

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl RuleError {
    /// Whether the caller sent something unacceptable, as opposed to a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RuleError::Validation(_)
                | RuleError::InvalidName(_)
                | RuleError::DuplicateName(_)
                | RuleError::NotFound(_)
        )
    }
}
