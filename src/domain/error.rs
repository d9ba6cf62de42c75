//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent malformed input the client itself interprets.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid cookbook version: {0}")]
    InvalidVersion(String),

    #[error("metadata.rb line {line}: {message}")]
    MetadataParse { line: usize, message: String },

    #[error("invalid document: {message}")]
    InvalidDocument { message: String },

    #[error("unterminated quote in: {0}")]
    UnterminatedQuote(String),

    #[error("unknown bootstrap distro: {0}")]
    UnknownDistro(String),
}
