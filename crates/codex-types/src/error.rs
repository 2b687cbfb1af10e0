use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid OSIS reference: {0}")]
    InvalidReference(String),

    #[error("invalid loss class: {0}")]
    InvalidLossClass(String),

    #[error("corpus {corpus} failed validation: {}", .violations.join("; "))]
    InvalidCorpus {
        corpus: String,
        violations: Vec<String>,
    },

    #[error("raw payload for format {0} does not match its recorded digest")]
    RawDigestMismatch(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
