use std::io;

use codex_protocol::ProtocolError;
use codex_store::StoreError;
use codex_types::TypeError;
use thiserror::Error;

/// Errors raised while executing a command.
///
/// Partial-extraction problems are not errors: they are reported through
/// [`LossReport::warnings`](codex_types::LossReport) and lost elements.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing, mistyped, or unknown arguments. Raised before any I/O.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Filesystem failure, wrapped with what was being attempted.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Content does not match the format being read or written.
    #[error("{format} format error: {detail}")]
    Format { format: String, detail: String },

    /// The converter does not implement an optional command.
    #[error("{command} is not supported by the {format} converter")]
    Unsupported {
        format: String,
        command: &'static str,
    },

    /// No converter is registered under this format id.
    #[error("unknown format '{0}'")]
    UnknownFormat(String),

    #[error("blob store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn format(format: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Format {
            format: format.into(),
            detail: detail.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
