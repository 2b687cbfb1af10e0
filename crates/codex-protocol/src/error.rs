use thiserror::Error;

/// Request-level errors. Every variant is detected before a handler runs,
/// so none of them can have side effects.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("request too large: more than {max} bytes")]
    MessageTooLarge { max: usize },

    #[error("unknown command: {0:?} (expected one of: {known})", known = crate::command::CommandKind::names().join(", "))]
    UnknownCommand(String),

    #[error("{command}: missing required argument {argument:?}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("{command}: invalid argument {argument:?}: {reason}")]
    InvalidArgument {
        command: &'static str,
        argument: &'static str,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
