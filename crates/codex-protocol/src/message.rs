use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, ProtocolResult};

/// Largest request accepted on stdin.
pub const MAX_REQUEST_SIZE: usize = 16 * 1024 * 1024;

/// Process exit code after an `ok` response.
pub const EXIT_OK: i32 = 0;
/// Process exit code after an `error` response.
pub const EXIT_ERROR: i32 = 1;

/// The untyped envelope read from stdin.
///
/// Converted into a typed [`Command`](crate::Command) before any handler
/// logic runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl Request {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Map::new(),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// The single envelope written to stdout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Successful response carrying `result`.
    pub fn ok<T: Serialize>(result: &T) -> ProtocolResult<Self> {
        let value =
            serde_json::to_value(result).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        Ok(Self {
            status: Status::Ok,
            result: Some(value),
            error: None,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            result: None,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Exit code the converter process must return after writing this response.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            Status::Ok => EXIT_OK,
            Status::Error => EXIT_ERROR,
        }
    }

    /// Decode the result of an `ok` response (orchestrator side).
    ///
    /// An `error` response becomes `Err` carrying its message.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, String> {
        match self.status {
            Status::Error => Err(self.error.unwrap_or_else(|| "unspecified error".into())),
            Status::Ok => {
                let value = self.result.unwrap_or(Value::Null);
                serde_json::from_value(value).map_err(|e| e.to_string())
            }
        }
    }
}
