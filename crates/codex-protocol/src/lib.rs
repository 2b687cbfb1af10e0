//! Plugin wire protocol for Codex converters.
//!
//! A converter is spawned once per command. It reads one JSON [`Request`]
//! from stdin, writes exactly one JSON [`Response`] to stdout, and exits with
//! `0` for `ok` or `1` for `error`. There is no streaming and no version
//! negotiation: the command name fixes the argument and result shapes.
//!
//! ```text
//! Request:  {"command": "<name>", "args": {...}}
//! Response: {"status": "ok", "result": {...}}
//!         | {"status": "error", "error": "<message>"}
//! ```

pub mod codec;
pub mod command;
pub mod error;
pub mod message;
pub mod result;

pub use codec::JsonCodec;
pub use command::{
    Command, CommandKind, DetectArgs, EmitArgs, EnumerateArgs, ExtractIrArgs, IngestArgs,
};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{Request, Response, Status, EXIT_ERROR, EXIT_OK, MAX_REQUEST_SIZE};
pub use result::{
    DetectResult, EmitNativeResult, EnumerateEntry, EnumerateResult, ExtractIrResult,
    IngestResult,
};
