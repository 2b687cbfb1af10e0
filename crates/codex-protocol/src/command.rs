//! Typed commands.
//!
//! A [`Request`] is validated into a [`Command`] at the process boundary:
//! every required argument must be present, be a non-empty string, and the
//! command name must be known. Handlers only ever see typed arguments.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::Request;

/// The command names of the plugin protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Detect,
    Ingest,
    Enumerate,
    ExtractIr,
    EmitNative,
    EmitParallel,
    EmitInterlinear,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        Self::Detect,
        Self::Ingest,
        Self::Enumerate,
        Self::ExtractIr,
        Self::EmitNative,
        Self::EmitParallel,
        Self::EmitInterlinear,
    ];

    /// Wire name of the command.
    pub fn name(self) -> &'static str {
        match self {
            Self::Detect => "detect",
            Self::Ingest => "ingest",
            Self::Enumerate => "enumerate",
            Self::ExtractIr => "extract-ir",
            Self::EmitNative => "emit-native",
            Self::EmitParallel => "emit-parallel",
            Self::EmitInterlinear => "emit-interlinear",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.name()).collect()
    }

    /// Whether the command may write to the filesystem.
    pub fn has_side_effects(self) -> bool {
        !matches!(self, Self::Detect | Self::Enumerate)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectArgs {
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestArgs {
    pub path: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerateArgs {
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractIrArgs {
    pub path: PathBuf,
    pub output_dir: PathBuf,
}

/// Arguments shared by the three emit commands: an input JSON file and the
/// directory the native output goes to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitArgs {
    pub ir_path: PathBuf,
    pub output_dir: PathBuf,
}

/// A validated request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Detect(DetectArgs),
    Ingest(IngestArgs),
    Enumerate(EnumerateArgs),
    ExtractIr(ExtractIrArgs),
    EmitNative(EmitArgs),
    /// `ir_path` names a `ParallelCorpus` JSON file.
    EmitParallel(EmitArgs),
    /// `ir_path` names a JSON array of `InterlinearLine`.
    EmitInterlinear(EmitArgs),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Detect(_) => CommandKind::Detect,
            Self::Ingest(_) => CommandKind::Ingest,
            Self::Enumerate(_) => CommandKind::Enumerate,
            Self::ExtractIr(_) => CommandKind::ExtractIr,
            Self::EmitNative(_) => CommandKind::EmitNative,
            Self::EmitParallel(_) => CommandKind::EmitParallel,
            Self::EmitInterlinear(_) => CommandKind::EmitInterlinear,
        }
    }

    /// Validate an untyped request.
    pub fn from_request(request: &Request) -> ProtocolResult<Self> {
        let kind = CommandKind::from_name(&request.command)
            .ok_or_else(|| ProtocolError::UnknownCommand(request.command.clone()))?;
        let args = ArgReader {
            command: kind.name(),
            args: &request.args,
        };

        Ok(match kind {
            CommandKind::Detect => Self::Detect(DetectArgs {
                path: args.path("path")?,
            }),
            CommandKind::Ingest => Self::Ingest(IngestArgs {
                path: args.path("path")?,
                output_dir: args.path("output_dir")?,
            }),
            CommandKind::Enumerate => Self::Enumerate(EnumerateArgs {
                path: args.path("path")?,
            }),
            CommandKind::ExtractIr => Self::ExtractIr(ExtractIrArgs {
                path: args.path("path")?,
                output_dir: args.path("output_dir")?,
            }),
            CommandKind::EmitNative => Self::EmitNative(args.emit()?),
            CommandKind::EmitParallel => Self::EmitParallel(args.emit()?),
            CommandKind::EmitInterlinear => Self::EmitInterlinear(args.emit()?),
        })
    }
}

struct ArgReader<'a> {
    command: &'static str,
    args: &'a Map<String, Value>,
}

impl ArgReader<'_> {
    fn path(&self, name: &'static str) -> ProtocolResult<PathBuf> {
        match self.args.get(name) {
            None | Some(Value::Null) => Err(ProtocolError::MissingArgument {
                command: self.command,
                argument: name,
            }),
            Some(Value::String(s)) if s.trim().is_empty() => Err(ProtocolError::InvalidArgument {
                command: self.command,
                argument: name,
                reason: "must not be empty".into(),
            }),
            Some(Value::String(s)) => Ok(PathBuf::from(s)),
            Some(other) => Err(ProtocolError::InvalidArgument {
                command: self.command,
                argument: name,
                reason: format!("expected a string, got {}", json_type(other)),
            }),
        }
    }

    fn emit(&self) -> ProtocolResult<EmitArgs> {
        Ok(EmitArgs {
            ir_path: self.path("ir_path")?,
            output_dir: self.path("output_dir")?,
        })
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
