//! Result payloads, one per command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use codex_types::{LossClass, LossReport};
use serde::{Deserialize, Serialize};

/// `detect` result. A non-match is `detected: false` with a reason, never an
/// error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectResult {
    pub detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub reason: String,
}

impl DetectResult {
    pub fn matched(format: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            detected: true,
            format: Some(format.into()),
            reason: reason.into(),
        }
    }

    pub fn not_matched(reason: impl Into<String>) -> Self {
        Self {
            detected: false,
            format: None,
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    pub artifact_id: String,
    pub blob_sha256: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// One logical sub-entry of a source (a container member, or the file
/// itself).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerateEntry {
    pub path: String,
    pub size_bytes: u64,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl EnumerateEntry {
    pub fn file(path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            is_dir: false,
            metadata: None,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size_bytes: 0,
            is_dir: true,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerateResult {
    pub entries: Vec<EnumerateEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractIrResult {
    pub ir_path: PathBuf,
    pub loss_class: LossClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_report: Option<LossReport>,
}

/// Result of `emit-native`, `emit-parallel` and `emit-interlinear`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitNativeResult {
    pub output_path: PathBuf,
    pub format: String,
    pub loss_class: LossClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_report: Option<LossReport>,
}
