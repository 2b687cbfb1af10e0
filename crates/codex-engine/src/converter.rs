use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use codex_protocol::{DetectResult, EnumerateEntry};
use codex_types::{Corpus, InterlinearLine, LossClass, LossReport, ParallelCorpus};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// What a converter can promise, per direction.
///
/// Ceilings are the best class the converter's structured path can reach.
/// The engine never reports better than the ceiling, except through raw
/// replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub extract_ceiling: LossClass,
    pub emit_ceiling: LossClass,
    pub parallel: bool,
    pub interlinear: bool,
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extract<={} emit<={}",
            self.extract_ceiling, self.emit_ceiling
        )?;
        if self.parallel {
            f.write_str(" parallel")?;
        }
        if self.interlinear {
            f.write_str(" interlinear")?;
        }
        Ok(())
    }
}

/// Input handed to [`Converter::extract`]: the bytes that were read, and
/// where they came from.
#[derive(Clone, Copy, Debug)]
pub struct Source<'a> {
    pub path: &'a Path,
    pub bytes: &'a [u8],
}

impl<'a> Source<'a> {
    pub fn new(path: &'a Path, bytes: &'a [u8]) -> Self {
        Self { path, bytes }
    }

    /// File stem, used as the default corpus id.
    pub fn stem(&self) -> String {
        file_stem(self.path)
    }
}

/// Structured result of reading a native file.
#[derive(Clone, Debug)]
pub struct Extraction {
    pub corpus: Corpus,
    pub report: LossReport,
}

/// Native bytes synthesized from the IR, plus what was lost doing it.
#[derive(Clone, Debug)]
pub struct Synthesis {
    pub bytes: Vec<u8>,
    pub report: LossReport,
}

/// One native format.
///
/// Converters only see bytes and IR values. Reading inputs, writing outputs,
/// raw-byte embedding and loss-class clamping are the host's job (see
/// [`Host`](crate::Host)). Optional operations default to
/// [`EngineError::Unsupported`].
pub trait Converter {
    /// Short identifier, e.g. `"zip"`. Also names the raw payload.
    fn format_id(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }

    /// File extensions without the dot. The first one names emitted files.
    fn extensions(&self) -> &'static [&'static str];

    fn capabilities(&self) -> Capabilities;

    /// Decide whether `path` is in this format. Must not write anything.
    fn detect(&self, path: &Path) -> EngineResult<DetectResult>;

    /// List the logical entries of `path`. Single-file formats report the
    /// file itself.
    fn enumerate(&self, path: &Path) -> EngineResult<Vec<EnumerateEntry>> {
        let meta = fs::metadata(path)
            .map_err(|e| EngineError::io(format!("reading {}", path.display()), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if meta.is_dir() {
            return Ok(vec![EnumerateEntry::dir(name)]);
        }
        Ok(vec![EnumerateEntry::file(name, meta.len())])
    }

    /// Format-specific metadata recorded at ingest.
    fn ingest_metadata(&self, _bytes: &[u8]) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn extract(&self, source: &Source<'_>, config: &EngineConfig) -> EngineResult<Extraction>;

    fn synthesize(&self, corpus: &Corpus, config: &EngineConfig) -> EngineResult<Synthesis>;

    fn emit_parallel(&self, _parallel: &ParallelCorpus) -> EngineResult<Synthesis> {
        Err(EngineError::Unsupported {
            format: self.format_id().to_string(),
            command: "emit-parallel",
        })
    }

    fn emit_interlinear(&self, _lines: &[InterlinearLine]) -> EngineResult<Synthesis> {
        Err(EngineError::Unsupported {
            format: self.format_id().to_string(),
            command: "emit-interlinear",
        })
    }

    /// Name of the native file emitted for `stem`.
    fn output_file_name(&self, stem: &str) -> String {
        match self.extensions().first() {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.to_string(),
        }
    }
}

/// Common detect preamble: missing paths and directories never match.
///
/// Returns `Some(result)` when the path can be rejected without looking at
/// its content.
pub fn reject_non_file(path: &Path) -> Option<DetectResult> {
    match fs::metadata(path) {
        Err(e) => Some(DetectResult::not_matched(format!(
            "cannot stat {}: {e}",
            path.display()
        ))),
        Ok(m) if m.is_dir() => Some(DetectResult::not_matched("path is a directory")),
        Ok(_) => None,
    }
}

/// Lowercased extension of `path`, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// File stem of `path`, or `"corpus"` when there is none.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "corpus".to_string())
}
