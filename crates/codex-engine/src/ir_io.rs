use std::fs;
use std::path::{Path, PathBuf};

use codex_types::{Corpus, InterlinearLine, ParallelCorpus};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::atomic::write_atomic;
use crate::error::{EngineError, EngineResult};

/// Suffix of IR files written by `extract-ir`.
pub const IR_SUFFIX: &str = ".ir.json";

/// `<id>.ir.json`, rejecting ids that would escape the output directory.
pub fn ir_file_name(corpus_id: &str) -> EngineResult<String> {
    if corpus_id.is_empty()
        || corpus_id.contains(['/', '\\'])
        || corpus_id == "."
        || corpus_id == ".."
    {
        return Err(EngineError::format(
            "ir",
            format!("corpus id {corpus_id:?} cannot name an output file"),
        ));
    }
    Ok(format!("{corpus_id}{IR_SUFFIX}"))
}

/// Serialize and atomically write a corpus into `dir`.
pub fn write_corpus(dir: &Path, corpus: &Corpus, pretty: bool) -> EngineResult<PathBuf> {
    let name = ir_file_name(&corpus.id)?;
    let json = if pretty {
        serde_json::to_vec_pretty(corpus)
    } else {
        serde_json::to_vec(corpus)
    }
    .map_err(|e| EngineError::Serialization(e.to_string()))?;
    write_atomic(dir, &name, &json)
}

/// Read an IR corpus file.
pub fn read_corpus(path: &Path) -> EngineResult<Corpus> {
    read_json(path, "IR corpus")
}

pub fn read_parallel(path: &Path) -> EngineResult<ParallelCorpus> {
    read_json(path, "parallel corpus")
}

pub fn read_interlinear(path: &Path) -> EngineResult<Vec<InterlinearLine>> {
    read_json(path, "interlinear lines")
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> EngineResult<T> {
    let bytes =
        fs::read(path).map_err(|e| EngineError::io(format!("reading {}", path.display()), e))?;
    debug!(path = %path.display(), size = bytes.len(), what, "loading IR input");
    serde_json::from_slice(&bytes).map_err(|e| {
        EngineError::format("ir", format!("{} is not a valid {what}: {e}", path.display()))
    })
}

/// Stem of an IR path with the `.ir.json` (or plain extension) removed.
pub fn ir_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(stem) = name.strip_suffix(IR_SUFFIX).filter(|s| !s.is_empty()) {
        return stem.to_string();
    }
    crate::converter::file_stem(path)
}
