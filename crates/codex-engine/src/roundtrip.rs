//! Byte-level round-trip verification: `emit-native(extract-ir(f)) == f`.

use std::fs;
use std::path::Path;

use codex_protocol::{EmitArgs, EmitNativeResult, ExtractIrArgs, ExtractIrResult};
use codex_types::sha256_hex;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};

use crate::converter::Converter;
use crate::error::{EngineError, EngineResult};
use crate::host::Host;

/// Cap on diff lines kept in a report.
const MAX_DIFF_LINES: usize = 200;

/// Comparison of an original file with its re-emitted form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoundTripReport {
    pub identical: bool,
    pub original_sha256: String,
    pub emitted_sha256: String,
    /// `emitted.len() - original.len()`.
    pub size_delta: i64,
    /// Offset of the first differing byte.
    pub first_difference: Option<usize>,
    /// Changed lines, prefixed `-` or `+`. Empty for identical or binary
    /// content.
    pub diff: Vec<String>,
}

/// Compare two byte strings.
pub fn verify_round_trip(original: &[u8], emitted: &[u8]) -> RoundTripReport {
    let first_difference = original
        .iter()
        .zip(emitted)
        .position(|(a, b)| a != b)
        .or_else(|| (original.len() != emitted.len()).then(|| original.len().min(emitted.len())));

    let diff = match (std::str::from_utf8(original), std::str::from_utf8(emitted)) {
        (Ok(old), Ok(new)) if first_difference.is_some() => changed_lines(old, new),
        _ => Vec::new(),
    };

    RoundTripReport {
        identical: first_difference.is_none(),
        original_sha256: sha256_hex(original),
        emitted_sha256: sha256_hex(emitted),
        size_delta: emitted.len() as i64 - original.len() as i64,
        first_difference,
        diff,
    }
}

fn changed_lines(old: &str, new: &str) -> Vec<String> {
    let text_diff = TextDiff::from_lines(old, new);
    text_diff
        .iter_all_changes()
        .filter_map(|change| {
            let sign = match change.tag() {
                ChangeTag::Equal => return None,
                ChangeTag::Delete => '-',
                ChangeTag::Insert => '+',
            };
            Some(format!("{sign}{}", change.value().trim_end_matches('\n')))
        })
        .take(MAX_DIFF_LINES)
        .collect()
}

/// Everything produced by [`round_trip_file`].
#[derive(Clone, Debug, Serialize)]
pub struct RoundTripOutcome {
    pub extract: ExtractIrResult,
    pub emit: EmitNativeResult,
    pub report: RoundTripReport,
}

/// Run `extract-ir` then `emit-native` on `path`, writing into `work_dir`,
/// and compare the emitted file with the original.
pub fn round_trip_file<C: Converter + ?Sized>(
    host: &Host<'_, C>,
    path: &Path,
    work_dir: &Path,
) -> EngineResult<RoundTripOutcome> {
    let extract = host.extract_ir(&ExtractIrArgs {
        path: path.to_path_buf(),
        output_dir: work_dir.join("ir"),
    })?;
    let emit = host.emit_native(&EmitArgs {
        ir_path: extract.ir_path.clone(),
        output_dir: work_dir.join("native"),
    })?;

    let original =
        fs::read(path).map_err(|e| EngineError::io(format!("reading {}", path.display()), e))?;
    let emitted = fs::read(&emit.output_path)
        .map_err(|e| EngineError::io(format!("reading {}", emit.output_path.display()), e))?;

    Ok(RoundTripOutcome {
        report: verify_round_trip(&original, &emitted),
        extract,
        emit,
    })
}
