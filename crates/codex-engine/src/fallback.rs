//! Loss classification rules applied by the host around every converter
//! call.
//!
//! Converters describe what their structured path lost. The functions here
//! turn that into the class the caller sees:
//!
//! - the declared ceiling is applied (downgrade only);
//! - a structured path never reports `L0`;
//! - on extract, the source bytes are embedded for replay when allowed; the
//!   report still describes the structured view, lost elements included;
//! - `L0` is only ever reported by a raw replay;
//! - every report leaves here finalized.

use codex_types::{sha256_hex, LossClass, LossReport};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::converter::{Capabilities, Extraction, Source, Synthesis};

/// Best class a structured (non-replay) path may claim.
const STRUCTURAL_FLOOR: LossClass = LossClass::L1;

/// Apply provenance, ceilings and the raw-bytes fallback to an extraction.
pub fn seal_extraction(
    format: &str,
    capabilities: Capabilities,
    source: &Source<'_>,
    extraction: Extraction,
    config: &EngineConfig,
) -> Extraction {
    let Extraction {
        mut corpus,
        mut report,
    } = extraction;

    corpus.source_format = format.to_string();
    corpus.source_hash = sha256_hex(source.bytes);

    report.downgrade(capabilities.extract_ceiling.downgrade(STRUCTURAL_FLOOR));
    let structural = report.loss_class;

    let size = source.bytes.len() as u64;
    if !config.embed_raw_bytes {
        report.warn(format!(
            "raw bytes not embedded (disabled by configuration); extraction is {structural}"
        ));
    } else if size > config.max_raw_bytes {
        warn!(format, size, limit = config.max_raw_bytes, "source too large to embed");
        report.warn(format!(
            "raw bytes not embedded: source is {size} bytes, limit is {}; extraction is {structural}",
            config.max_raw_bytes
        ));
    } else {
        corpus.set_raw_payload(format, source.bytes.to_vec());
        report.warn(format!(
            "raw bytes embedded ({size} bytes); emit-native replays the source byte-identically"
        ));
        debug!(format, size, structural = %structural, "raw bytes embedded");
    }

    let report = report.finalize();
    corpus.loss_class = report.loss_class;
    Extraction { corpus, report }
}

/// Apply the emit ceiling to a synthesized output. Never `L0`.
pub fn seal_synthesis(capabilities: Capabilities, synthesis: Synthesis) -> Synthesis {
    let Synthesis { bytes, mut report } = synthesis;
    report.downgrade(capabilities.emit_ceiling.downgrade(STRUCTURAL_FLOOR));
    Synthesis {
        bytes,
        report: report.finalize(),
    }
}

/// Report for a verbatim raw replay.
pub fn replay_report(format: &str) -> LossReport {
    LossReport::lossless("ir", format)
}
