//! Executes protocol commands against a single converter.
//!
//! The host owns everything that is the same for every format: argument
//! handling, reading inputs, provenance hashing, raw-byte embedding,
//! loss-class clamping and atomic output. A [`Converter`] only translates
//! bytes to IR and back.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use codex_protocol::{
    Command, DetectArgs, DetectResult, EmitArgs, EmitNativeResult, EnumerateArgs, EnumerateResult,
    ExtractIrArgs, ExtractIrResult, IngestArgs, IngestResult, JsonCodec, Request, Response,
    EXIT_ERROR,
};
use codex_store::{BlobStore, FsBlobStore};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::atomic::write_atomic;
use crate::config::EngineConfig;
use crate::converter::{file_stem, Converter, Source, Synthesis};
use crate::error::{EngineError, EngineResult};
use crate::fallback::{replay_report, seal_extraction, seal_synthesis};
use crate::ir_io::{ir_stem, read_corpus, read_interlinear, read_parallel, write_corpus};

/// The result of one command, ready to be placed in a response.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    Detect(DetectResult),
    Ingest(IngestResult),
    Enumerate(EnumerateResult),
    ExtractIr(ExtractIrResult),
    Emit(EmitNativeResult),
}

/// Runs commands for one converter.
pub struct Host<'c, C: Converter + ?Sized> {
    converter: &'c C,
    config: EngineConfig,
}

impl<'c, C: Converter + ?Sized> Host<'c, C> {
    pub fn new(converter: &'c C, config: EngineConfig) -> Self {
        Self { converter, config }
    }

    pub fn converter(&self) -> &C {
        self.converter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Protocol entry points
    // -----------------------------------------------------------------------

    /// Serve exactly one request: read it from `reader`, write the response
    /// to `writer`, and return the process exit code.
    pub fn serve<R: Read, W: Write>(&self, reader: R, writer: W) -> i32 {
        let response = match JsonCodec::read_request(reader) {
            Ok(request) => self.handle(&request),
            Err(e) => {
                warn!(error = %e, "rejecting request");
                Response::error(e.to_string())
            }
        };
        if let Err(e) = JsonCodec::write_response(writer, &response) {
            error!(error = %e, "failed to write response");
            return EXIT_ERROR;
        }
        response.exit_code()
    }

    /// Validate and execute a decoded request.
    pub fn handle(&self, request: &Request) -> Response {
        let command = match Command::from_request(request) {
            Ok(c) => c,
            Err(e) => {
                warn!(command = %request.command, error = %e, "invalid request");
                return Response::error(e.to_string());
            }
        };
        let kind = command.kind();
        match self.execute(&command) {
            Ok(output) => Response::ok(&output).unwrap_or_else(|e| Response::error(e.to_string())),
            Err(e) => {
                warn!(
                    format = self.converter.format_id(),
                    command = %kind,
                    error = %e,
                    "command failed"
                );
                Response::error(e.to_string())
            }
        }
    }

    pub fn execute(&self, command: &Command) -> EngineResult<CommandOutput> {
        let kind = command.kind();
        info!(
            format = self.converter.format_id(),
            command = %kind,
            writes = kind.has_side_effects(),
            "executing"
        );
        match command {
            Command::Detect(args) => Ok(CommandOutput::Detect(self.detect(args))),
            Command::Ingest(args) => self.ingest(args).map(CommandOutput::Ingest),
            Command::Enumerate(args) => self.enumerate(args).map(CommandOutput::Enumerate),
            Command::ExtractIr(args) => self.extract_ir(args).map(CommandOutput::ExtractIr),
            Command::EmitNative(args) => self.emit_native(args).map(CommandOutput::Emit),
            Command::EmitParallel(args) => self.emit_parallel(args).map(CommandOutput::Emit),
            Command::EmitInterlinear(args) => self.emit_interlinear(args).map(CommandOutput::Emit),
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Never fails and never writes. Detector errors become a negative
    /// result carrying the error text.
    pub fn detect(&self, args: &DetectArgs) -> DetectResult {
        match self.converter.detect(&args.path) {
            Ok(result) => {
                debug!(
                    path = %args.path.display(),
                    detected = result.detected,
                    reason = %result.reason,
                    "detect"
                );
                result
            }
            Err(e) => {
                debug!(path = %args.path.display(), error = %e, "detector failed");
                DetectResult::not_matched(e.to_string())
            }
        }
    }

    pub fn ingest(&self, args: &IngestArgs) -> EngineResult<IngestResult> {
        self.ingest_into(&FsBlobStore::new(&args.output_dir), &args.path)
    }

    /// Ingest `path` into any blob store.
    pub fn ingest_into<S: BlobStore + ?Sized>(
        &self,
        store: &S,
        path: &Path,
    ) -> EngineResult<IngestResult> {
        let bytes = read_source(path)?;
        let blob = store.store(&bytes)?;

        let mut metadata: BTreeMap<String, String> = self.converter.ingest_metadata(&bytes);
        metadata.insert("format".into(), self.converter.format_id().into());
        metadata.insert("original_name".into(), file_name(path));
        metadata.insert("blob_path".into(), blob.path.display().to_string());

        info!(hash = %blob.hash, size = blob.size_bytes, new = blob.newly_written, "ingested");
        Ok(IngestResult {
            artifact_id: file_stem(path),
            blob_sha256: blob.hash,
            size_bytes: blob.size_bytes,
            metadata,
        })
    }

    pub fn enumerate(&self, args: &EnumerateArgs) -> EngineResult<EnumerateResult> {
        let entries = self.converter.enumerate(&args.path)?;
        debug!(path = %args.path.display(), count = entries.len(), "enumerated");
        Ok(EnumerateResult { entries })
    }

    pub fn extract_ir(&self, args: &ExtractIrArgs) -> EngineResult<ExtractIrResult> {
        let bytes = read_source(&args.path)?;
        let source = Source::new(&args.path, &bytes);
        let format = self.converter.format_id();

        let extraction = self.converter.extract(&source, &self.config)?;
        let sealed = seal_extraction(
            format,
            self.converter.capabilities(),
            &source,
            extraction,
            &self.config,
        );
        sealed.corpus.validate().map_err(|e| {
            EngineError::format(format, format!("extracted corpus is inconsistent: {e}"))
        })?;

        let ir_path = write_corpus(&args.output_dir, &sealed.corpus, self.config.pretty_ir)?;
        info!(
            corpus = %sealed.corpus.id,
            documents = sealed.corpus.documents.len(),
            blocks = sealed.corpus.block_count(),
            loss = %sealed.report.loss_class,
            "IR written"
        );
        Ok(ExtractIrResult {
            ir_path,
            loss_class: sealed.report.loss_class,
            loss_report: Some(sealed.report),
        })
    }

    pub fn emit_native(&self, args: &EmitArgs) -> EngineResult<EmitNativeResult> {
        let format = self.converter.format_id();
        let corpus = read_corpus(&args.ir_path)?;
        let stem = if corpus.id.is_empty() {
            ir_stem(&args.ir_path)
        } else {
            corpus.id.clone()
        };

        if let Some(raw) = corpus.raw_payload(format)? {
            let output_path = write_atomic(
                &args.output_dir,
                &self.converter.output_file_name(&stem),
                &raw,
            )?;
            info!(corpus = %corpus.id, size = raw.len(), "raw bytes replayed");
            let report = replay_report(format);
            return Ok(EmitNativeResult {
                output_path,
                format: format.to_string(),
                loss_class: report.loss_class,
                loss_report: Some(report),
            });
        }

        corpus.validate()?;
        let synthesis = self.converter.synthesize(&corpus, &self.config)?;
        self.commit(args, &self.converter.output_file_name(&stem), synthesis)
    }

    pub fn emit_parallel(&self, args: &EmitArgs) -> EngineResult<EmitNativeResult> {
        self.require_capability(self.converter.capabilities().parallel, "emit-parallel")?;
        let parallel = read_parallel(&args.ir_path)?;
        let synthesis = self.converter.emit_parallel(&parallel)?;
        let stem = format!("{}.parallel", ir_stem(&args.ir_path));
        self.commit(args, &self.converter.output_file_name(&stem), synthesis)
    }

    pub fn emit_interlinear(&self, args: &EmitArgs) -> EngineResult<EmitNativeResult> {
        self.require_capability(self.converter.capabilities().interlinear, "emit-interlinear")?;
        let lines = read_interlinear(&args.ir_path)?;
        let synthesis = self.converter.emit_interlinear(&lines)?;
        let stem = format!("{}.interlinear", ir_stem(&args.ir_path));
        self.commit(args, &self.converter.output_file_name(&stem), synthesis)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn commit(
        &self,
        args: &EmitArgs,
        file_name: &str,
        synthesis: Synthesis,
    ) -> EngineResult<EmitNativeResult> {
        let sealed = seal_synthesis(self.converter.capabilities(), synthesis);
        let output_path = write_atomic(&args.output_dir, file_name, &sealed.bytes)?;
        info!(
            path = %output_path.display(),
            loss = %sealed.report.loss_class,
            lost = sealed.report.lost_elements.len(),
            "native output synthesized"
        );
        Ok(EmitNativeResult {
            output_path,
            format: self.converter.format_id().to_string(),
            loss_class: sealed.report.loss_class,
            loss_report: Some(sealed.report),
        })
    }

    fn require_capability(&self, supported: bool, command: &'static str) -> EngineResult<()> {
        if supported {
            return Ok(());
        }
        Err(EngineError::Unsupported {
            format: self.converter.format_id().to_string(),
            command,
        })
    }
}

fn read_source(path: &Path) -> EngineResult<Vec<u8>> {
    fs::read(path).map_err(|e| EngineError::io(format!("reading source {}", path.display()), e))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codex_protocol::{Status, EXIT_OK};
    use codex_store::InMemoryBlobStore;
    use codex_types::{
        legacy_raw_attribute, ContentBlock, Corpus, Document, LossClass, LossReport, LostElement,
        Ref, SpanType,
    };
    use serde_json::json;

    use crate::converter::{reject_non_file, Capabilities, Extraction};

    /// One verse per line, `<chapter>:<verse> <text>`, book fixed to "Gen".
    struct Lines;

    impl Converter for Lines {
        fn format_id(&self) -> &'static str {
            "lines"
        }
        fn extensions(&self) -> &'static [&'static str] {
            &["lines"]
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                extract_ceiling: LossClass::L1,
                emit_ceiling: LossClass::L1,
                parallel: false,
                interlinear: false,
            }
        }
        fn detect(&self, path: &Path) -> EngineResult<DetectResult> {
            if let Some(r) = reject_non_file(path) {
                return Ok(r);
            }
            if path.extension().is_some_and(|e| e == "lines") {
                Ok(DetectResult::matched("lines", "extension"))
            } else {
                Err(EngineError::format("lines", "unrecognized content"))
            }
        }
        fn extract(&self, source: &Source<'_>, _: &EngineConfig) -> EngineResult<Extraction> {
            let text = std::str::from_utf8(source.bytes)
                .map_err(|e| EngineError::format("lines", e.to_string()))?;
            let mut corpus = Corpus::new(source.stem(), "lines");
            let mut doc = Document::new("Gen", "Gen");
            let mut report = LossReport::lossless("lines", "ir");
            for (n, line) in text.lines().enumerate() {
                let Some((cv, body)) = line.split_once(' ') else {
                    report.record(
                        LostElement::new(format!("line:{}", n + 1), "line", "no verse number"),
                        LossClass::L2,
                    );
                    continue;
                };
                let Some((c, v)) = cv.split_once(':') else {
                    continue;
                };
                let r = Ref::new("Gen", c.parse().unwrap_or(1), v.parse().unwrap_or(1));
                let mut block = ContentBlock::new(format!("b{n}"), body);
                block.cover_with_span(SpanType::Verse, Some(r));
                doc.push_block(block);
            }
            corpus.push_document(doc);
            Ok(Extraction { corpus, report })
        }
        fn synthesize(&self, corpus: &Corpus, _: &EngineConfig) -> EngineResult<Synthesis> {
            let mut out = String::new();
            for (_, block) in corpus.blocks() {
                if let Some(r) = block.verse_ref() {
                    out.push_str(&format!("{}:{} {}\n", r.chapter, r.verse, block.text));
                }
            }
            Ok(Synthesis {
                bytes: out.into_bytes(),
                report: LossReport::lossless("ir", "lines"),
            })
        }
    }

    fn host() -> Host<'static, Lines> {
        Host::new(&Lines, EngineConfig::default())
    }

    fn fixture(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let p = dir.join(name);
        fs::write(&p, body).unwrap();
        p
    }

    // -----------------------------------------------------------------------
    // serve / handle
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_command_is_an_error_response() {
        let mut out = Vec::new();
        let code = host().serve(&br#"{"command":"translate","args":{}}"#[..], &mut out);
        assert_eq!(code, EXIT_ERROR);
        let resp = JsonCodec::decode_response(&out).unwrap();
        assert_eq!(resp.status, Status::Error);
        assert!(resp.error.unwrap().contains("translate"));
    }

    #[test]
    fn malformed_json_is_an_error_response() {
        let mut out = Vec::new();
        let code = host().serve(&b"not json"[..], &mut out);
        assert_eq!(code, EXIT_ERROR);
        assert!(!JsonCodec::decode_response(&out).unwrap().is_ok());
    }

    #[test]
    fn missing_argument_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let src = fixture(dir.path(), "a.lines", "1:1 x\n");
        let req = Request::new("extract-ir").arg("path", src.to_string_lossy().into_owned());
        let resp = host().handle(&req);
        assert_eq!(resp.exit_code(), EXIT_ERROR);
        assert!(resp.error.unwrap().contains("output_dir"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn detect_error_becomes_negative_result() {
        let dir = tempfile::tempdir().unwrap();
        let src = fixture(dir.path(), "a.unknown", "???");
        let req = Request::new("detect").arg("path", src.to_string_lossy().into_owned());
        let mut out = Vec::new();
        let input = serde_json::to_vec(&req).unwrap();
        assert_eq!(host().serve(&input[..], &mut out), EXIT_OK);
        let resp = JsonCodec::decode_response(&out).unwrap();
        let result: DetectResult = resp.into_result().unwrap();
        assert!(!result.detected);
        assert!(result.reason.contains("unrecognized"));
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    #[test]
    fn ingest_stores_blob_by_hash() {
        let dir = tempfile::tempdir().unwrap();
        let src = fixture(dir.path(), "kjv.lines", "1:1 In the beginning\n");
        let out = dir.path().join("blobs");
        let r = host()
            .ingest(&IngestArgs {
                path: src,
                output_dir: out.clone(),
            })
            .unwrap();
        assert_eq!(r.artifact_id, "kjv");
        assert_eq!(r.size_bytes, 21);
        assert_eq!(r.metadata["format"], "lines");
        assert_eq!(r.metadata["original_name"], "kjv.lines");
        let blob = out.join(&r.blob_sha256[..2]).join(&r.blob_sha256);
        assert_eq!(fs::read(blob).unwrap(), b"1:1 In the beginning\n");
    }

    #[test]
    fn ingest_into_memory_store_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let a = fixture(dir.path(), "a.lines", "1:1 a\n");
        let b = fixture(dir.path(), "b.lines", "1:1 a\n");
        let store = InMemoryBlobStore::new();
        let h = host();

        let first = h.ingest_into(&store, &a).unwrap();
        let second = h.ingest_into(&store, &b).unwrap();
        assert_eq!(first.blob_sha256, second.blob_sha256);
        assert_eq!(second.artifact_id, "b");
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.read(&first.blob_sha256).unwrap().as_deref(),
            Some(&b"1:1 a\n"[..])
        );
        let expected = Path::new(&first.blob_sha256[..2]).join(&first.blob_sha256);
        assert!(first.metadata["blob_path"].ends_with(&*expected.to_string_lossy()));
    }

    #[test]
    fn extract_embeds_raw_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let body = "1:1 In the beginning\n1:2 And the earth\n";
        let src = fixture(dir.path(), "kjv.lines", body);
        let h = host();
        let ex = h
            .extract_ir(&ExtractIrArgs {
                path: src,
                output_dir: dir.path().join("ir"),
            })
            .unwrap();
        assert_eq!(ex.loss_class, LossClass::L1);
        assert!(ex.ir_path.ends_with("kjv.ir.json"));

        let corpus = read_corpus(&ex.ir_path).unwrap();
        assert_eq!(corpus.block_count(), 2);
        assert_eq!(corpus.source_hash, codex_types::sha256_hex(body.as_bytes()));

        let em = h
            .emit_native(&EmitArgs {
                ir_path: ex.ir_path,
                output_dir: dir.path().join("out"),
            })
            .unwrap();
        assert_eq!(em.loss_class, LossClass::L0);
        assert_eq!(fs::read_to_string(em.output_path).unwrap(), body);
    }

    #[test]
    fn emit_without_raw_is_at_best_l1() {
        let dir = tempfile::tempdir().unwrap();
        let src = fixture(dir.path(), "kjv.lines", "1:1 a\n");
        let config = EngineConfig {
            embed_raw_bytes: false,
            ..EngineConfig::default()
        };
        let h = Host::new(&Lines, config);
        let ex = h
            .extract_ir(&ExtractIrArgs {
                path: src,
                output_dir: dir.path().to_path_buf(),
            })
            .unwrap();
        assert_eq!(ex.loss_class, LossClass::L1);
        let em = h
            .emit_native(&EmitArgs {
                ir_path: ex.ir_path,
                output_dir: dir.path().join("out"),
            })
            .unwrap();
        assert_eq!(em.loss_class, LossClass::L1);
        assert!(!em.loss_report.unwrap().lost_elements.is_empty());
    }

    #[test]
    fn legacy_raw_attribute_replays_regardless_of_documents() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = Corpus::new("legacy", "lines");
        corpus
            .attributes
            .insert(legacy_raw_attribute("lines"), hex::encode(b"exact bytes"));
        corpus.documents.push(Document::new("", ""));
        let ir = dir.path().join("legacy.ir.json");
        fs::write(&ir, serde_json::to_vec(&corpus).unwrap()).unwrap();

        let em = host()
            .emit_native(&EmitArgs {
                ir_path: ir,
                output_dir: dir.path().join("out"),
            })
            .unwrap();
        assert_eq!(em.loss_class, LossClass::L0);
        assert_eq!(fs::read(em.output_path).unwrap(), b"exact bytes");
    }

    #[test]
    fn unsupported_emit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ir = fixture(dir.path(), "pc.json", "{}");
        let req = Request::new("emit-parallel")
            .arg("ir_path", ir.to_string_lossy().into_owned())
            .arg("output_dir", dir.path().to_string_lossy().into_owned());
        let resp = host().handle(&req);
        assert!(!resp.is_ok());
        assert!(resp.error.unwrap().contains("not supported"));
    }

    #[test]
    fn output_serializes_without_variant_tag() {
        let out = CommandOutput::Detect(DetectResult::not_matched("nope"));
        assert_eq!(
            serde_json::to_value(out).unwrap(),
            json!({"detected": false, "reason": "nope"})
        );
    }
}
