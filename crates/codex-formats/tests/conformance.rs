//! Protocol-level behavior of the reference converters, driven through the
//! same stdin/stdout path a plugin process uses.

use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use codex_engine::{round_trip_file, Converter, EngineConfig, Host};
use codex_formats::{default_registry, OlbConverter, ZipConverter};
use codex_protocol::{
    DetectResult, EmitNativeResult, EnumerateResult, ExtractIrResult, IngestResult, JsonCodec,
    Response, EXIT_ERROR, EXIT_OK,
};
use codex_types::{legacy_raw_attribute, Corpus, LossClass};
use serde_json::{json, Value};

const TWO_VERSES: &str = "Gen 1:1 In the beginning God created the heaven and the earth.\nGen 1:2 And the earth was without form, and void.\n";

fn run(converter: &dyn Converter, request: Value) -> (i32, Response) {
    let host = Host::new(converter, EngineConfig::default());
    let input = serde_json::to_vec(&request).unwrap();
    let mut output = Vec::new();
    let code = host.serve(&input[..], &mut output);
    let text = String::from_utf8(output.clone()).unwrap();
    assert!(text.ends_with('\n'), "response must be newline-terminated");
    (code, JsonCodec::decode_response(&output).unwrap())
}

fn ok<T: serde::de::DeserializeOwned>(converter: &dyn Converter, request: Value) -> T {
    let (code, response) = run(converter, request);
    assert_eq!(code, EXIT_OK, "{:?}", response.error);
    response.into_result().unwrap()
}

fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in members {
        zip.start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn s(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

fn listing(dir: &Path) -> BTreeSet<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .map(|e| e.unwrap().into_path())
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_three_entry_zip_enumerates_three_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.zip");
    fs::write(
        &path,
        zip_bytes(&[("gen.txt", "Gen 1:1 a\n"), ("exod.txt", "Exod 1:1 b\n"), ("README", "hi")]),
    )
    .unwrap();

    let result: EnumerateResult = ok(
        &ZipConverter,
        json!({"command": "enumerate", "args": {"path": s(&path)}}),
    );
    let paths: Vec<_> = result.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["gen.txt", "exod.txt", "README"]);
    assert_eq!(result.entries[0].size_bytes, 10);
    assert!(result.entries.iter().all(|e| !e.is_dir));
}

#[test]
fn scenario_b_two_verses_become_one_document_with_two_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gen.olb");
    fs::write(&path, TWO_VERSES).unwrap();
    let out = dir.path().join("ir");

    let result: ExtractIrResult = ok(
        &OlbConverter,
        json!({"command": "extract-ir", "args": {"path": s(&path), "output_dir": s(&out)}}),
    );
    assert_eq!(result.ir_path, out.join("gen.ir.json"));

    let corpus: Corpus = serde_json::from_slice(&fs::read(&result.ir_path).unwrap()).unwrap();
    assert_eq!(corpus.documents.len(), 1);
    let blocks = &corpus.documents[0].content_blocks;
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].verse_ref().unwrap().osis_id, "Gen.1.1");
    assert_eq!(blocks[1].verse_ref().unwrap().osis_id, "Gen.1.2");
    assert_eq!(corpus.source_hash, codex_types::sha256_hex(TWO_VERSES.as_bytes()));
}

#[test]
fn scenario_c_legacy_raw_attribute_emits_l0() {
    let dir = tempfile::tempdir().unwrap();
    let original = zip_bytes(&[("a.txt", "anything")]);
    let hex = hex::encode(&original);

    for (converter, format, payload) in [
        (&ZipConverter as &dyn Converter, "zip", hex.clone()),
        (&OlbConverter as &dyn Converter, "olb", hex.clone()),
    ] {
        let mut corpus = Corpus::new(format!("legacy-{format}"), format);
        corpus.attributes.insert(legacy_raw_attribute(format), payload);
        // Structured content that disagrees with the raw bytes.
        corpus.title = "ignored".into();
        let ir = dir.path().join(format!("{format}.ir.json"));
        fs::write(&ir, serde_json::to_vec(&corpus).unwrap()).unwrap();

        let out = dir.path().join(format!("out-{format}"));
        let result: EmitNativeResult = ok(
            converter,
            json!({"command": "emit-native", "args": {"ir_path": s(&ir), "output_dir": s(&out)}}),
        );
        assert_eq!(result.loss_class, LossClass::L0);
        assert!(result.loss_report.unwrap().lost_elements.is_empty());
        assert_eq!(fs::read(result.output_path).unwrap(), original);
    }
}

#[test]
fn scenario_d_unknown_file_is_not_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mystery.unknown");
    fs::write(&path, [0x00, 0x13, 0x37, 0xff]).unwrap();

    for converter in default_registry().iter() {
        let request = json!({"command": "detect", "args": {"path": s(&path)}});
        let (code, response) = run(converter, request);
        assert_eq!(code, EXIT_OK);
        assert!(response.is_ok());
        let result: DetectResult = response.into_result().unwrap();
        assert!(!result.detected, "{} claimed the file", converter.format_id());
        assert!(!result.reason.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn l0_round_trip_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    // Comments, blank lines and CRLF all vanish from the structured view.
    let olb = dir.path().join("kjv.olb");
    fs::write(&olb, "#title: KJV\r\n# note\r\n\r\nGen 1:1 a\r\nGen 1:2  b\r\n").unwrap();
    let zip = dir.path().join("bundle.zip");
    fs::write(&zip, zip_bytes(&[("gen.olb", TWO_VERSES), ("cover.png", "\u{0}")])).unwrap();

    for (converter, path) in [
        (&OlbConverter as &dyn Converter, &olb),
        (&ZipConverter as &dyn Converter, &zip),
    ] {
        let host = Host::new(converter, EngineConfig::default());
        let work_dir = dir.path().join(converter.format_id());
        let outcome = round_trip_file(&host, path, &work_dir).unwrap();
        // The IR itself is lossy; only the raw replay is exact.
        assert!(outcome.extract.loss_class > LossClass::L0);
        assert_eq!(outcome.emit.loss_class, LossClass::L0);
        assert!(outcome.report.identical, "{:?}", outcome.report.diff);
    }
}

#[test]
fn garbage_lines_stay_in_lost_elements() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gen.olb");
    fs::write(&path, "Gen 1:1 a\nthis line is garbage\n??? more\nGen 1:2 b\n").unwrap();
    let out = dir.path().join("ir");

    let result: ExtractIrResult = ok(
        &OlbConverter,
        json!({"command": "extract-ir", "args": {"path": s(&path), "output_dir": s(&out)}}),
    );
    assert_eq!(result.loss_class, LossClass::L2);
    let report = result.loss_report.unwrap();
    let paths: Vec<_> = report.lost_elements.iter().map(|l| l.path.as_str()).collect();
    assert_eq!(paths, vec!["line:2", "line:3"]);

    let corpus: Corpus = serde_json::from_slice(&fs::read(&result.ir_path).unwrap()).unwrap();
    assert_eq!(corpus.loss_class, LossClass::L2);
    assert_eq!(corpus.block_count(), 2);
    assert!(corpus.raw_bytes.is_some());
}

#[test]
fn without_raw_bytes_emission_is_never_l0() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gen.olb");
    fs::write(&path, TWO_VERSES).unwrap();
    let config = EngineConfig {
        embed_raw_bytes: false,
        ..EngineConfig::default()
    };
    let host = Host::new(&OlbConverter, config);
    let outcome = round_trip_file(&host, &path, dir.path()).unwrap();

    assert_eq!(outcome.extract.loss_class, LossClass::L1);
    assert_eq!(outcome.emit.loss_class, LossClass::L1);
    let report = outcome.emit.loss_report.unwrap();
    assert!(!report.lost_elements.is_empty());
    // The synthesized file carries headers the source did not have.
    assert!(!outcome.report.identical);
}

#[test]
fn detect_does_not_touch_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("gen.olb"), TWO_VERSES).unwrap();
    fs::write(dir.path().join("b.zip"), zip_bytes(&[("a.txt", "x")])).unwrap();
    fs::write(dir.path().join("x.unknown"), b"??").unwrap();
    let before = listing(dir.path());

    let registry = default_registry();
    for entry in &before {
        for converter in registry.iter() {
            let _ = run(converter, json!({"command": "detect", "args": {"path": s(entry)}}));
        }
    }
    assert_eq!(listing(dir.path()), before);
}

#[test]
fn block_sequences_strictly_increase() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.olb");
    fs::write(&path, "Gen 1:1 a\nExod 1:1 b\nGen 1:2 c\nGen 1:3 d\n").unwrap();
    let result: ExtractIrResult = ok(
        &OlbConverter,
        json!({"command": "extract-ir", "args": {"path": s(&path), "output_dir": s(dir.path())}}),
    );
    let corpus: Corpus = serde_json::from_slice(&fs::read(result.ir_path).unwrap()).unwrap();
    for doc in &corpus.documents {
        for pair in doc.content_blocks.windows(2) {
            assert!(pair[0].sequence < pair[1].sequence);
        }
    }
    assert!(corpus.documents.windows(2).all(|p| p[0].order < p[1].order));
}

#[test]
fn ingest_is_content_addressed() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.olb");
    let b = dir.path().join("b.olb");
    fs::write(&a, TWO_VERSES).unwrap();
    fs::write(&b, TWO_VERSES).unwrap();
    let store = dir.path().join("blobs");

    let ra: IngestResult = ok(
        &OlbConverter,
        json!({"command": "ingest", "args": {"path": s(&a), "output_dir": s(&store)}}),
    );
    let rb: IngestResult = ok(
        &OlbConverter,
        json!({"command": "ingest", "args": {"path": s(&b), "output_dir": s(&store)}}),
    );
    assert_eq!(ra.blob_sha256, rb.blob_sha256);
    assert_eq!(ra.artifact_id, "a");
    assert_eq!(ra.metadata["verse_count"], "2");
    let blob = store.join(&ra.blob_sha256[..2]).join(&ra.blob_sha256);
    assert_eq!(fs::read_to_string(blob).unwrap(), TWO_VERSES);
    assert_eq!(listing(&store).len(), 3);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn unknown_command_exits_with_error() {
    let (code, response) = run(&OlbConverter, json!({"command": "convert", "args": {}}));
    assert_eq!(code, EXIT_ERROR);
    assert!(response.error.unwrap().contains("convert"));
}

#[test]
fn missing_argument_exits_with_error_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gen.olb");
    fs::write(&path, TWO_VERSES).unwrap();
    let request = json!({"command": "ingest", "args": {"path": s(&path)}});
    let (code, response) = run(&OlbConverter, request);
    assert_eq!(code, EXIT_ERROR);
    assert!(!response.is_ok());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn zip_has_no_interlinear_support() {
    let dir = tempfile::tempdir().unwrap();
    let lines = dir.path().join("lines.json");
    fs::write(&lines, "[]").unwrap();
    let (code, response) = run(
        &ZipConverter,
        json!({
            "command": "emit-interlinear",
            "args": {"ir_path": s(&lines), "output_dir": s(dir.path())}
        }),
    );
    assert_eq!(code, EXIT_ERROR);
    assert!(response.error.unwrap().contains("not supported"));
}

#[test]
fn olb_emits_interlinear_file() {
    let dir = tempfile::tempdir().unwrap();
    let lines = dir.path().join("gen1.json");
    fs::write(
        &lines,
        serde_json::to_vec(&json!([{
            "ref": {"book": "Gen", "chapter": 1, "verse": 1, "osis_id": "Gen.1.1"},
            "layers": {"en": {"corpus_id": "kjv", "label": "kjv", "tokens": ["In", "beginning"]}}
        }]))
        .unwrap(),
    )
    .unwrap();
    let out = dir.path().join("out");
    let result: EmitNativeResult = ok(
        &OlbConverter,
        json!({
            "command": "emit-interlinear",
            "args": {"ir_path": s(&lines), "output_dir": s(&out)}
        }),
    );
    assert_eq!(result.output_path, out.join("gen1.interlinear.olb"));
    assert_eq!(result.loss_class, LossClass::L1);
    assert_eq!(
        fs::read_to_string(result.output_path).unwrap(),
        "Gen 1:1\nkjv: In beginning\n"
    );
}
