//! `zip`: a ZIP bundle of per-book text files.
//!
//! Each UTF-8 text member becomes one document. Members written in the
//! verse-line grammar keep their verse structure; anything else is kept
//! as one paragraph block per non-empty line. An unpacked bundle (a plain
//! directory) can be enumerated too.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use codex_engine::{
    extension_of, reject_non_file, Capabilities, Converter, EngineConfig, EngineError,
    EngineResult, Extraction, Source, Synthesis,
};
use codex_protocol::{DetectResult, EnumerateEntry};
use codex_types::{Corpus, Document, LossClass, LossReport, LostElement};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::verse_line::{
    looks_like_verse_text, paragraph_block, render_header, render_verse, verse_block, VerseText,
    HEADER_KEYS,
};

pub const FORMAT_ID: &str = "zip";

/// Document attribute holding the member path inside the archive.
pub const ZIP_PATH_ATTR: &str = "zip_path";

/// Prefix of document attributes holding a member's verse-text headers.
const HEADER_ATTR_PREFIX: &str = "header.";

/// Member extensions read as text.
const TEXT_EXTENSIONS: &[&str] = &["txt", "olb", "usfm", "sfm", "usx", "xml", "json"];

const LOCAL_HEADER_MAGIC: &[u8; 4] = b"PK\x03\x04";
const EMPTY_ARCHIVE_MAGIC: &[u8; 4] = b"PK\x05\x06";

#[derive(Clone, Copy, Debug, Default)]
pub struct ZipConverter;

impl Converter for ZipConverter {
    fn format_id(&self) -> &'static str {
        FORMAT_ID
    }

    fn description(&self) -> &'static str {
        "ZIP bundle of text members"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["zip"]
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
        if let Some(rejected) = reject_non_file(path) {
            return Ok(rejected);
        }
        let mut file = File::open(path)
            .map_err(|e| EngineError::io(format!("opening {}", path.display()), e))?;

        let mut magic = [0u8; 4];
        let has_magic = match file.read_exact(&mut magic) {
            Ok(()) => &magic == LOCAL_HEADER_MAGIC || &magic == EMPTY_ARCHIVE_MAGIC,
            Err(_) => false,
        };
        let has_extension = extension_of(path).is_some_and(|e| e == "zip");
        if !has_magic && !has_extension {
            return Ok(DetectResult::not_matched(
                "no ZIP signature and no .zip extension",
            ));
        }

        file.rewind()
            .map_err(|e| EngineError::io(format!("reading {}", path.display()), e))?;
        match ZipArchive::new(file) {
            Ok(archive) => Ok(DetectResult::matched(
                FORMAT_ID,
                format!("ZIP archive with {} entries", archive.len()),
            )),
            Err(e) => Ok(DetectResult::not_matched(format!(
                "looks like ZIP but does not open: {e}"
            ))),
        }
    }

    fn enumerate(&self, path: &Path) -> EngineResult<Vec<EnumerateEntry>> {
        if path.is_dir() {
            return enumerate_directory(path);
        }
        let file = File::open(path)
            .map_err(|e| EngineError::io(format!("opening {}", path.display()), e))?;
        let mut archive = ZipArchive::new(file).map_err(zip_error)?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let member = archive.by_index(i).map_err(zip_error)?;
            let entry = if member.is_dir() {
                EnumerateEntry::dir(member.name().trim_end_matches('/'))
            } else {
                EnumerateEntry::file(member.name(), member.size())
            };
            entries.push(
                entry
                    .with_metadata("compressed_size", member.compressed_size().to_string())
                    .with_metadata("compression", format!("{:?}", member.compression())),
            );
        }
        debug!(path = %path.display(), entries = entries.len(), "archive enumerated");
        Ok(entries)
    }

    fn ingest_metadata(&self, bytes: &[u8]) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        match ZipArchive::new(Cursor::new(bytes)) {
            Ok(archive) => {
                meta.insert("entry_count".to_string(), archive.len().to_string());
            }
            Err(e) => {
                meta.insert("archive_error".to_string(), e.to_string());
            }
        }
        meta
    }

    fn extract(&self, source: &Source<'_>, config: &EngineConfig) -> EngineResult<Extraction> {
        let mut archive = ZipArchive::new(Cursor::new(source.bytes)).map_err(zip_error)?;
        let mut report = LossReport::lossless(FORMAT_ID, "ir");
        let mut corpus = Corpus::new(source.stem(), FORMAT_ID);
        corpus.title = source.stem();

        for i in 0..archive.len() {
            let mut member = archive.by_index(i).map_err(zip_error)?;
            let name = member.name().to_string();

            if member.is_dir() {
                report.record(
                    LostElement::new(
                        &name,
                        "directory",
                        "directory entries are implied by member paths",
                    ),
                    LossClass::L1,
                );
                continue;
            }
            if member.size() > config.max_entry_bytes {
                warn!(member = %name, size = member.size(), "member over size limit skipped");
                report.record(
                    LostElement::new(
                        &name,
                        "oversized_member",
                        format!(
                            "{} bytes exceeds the {} byte limit",
                            member.size(),
                            config.max_entry_bytes
                        ),
                    ),
                    LossClass::L2,
                );
                continue;
            }
            if !is_text_member(&name) {
                report.record(
                    LostElement::new(&name, "binary_member", "only text members are extracted"),
                    LossClass::L2,
                );
                continue;
            }

            let mut data = Vec::new();
            (&mut member)
                .take(config.max_entry_bytes + 1)
                .read_to_end(&mut data)
                .map_err(|e| EngineError::io(format!("reading member {name}"), e))?;
            if data.len() as u64 > config.max_entry_bytes {
                report.record(
                    LostElement::new(
                        &name,
                        "oversized_member",
                        "member inflates past the size limit",
                    ),
                    LossClass::L2,
                );
                continue;
            }
            let Ok(text) = String::from_utf8(data) else {
                report.record(
                    LostElement::new(&name, "undecodable_member", "member is not UTF-8"),
                    LossClass::L2,
                );
                continue;
            };

            corpus.push_document(member_document(&name, &text, &mut report));
        }

        if corpus.documents.is_empty() {
            report.warn("archive has no text members");
        }
        debug!(corpus = %corpus.id, documents = corpus.documents.len(), "zip parsed");
        Ok(Extraction { corpus, report })
    }

    fn synthesize(&self, corpus: &Corpus, _config: &EngineConfig) -> EngineResult<Synthesis> {
        let mut report = LossReport::lossless("ir", FORMAT_ID);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut written = HashSet::new();

        for doc in &corpus.documents {
            let name = doc
                .attributes
                .get(ZIP_PATH_ATTR)
                .cloned()
                .unwrap_or_else(|| format!("{}.txt", doc.id));
            if !written.insert(name.clone()) {
                report.record(
                    LostElement::new(
                        &name,
                        "duplicate_member",
                        format!("document {} reuses a member path", doc.id),
                    ),
                    LossClass::L2,
                );
                continue;
            }
            writer.start_file(name.as_str(), options).map_err(zip_error)?;
            writer
                .write_all(&render_member(doc, &mut report))
                .map_err(|e| EngineError::io(format!("writing member {name}"), e))?;
        }

        report.record(
            LostElement::new(
                "/",
                "member_metadata",
                "timestamps, permissions and compression settings are not carried in the IR",
            ),
            LossClass::L1,
        );
        let bytes = writer.finish().map_err(zip_error)?.into_inner();
        Ok(Synthesis { bytes, report })
    }
}

/// Build the document for one text member.
fn member_document(name: &str, text: &str, report: &mut LossReport) -> Document {
    let title = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let mut doc = Document::new(name, title);
    doc.attributes.insert(ZIP_PATH_ATTR.to_string(), name.to_string());

    if looks_like_verse_text(text) {
        let parsed = VerseText::parse(text);
        for (key, value) in &parsed.headers {
            doc.attributes
                .insert(format!("{HEADER_ATTR_PREFIX}{key}"), value.to_string());
        }
        for (_, reference, verse_text) in &parsed.verses {
            let id = format!("{name}.b{}", doc.content_blocks.len());
            doc.push_block(verse_block(id, reference.clone(), verse_text));
        }
        parsed.record_dropped(report, name);
    } else {
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let id = format!("{name}.p{}", doc.content_blocks.len());
            doc.push_block(paragraph_block(id, line));
        }
        report.record(
            LostElement::new(name, "markup", "member without verse lines kept as plain paragraphs"),
            LossClass::L2,
        );
    }
    doc
}

/// Render a document back to member text.
fn render_member(doc: &Document, report: &mut LossReport) -> Vec<u8> {
    let mut lines = Vec::new();
    for key in HEADER_KEYS {
        if let Some(value) = doc.attributes.get(&format!("{HEADER_ATTR_PREFIX}{key}")) {
            lines.push(render_header(key, value));
        }
    }
    for block in &doc.content_blocks {
        match block.verse_ref() {
            Some(reference) => lines.push(render_verse(reference, &block.text)),
            None => lines.push(block.text.clone()),
        }
        if block.text.contains('\n') {
            report.warn(format!("{}/{}: block text spans several lines", doc.id, block.id));
        }
    }
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out.into_bytes()
}

fn is_text_member(name: &str) -> bool {
    extension_of(Path::new(name)).is_some_and(|e| TEXT_EXTENSIONS.contains(&e.as_str()))
}

fn enumerate_directory(root: &Path) -> EngineResult<Vec<EnumerateEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            EngineError::io(
                format!("walking {}", root.display()),
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            )
        })?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if entry.file_type().is_dir() {
            entries.push(EnumerateEntry::dir(relative));
        } else {
            let size = entry.metadata().map(|m| m.len()).map_err(|e| {
                EngineError::io(format!("reading {}", entry.path().display()), e.into())
            })?;
            entries.push(EnumerateEntry::file(relative, size));
        }
    }
    Ok(entries)
}

fn zip_error(e: zip::result::ZipError) -> EngineError {
    EngineError::format(FORMAT_ID, e.to_string())
}
