//! `olb`: flat verse-per-line text.
//!
//! The simplest useful Bible interchange format. One verse per line in the
//! [verse-line grammar](crate::verse_line); books become documents in the
//! order they first appear.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use codex_engine::{
    reject_non_file, Capabilities, Converter, EngineConfig, EngineError, EngineResult,
    Extraction, Source, Synthesis,
};
use codex_protocol::DetectResult;
use codex_types::{
    Corpus, Document, InterlinearLine, LossClass, LossReport, LostElement, ParallelCorpus,
};
use tracing::debug;

use crate::verse_line::{
    looks_like_verse_text, render_header, render_verse, verse_block, VerseText, HEADER_KEYS,
};

pub const FORMAT_ID: &str = "olb";

/// Bytes read from the head of a file when sniffing.
const SNIFF_BYTES: u64 = 64 * 1024;

#[derive(Clone, Copy, Debug, Default)]
pub struct OlbConverter;

impl Converter for OlbConverter {
    fn format_id(&self) -> &'static str {
        FORMAT_ID
    }

    fn description(&self) -> &'static str {
        "Verse-per-line text (`Book C:V text`)"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["olb", "txt"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            extract_ceiling: LossClass::L1,
            emit_ceiling: LossClass::L1,
            parallel: true,
            interlinear: true,
        }
    }

    fn detect(&self, path: &Path) -> EngineResult<DetectResult> {
        if let Some(rejected) = reject_non_file(path) {
            return Ok(rejected);
        }
        let head = read_head(path)?;
        let Some(text) = utf8_prefix(&head) else {
            return Ok(DetectResult::not_matched("content is not UTF-8 text"));
        };
        if looks_like_verse_text(text) {
            Ok(DetectResult::matched(
                FORMAT_ID,
                "first content line is a `Book C:V text` verse line",
            ))
        } else {
            Ok(DetectResult::not_matched(
                "no `Book C:V text` verse line at the start of the file",
            ))
        }
    }

    fn ingest_metadata(&self, bytes: &[u8]) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        if let Ok(text) = std::str::from_utf8(bytes) {
            let parsed = VerseText::parse(text);
            meta.insert("verse_count".to_string(), parsed.verses.len().to_string());
            if let Some(title) = parsed.header("title") {
                meta.insert("title".to_string(), title.to_string());
            }
        }
        meta
    }

    fn extract(&self, source: &Source<'_>, _config: &EngineConfig) -> EngineResult<Extraction> {
        let text = std::str::from_utf8(source.bytes)
            .map_err(|e| EngineError::format(FORMAT_ID, format!("source is not UTF-8: {e}")))?;
        let parsed = VerseText::parse(text);
        let mut report = LossReport::lossless(FORMAT_ID, "ir");

        let id = parsed
            .header("id")
            .map(str::to_string)
            .unwrap_or_else(|| source.stem());
        let mut corpus = Corpus::new(id, FORMAT_ID);
        if let Some(v) = parsed.header("title") {
            corpus.title = v.to_string();
        }
        if let Some(v) = parsed.header("language") {
            corpus.language = v.to_string();
        }
        if let Some(v) = parsed.header("version") {
            corpus.version = v.to_string();
        }
        if let Some(v) = parsed.header("description") {
            corpus.description = v.to_string();
        }

        let mut documents: Vec<Document> = Vec::new();
        let mut by_book: HashMap<&str, usize> = HashMap::new();
        for (_, reference, verse_text) in &parsed.verses {
            let idx = *by_book.entry(reference.book.as_str()).or_insert_with(|| {
                documents.push(Document::new(reference.book.clone(), reference.book.clone()));
                documents.len() - 1
            });
            let doc = &mut documents[idx];
            let block_id = format!("{}.b{}", doc.id, doc.content_blocks.len());
            doc.push_block(verse_block(block_id, reference.clone(), verse_text));
        }
        for doc in documents {
            corpus.push_document(doc);
        }

        parsed.record_dropped(&mut report, "");
        if parsed.verses.is_empty() {
            report.warn("no verse lines found");
        }

        debug!(
            corpus = %corpus.id,
            verses = parsed.verses.len(),
            comments = parsed.comments.len(),
            unparsed = parsed.unparsed.len(),
            "olb parsed"
        );
        Ok(Extraction { corpus, report })
    }

    fn synthesize(&self, corpus: &Corpus, _config: &EngineConfig) -> EngineResult<Synthesis> {
        let mut report = LossReport::lossless("ir", FORMAT_ID);
        let mut lines = Vec::new();

        for key in HEADER_KEYS {
            let value = match key {
                "id" => corpus.id.as_str(),
                "title" => corpus.title.as_str(),
                "language" => corpus.language.as_str(),
                "version" => corpus.version.as_str(),
                _ => corpus.description.as_str(),
            };
            if !value.is_empty() {
                lines.push(render_header(key, &single_line(value)));
            }
        }

        for (doc, block) in corpus.blocks() {
            let path = format!("{}/{}", doc.id, block.id);
            let Some(reference) = block.verse_ref() else {
                report.record(
                    LostElement::new(path, "block", "block has no verse reference")
                        .with_original(block.text.clone()),
                    LossClass::L2,
                );
                continue;
            };
            if reference.sub_verse.is_some() {
                report.record(
                    LostElement::new(&path, "sub_verse", "verse lines cannot mark sub-verses"),
                    LossClass::L2,
                );
            }
            let text = single_line(&block.text);
            if text != block.text {
                report.record(
                    LostElement::new(&path, "line_break", "verse text folded onto one line"),
                    LossClass::L2,
                );
            }
            lines.push(render_verse(reference, &text));
        }

        Ok(Synthesis {
            bytes: join_lines(lines),
            report,
        })
    }

    fn emit_parallel(&self, parallel: &ParallelCorpus) -> EngineResult<Synthesis> {
        let alignment = parallel.primary_alignment().ok_or_else(|| {
            EngineError::format(
                FORMAT_ID,
                format!("parallel corpus {} has no alignments", parallel.id),
            )
        })?;
        let mut report = LossReport::lossless("ir", FORMAT_ID);

        let mut header = vec!["ref".to_string()];
        header.extend(parallel.corpora.iter().map(|c| c.id.clone()));
        let mut lines = vec![header.join("\t")];

        for unit in &alignment.units {
            let mut row = vec![unit.reference.to_string()];
            for corpus in &parallel.corpora {
                match unit.texts.get(&corpus.id) {
                    Some(text) => row.push(single_line(&text.replace('\t', " "))),
                    None => {
                        report.record(
                            LostElement::new(
                                format!("{}/{}", unit.id, corpus.id),
                                "missing_text",
                                "corpus has no text at this reference",
                            ),
                            LossClass::L2,
                        );
                        row.push(String::new());
                    }
                }
            }
            lines.push(row.join("\t"));
        }

        if parallel.alignments.len() > 1 {
            report.warn(format!(
                "only alignment {} was written; {} others ignored",
                alignment.id,
                parallel.alignments.len() - 1
            ));
        }
        Ok(Synthesis {
            bytes: join_lines(lines),
            report,
        })
    }

    fn emit_interlinear(&self, lines: &[InterlinearLine]) -> EngineResult<Synthesis> {
        let mut report = LossReport::lossless("ir", FORMAT_ID);
        let mut out = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                out.push(String::new());
            }
            if !line.is_aligned() {
                report.warn(format!("layers of {} have different token counts", line.reference));
            }
            out.push(line.reference.to_string());
            for (key, layer) in &line.layers {
                let label = if layer.label.is_empty() { key } else { &layer.label };
                out.push(format!("{label}: {}", layer.tokens.join(" ")));
            }
        }

        Ok(Synthesis {
            bytes: join_lines(out),
            report,
        })
    }
}

fn read_head(path: &Path) -> EngineResult<Vec<u8>> {
    let file = File::open(path)
        .map_err(|e| EngineError::io(format!("opening {}", path.display()), e))?;
    let mut head = Vec::new();
    file.take(SNIFF_BYTES)
        .read_to_end(&mut head)
        .map_err(|e| EngineError::io(format!("reading {}", path.display()), e))?;
    Ok(head)
}

/// The longest valid UTF-8 prefix, tolerating a character cut at the end
/// of a sniff window. `None` for content that is not UTF-8 at all.
fn utf8_prefix(bytes: &[u8]) -> Option<&str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Some(s),
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&bytes[..e.valid_up_to()]).ok(),
        Err(_) => None,
    }
}

fn single_line(text: &str) -> String {
    if text.contains(['\n', '\r']) {
        text.split(['\n', '\r'])
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        text.to_string()
    }
}

fn join_lines(lines: Vec<String>) -> Vec<u8> {
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out.into_bytes()
}
