use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::sha256_hex;
use crate::error::TypeError;
use crate::loss::LossClass;
use crate::raw::{legacy_raw_attribute, RawPayload};
use crate::reference::Ref;
use crate::text::char_len;

/// Open string map used for format-specific extensions.
pub type Attributes = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

/// One logical Bible text collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub module_type: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub source_format: String,
    /// SHA-256 (hex) of the bytes that were ingested.
    #[serde(default)]
    pub source_hash: String,
    pub loss_class: LossClass,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub attributes: Attributes,
    /// Original bytes for bit-exact replay by the source format's converter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_bytes: Option<RawPayload>,
}

impl Corpus {
    /// Create an empty corpus. The id is lowercased.
    pub fn new(id: impl Into<String>, source_format: impl Into<String>) -> Self {
        Self {
            id: id.into().to_lowercase(),
            version: "1.0.0".to_string(),
            module_type: "BIBLE".to_string(),
            language: String::new(),
            title: String::new(),
            description: String::new(),
            source_format: source_format.into(),
            source_hash: String::new(),
            loss_class: LossClass::L0,
            documents: Vec::new(),
            attributes: Attributes::new(),
            raw_bytes: None,
        }
    }

    /// Append a document, assigning the next `order` value.
    pub fn push_document(&mut self, mut doc: Document) {
        doc.order = self.documents.last().map_or(1, |d| d.order + 1);
        self.documents.push(doc);
    }

    /// Total number of content blocks across all documents.
    pub fn block_count(&self) -> usize {
        self.documents.iter().map(|d| d.content_blocks.len()).sum()
    }

    /// Find a document by id.
    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// Iterate over every block in document order.
    pub fn blocks(&self) -> impl Iterator<Item = (&Document, &ContentBlock)> {
        self.documents
            .iter()
            .flat_map(|d| d.content_blocks.iter().map(move |b| (d, b)))
    }

    /// Store the raw source bytes for later replay.
    pub fn set_raw_payload(&mut self, format: &str, bytes: Vec<u8>) {
        self.raw_bytes = Some(RawPayload::new(format, bytes));
    }

    /// The raw replay bytes for `format`, if any.
    ///
    /// The dedicated `raw_bytes` field wins; the legacy `_<format>_raw`
    /// attribute (hex) is consulted otherwise. Empty payloads are treated as
    /// absent.
    pub fn raw_payload(&self, format: &str) -> Result<Option<Cow<'_, [u8]>>, TypeError> {
        if let Some(raw) = self.raw_bytes.as_ref().filter(|r| r.format == format) {
            if !raw.verify() {
                return Err(TypeError::RawDigestMismatch(format.to_string()));
            }
            if !raw.is_empty() {
                return Ok(Some(Cow::Borrowed(&raw.bytes)));
            }
        }
        match self.attributes.get(&legacy_raw_attribute(format)) {
            Some(hex_str) if !hex_str.is_empty() => {
                let bytes = hex::decode(hex_str).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
                Ok((!bytes.is_empty()).then_some(Cow::Owned(bytes)))
            }
            _ => Ok(None),
        }
    }

    /// Check the structural invariants of the corpus.
    ///
    /// Every violation is collected; the error lists all of them.
    pub fn validate(&self) -> Result<(), TypeError> {
        let mut violations = Vec::new();

        for pair in self.documents.windows(2) {
            if pair[1].order <= pair[0].order {
                violations.push(format!(
                    "document {} has order {} after document {} with order {}",
                    pair[1].id, pair[1].order, pair[0].id, pair[0].order
                ));
            }
        }

        for doc in &self.documents {
            doc.collect_violations(&mut violations);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(TypeError::InvalidCorpus {
                corpus: self.id.clone(),
                violations,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// One book or file-level unit within a corpus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub order: u32,
    #[serde(default)]
    pub content_blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            order: 0,
            content_blocks: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// Append a block, assigning the next `sequence` value.
    pub fn push_block(&mut self, mut block: ContentBlock) {
        block.sequence = self.content_blocks.last().map_or(0, |b| b.sequence + 1);
        self.content_blocks.push(block);
    }

    fn collect_violations(&self, out: &mut Vec<String>) {
        for pair in self.content_blocks.windows(2) {
            if pair[1].sequence <= pair[0].sequence {
                out.push(format!(
                    "{}: block {} sequence {} does not follow {}",
                    self.id, pair[1].id, pair[1].sequence, pair[0].sequence
                ));
            }
        }
        for block in &self.content_blocks {
            block.collect_violations(&self.id, out);
        }
    }
}

// ---------------------------------------------------------------------------
// ContentBlock
// ---------------------------------------------------------------------------

/// One paragraph- or verse-sized unit of immutable text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    pub sequence: u32,
    pub text: String,
    /// SHA-256 (hex) of `text`.
    pub hash: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
}

impl ContentBlock {
    /// Create a block, hashing its text.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            sequence: 0,
            hash: sha256_hex(text.as_bytes()),
            text,
            tokens: Vec::new(),
            anchors: Vec::new(),
        }
    }

    /// Attach a span covering the whole text, adding the two anchors it
    /// needs. Returns the span id.
    pub fn cover_with_span(&mut self, span_type: SpanType, reference: Option<Ref>) -> String {
        let n = self.anchors.len();
        let start_id = format!("{}.a{}", self.id, n);
        let end_id = format!("{}.a{}", self.id, n + 1);
        let span_id = format!("{}.s{}", self.id, self.spans().count());
        let span = Span {
            id: span_id.clone(),
            span_type,
            start_anchor_id: start_id.clone(),
            end_anchor_id: Some(end_id.clone()),
            reference,
            attributes: Attributes::new(),
        };
        self.anchors.push(Anchor {
            id: start_id,
            position: 0,
            spans: vec![span],
        });
        self.anchors.push(Anchor {
            id: end_id,
            position: char_len(&self.text),
            spans: Vec::new(),
        });
        span_id
    }

    /// Iterate over every span attached to this block.
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.anchors.iter().flat_map(|a| a.spans.iter())
    }

    /// The reference of the first `VERSE` span, if any.
    pub fn verse_ref(&self) -> Option<&Ref> {
        self.spans()
            .filter(|s| s.span_type == SpanType::Verse)
            .find_map(|s| s.reference.as_ref())
    }

    /// Returns `true` if `hash` matches the current text.
    pub fn hash_matches(&self) -> bool {
        self.hash == sha256_hex(self.text.as_bytes())
    }

    fn collect_violations(&self, doc_id: &str, out: &mut Vec<String>) {
        let at = |msg: String| format!("{doc_id}/{}: {msg}", self.id);

        if !self.hash_matches() {
            out.push(at("hash does not match text".into()));
        }

        let len = char_len(&self.text);
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for anchor in &self.anchors {
            if anchor.position > len {
                out.push(at(format!(
                    "anchor {} at {} is beyond text length {len}",
                    anchor.id, anchor.position
                )));
            }
            if positions.insert(anchor.id.as_str(), anchor.position).is_some() {
                out.push(at(format!("duplicate anchor id {}", anchor.id)));
            }
        }

        for anchor in &self.anchors {
            for span in &anchor.spans {
                if span.start_anchor_id != anchor.id {
                    out.push(at(format!(
                        "span {} is attached to anchor {} but starts at {}",
                        span.id, anchor.id, span.start_anchor_id
                    )));
                }
                if let Some(end_id) = &span.end_anchor_id {
                    match positions.get(end_id.as_str()) {
                        None => out.push(at(format!(
                            "span {} ends at unknown anchor {end_id}",
                            span.id
                        ))),
                        Some(&end) if end < anchor.position => out.push(at(format!(
                            "span {} ends before it starts",
                            span.id
                        ))),
                        Some(_) => {}
                    }
                }
                if let Some(r) = &span.reference {
                    if !r.is_consistent() {
                        out.push(at(format!(
                            "span {} has osis_id {} but fields say {}",
                            span.id,
                            r.osis_id,
                            r.derive_osis_id()
                        )));
                    }
                }
            }
        }

        for token in &self.tokens {
            if token.char_start > token.char_end || token.char_end > len {
                out.push(at(format!(
                    "token {} range {}..{} is outside the text",
                    token.id, token.char_start, token.char_end
                )));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tokens, anchors, spans
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Word,
    Punctuation,
}

/// Sub-word segment of a block's text, addressed by character offsets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub index: usize,
    pub char_start: usize,
    pub char_end: usize,
    pub text: String,
    pub kind: TokenKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
}

/// Zero-width position marker inside a block's text.
///
/// Carries the spans that start here; an anchor has no meaning of its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: String,
    /// Character offset into the block text.
    pub position: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<Span>,
}

/// Kind of annotation a span carries.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SpanType {
    Verse,
    Chapter,
    Paragraph,
    Note,
    CrossReference,
    Word,
    Other(String),
}

impl SpanType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Verse => "VERSE",
            Self::Chapter => "CHAPTER",
            Self::Paragraph => "PARAGRAPH",
            Self::Note => "NOTE",
            Self::CrossReference => "CROSS_REFERENCE",
            Self::Word => "WORD",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for SpanType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "VERSE" => Self::Verse,
            "CHAPTER" => Self::Chapter,
            "PARAGRAPH" => Self::Paragraph,
            "NOTE" => Self::Note,
            "CROSS_REFERENCE" => Self::CrossReference,
            "WORD" => Self::Word,
            _ => Self::Other(s),
        }
    }
}

impl From<SpanType> for String {
    fn from(t: SpanType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for SpanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Annotation between two anchors of the same block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: String,
    #[serde(rename = "type")]
    pub span_type: SpanType,
    pub start_anchor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_anchor_id: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Ref>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verse_block(id: &str, text: &str, r: Ref) -> ContentBlock {
        let mut b = ContentBlock::new(id, text);
        b.cover_with_span(SpanType::Verse, Some(r));
        b
    }

    fn two_verse_corpus() -> Corpus {
        let mut c = Corpus::new("KJV", "olb");
        let mut doc = Document::new("Gen", "Genesis");
        doc.push_block(verse_block("Gen.1.1", "In the beginning", Ref::new("Gen", 1, 1)));
        doc.push_block(verse_block("Gen.1.2", "And the earth", Ref::new("Gen", 1, 2)));
        c.push_document(doc);
        c
    }

    #[test]
    fn corpus_id_is_lowercased() {
        assert_eq!(Corpus::new("KJV", "olb").id, "kjv");
    }

    #[test]
    fn push_assigns_order_and_sequence() {
        let c = two_verse_corpus();
        assert_eq!(c.documents[0].order, 1);
        let seqs: Vec<u32> = c.documents[0].content_blocks.iter().map(|b| b.sequence).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(c.block_count(), 2);
    }

    #[test]
    fn block_hash_is_sha256_of_text() {
        let b = ContentBlock::new("b", "abc");
        assert_eq!(
            b.hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(b.hash_matches());
    }

    #[test]
    fn verse_ref_reaches_span_ref() {
        let c = two_verse_corpus();
        let ids: Vec<&str> = c
            .blocks()
            .map(|(_, b)| b.verse_ref().unwrap().osis_id.as_str())
            .collect();
        assert_eq!(ids, vec!["Gen.1.1", "Gen.1.2"]);
    }

    #[test]
    fn cover_with_span_places_anchors_at_both_ends() {
        let b = verse_block("x", "ἐν ἀρχῇ", Ref::new("John", 1, 1));
        assert_eq!(b.anchors.len(), 2);
        assert_eq!(b.anchors[0].position, 0);
        assert_eq!(b.anchors[1].position, 7);
        let span = &b.anchors[0].spans[0];
        assert_eq!(span.end_anchor_id.as_deref(), Some(b.anchors[1].id.as_str()));
    }

    #[test]
    fn overlapping_layers_share_text() {
        let mut b = ContentBlock::new("x", "Jesus wept.");
        b.cover_with_span(SpanType::Verse, Some(Ref::new("John", 11, 35)));
        b.cover_with_span(SpanType::Paragraph, None);
        assert_eq!(b.spans().count(), 2);
        assert_eq!(b.verse_ref().unwrap().osis_id, "John.11.35");

        let mut c = Corpus::new("test", "olb");
        let mut doc = Document::new("John", "John");
        doc.push_block(b);
        c.push_document(doc);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn validate_reports_sequence_regression() {
        let mut c = two_verse_corpus();
        c.documents[0].content_blocks[1].sequence = 0;
        let err = c.validate().unwrap_err();
        match err {
            TypeError::InvalidCorpus { violations, .. } => {
                assert_eq!(violations.len(), 1);
                assert!(violations[0].contains("sequence"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn validate_reports_duplicate_document_order() {
        let mut c = two_verse_corpus();
        let mut second = Document::new("Exod", "Exodus");
        second.push_block(ContentBlock::new("Exod.1.1", "Now these"));
        c.push_document(second);
        c.documents[1].order = c.documents[0].order;
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_reports_mutated_text() {
        let mut c = two_verse_corpus();
        c.documents[0].content_blocks[0].text.push('!');
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("hash does not match"));
    }

    #[test]
    fn validate_reports_dangling_end_anchor() {
        let mut c = two_verse_corpus();
        let block = &mut c.documents[0].content_blocks[0];
        block.anchors[0].spans[0].end_anchor_id = Some("nowhere".into());
        assert!(c.validate().unwrap_err().to_string().contains("unknown anchor"));
    }

    #[test]
    fn raw_payload_prefers_dedicated_field() {
        let mut c = two_verse_corpus();
        c.attributes
            .insert("_olb_raw".into(), hex::encode(b"legacy bytes"));
        c.set_raw_payload("olb", b"dedicated bytes".to_vec());
        assert_eq!(
            c.raw_payload("olb").unwrap().unwrap().as_ref(),
            b"dedicated bytes"
        );
    }

    #[test]
    fn raw_payload_falls_back_to_legacy_attribute() {
        let mut c = two_verse_corpus();
        c.attributes.insert("_zip_raw".into(), hex::encode(b"PK"));
        assert_eq!(c.raw_payload("zip").unwrap().unwrap().as_ref(), b"PK");
        assert!(c.raw_payload("olb").unwrap().is_none());
    }

    #[test]
    fn empty_raw_payload_is_absent() {
        let mut c = two_verse_corpus();
        c.attributes.insert("_zip_raw".into(), String::new());
        c.set_raw_payload("zip", Vec::new());
        assert!(c.raw_payload("zip").unwrap().is_none());
    }

    #[test]
    fn raw_payload_for_other_format_is_ignored() {
        let mut c = two_verse_corpus();
        c.set_raw_payload("zip", b"PK".to_vec());
        assert!(c.raw_payload("olb").unwrap().is_none());
    }

    #[test]
    fn corrupted_raw_payload_is_an_error() {
        let mut c = two_verse_corpus();
        c.set_raw_payload("olb", b"abc".to_vec());
        if let Some(raw) = c.raw_bytes.as_mut() {
            raw.bytes[0] = b'x';
        }
        assert_eq!(
            c.raw_payload("olb").unwrap_err(),
            TypeError::RawDigestMismatch("olb".into())
        );
    }

    #[test]
    fn json_field_names() {
        let c = two_verse_corpus();
        let v = serde_json::to_value(&c).unwrap();
        let span = &v["documents"][0]["content_blocks"][0]["anchors"][0]["spans"][0];
        assert_eq!(span["type"], "VERSE");
        assert_eq!(span["ref"]["osis_id"], "Gen.1.1");
        assert_eq!(v["loss_class"], "L0");
        assert!(v.get("raw_bytes").is_none());
    }

    #[test]
    fn unknown_span_type_survives_serde() {
        let t: SpanType = serde_json::from_str("\"MORPH\"").unwrap();
        assert_eq!(t, SpanType::Other("MORPH".into()));
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"MORPH\"");
    }
}
