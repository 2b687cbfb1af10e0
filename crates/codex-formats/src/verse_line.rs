//! The verse-per-line text grammar shared by the `olb` and `zip` converters.
//!
//! ```text
//! #title: King James Version
//! #language: en
//! # free-form comment
//! Gen 1:1 In the beginning God created the heaven and the earth.
//! Gen 1:2-3 And the earth was without form, and void; ...
//! ```
//!
//! A book code is ASCII alphanumeric with at least one letter (`Gen`,
//! `1Kgs`). Chapter and verse are decimal; `V-E` is a range within the
//! chapter. The text is everything after the single space following the
//! reference. `#key: value` is a header when `key` is one of
//! [`HEADER_KEYS`]; any other `#` line is a comment.

use codex_types::{
    tokenize, ContentBlock, LossClass, LossReport, LostElement, Ref, SpanType,
};

/// UTF-8 byte-order mark, as written by many text exporters.
pub const BOM: char = '\u{FEFF}';

/// Header keys that carry corpus metadata.
pub const HEADER_KEYS: [&str; 5] = ["id", "title", "language", "version", "description"];

/// One classified source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    Header { key: &'a str, value: &'a str },
    Comment(&'a str),
    Verse { reference: Ref, text: &'a str },
    Unparsed(&'a str),
}

pub fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if let Some(rest) = trimmed.strip_prefix('#') {
        if let Some((key, value)) = rest.split_once(':') {
            let key = key.trim();
            if HEADER_KEYS.contains(&key) {
                return Line::Header {
                    key,
                    value: value.trim(),
                };
            }
        }
        return Line::Comment(line);
    }
    match parse_verse(line.trim_start()) {
        Some((reference, text)) => Line::Verse { reference, text },
        None => Line::Unparsed(line),
    }
}

/// Parse `Book C:V text` or `Book C:V-E text`.
pub fn parse_verse(line: &str) -> Option<(Ref, &str)> {
    let (book, rest) = line.split_once(' ')?;
    if !is_book_code(book) {
        return None;
    }
    let rest = rest.trim_start_matches(' ');
    let (cv, text) = rest.split_once(' ').unwrap_or((rest, ""));
    let (c, v) = cv.split_once(':')?;
    let chapter = parse_number(c)?;
    let reference = match v.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (parse_number(start)?, parse_number(end)?);
            if end < start {
                return None;
            }
            Ref::range(book, chapter, start, end)
        }
        None => Ref::new(book, chapter, parse_number(v)?),
    };
    Some((reference, text))
}

fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn is_book_code(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric())
        && s.chars().any(|c| c.is_ascii_alphabetic())
}

/// Render a verse line. Sub-verse markers have no place in the grammar and
/// are dropped.
pub fn render_verse(reference: &Ref, text: &str) -> String {
    let mut line = format!("{} {}:{}", reference.book, reference.chapter, reference.verse);
    if let Some(end) = reference.verse_end {
        line.push_str(&format!("-{end}"));
    }
    if !text.is_empty() {
        line.push(' ');
        line.push_str(text);
    }
    line
}

pub fn render_header(key: &str, value: &str) -> String {
    format!("#{key}: {value}")
}

// ---------------------------------------------------------------------------
// Whole-text parsing
// ---------------------------------------------------------------------------

/// A verse text split into its parts, with 1-based line numbers.
#[derive(Debug, Default)]
pub struct VerseText<'a> {
    /// The text started with a byte-order mark.
    pub bom: bool,
    pub headers: Vec<(&'a str, &'a str)>,
    pub verses: Vec<(usize, Ref, &'a str)>,
    pub comments: Vec<(usize, &'a str)>,
    pub unparsed: Vec<(usize, &'a str)>,
}

impl<'a> VerseText<'a> {
    pub fn parse(text: &'a str) -> Self {
        let mut out = Self::default();
        let text = match text.strip_prefix(BOM) {
            Some(rest) => {
                out.bom = true;
                rest
            }
            None => text,
        };
        for (i, line) in text.lines().enumerate() {
            let n = i + 1;
            match classify(line) {
                Line::Blank => {}
                Line::Header { key, value } => out.headers.push((key, value)),
                Line::Comment(c) => out.comments.push((n, c)),
                Line::Verse { reference, text } => out.verses.push((n, reference, text)),
                Line::Unparsed(u) => out.unparsed.push((n, u)),
            }
        }
        out
    }

    /// Last value given for a header key.
    pub fn header(&self, key: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    /// Record comments (`L1`) and unparseable lines (`L2`) as lost.
    /// `location` prefixes the `line:N` path.
    pub fn record_dropped(&self, report: &mut LossReport, location: &str) {
        if self.bom {
            report.record(
                LostElement::new(line_path(location, 1), "byte_order_mark", "encoding marker"),
                LossClass::L1,
            );
        }
        for (n, comment) in &self.comments {
            report.record(
                LostElement::new(line_path(location, *n), "comment", "comments have no IR slot")
                    .with_original(*comment),
                LossClass::L1,
            );
        }
        for (n, line) in &self.unparsed {
            report.record(
                LostElement::new(line_path(location, *n), "unparsed_line", "not a verse line")
                    .with_original(*line),
                LossClass::L2,
            );
        }
    }
}

fn line_path(location: &str, n: usize) -> String {
    if location.is_empty() {
        format!("line:{n}")
    } else {
        format!("{location}:line:{n}")
    }
}

/// Returns `true` if the first content line (not blank, not `#`) is a
/// verse line.
pub fn looks_like_verse_text(text: &str) -> bool {
    text.trim_start_matches(BOM)
        .lines()
        .map(str::trim_end)
        .find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .is_some_and(|l| parse_verse(l.trim_start()).is_some())
}

// ---------------------------------------------------------------------------
// Block builders
// ---------------------------------------------------------------------------

/// A tokenized block with one `VERSE` span over its whole text.
pub fn verse_block(id: String, reference: Ref, text: &str) -> ContentBlock {
    let mut block = ContentBlock::new(id, text);
    block.tokens = tokenize(&block.text);
    block.cover_with_span(SpanType::Verse, Some(reference));
    block
}

/// A tokenized block with one `PARAGRAPH` span and no reference.
pub fn paragraph_block(id: String, text: &str) -> ContentBlock {
    let mut block = ContentBlock::new(id, text);
    block.tokens = tokenize(&block.text);
    block.cover_with_span(SpanType::Paragraph, None);
    block
}
