//! Sub-word segmentation of block text.
//!
//! Offsets are counted in Unicode scalar values, the same unit used by
//! [`Anchor::position`](crate::Anchor::position), so tokens and anchors can
//! be compared directly.

use std::collections::BTreeMap;

use crate::corpus::{Token, TokenKind};

/// Punctuation outside ASCII that commonly appears in Bible texts
/// (Hebrew sof pasuq and maqaf, Greek ano teleia, guillemets, dashes).
const EXTRA_PUNCTUATION: &[char] = &[
    '\u{05C3}', '\u{05BE}', '\u{0387}', '\u{00B7}', '\u{00AB}', '\u{00BB}', '\u{2013}', '\u{2014}',
    '\u{201C}', '\u{201D}', '\u{2018}', '\u{00BF}', '\u{00A1}', '\u{037E}',
];

fn is_punctuation(c: char) -> bool {
    (c.is_ascii_punctuation() && c != '\'') || EXTRA_PUNCTUATION.contains(&c)
}

/// Split text into word and punctuation tokens.
///
/// Whitespace separates tokens and is not itself a token. Each punctuation
/// character is its own token; apostrophes stay inside words.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;
    let mut word = String::new();

    let mut pos = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            flush(&mut tokens, &mut word_start, &mut word, pos);
        } else if is_punctuation(c) {
            flush(&mut tokens, &mut word_start, &mut word, pos);
            tokens.push(make_token(
                tokens.len(),
                pos,
                pos + 1,
                c.to_string(),
                TokenKind::Punctuation,
            ));
        } else {
            if word_start.is_none() {
                word_start = Some(pos);
            }
            word.push(c);
        }
        pos += 1;
    }
    flush(&mut tokens, &mut word_start, &mut word, pos);
    tokens
}

fn flush(tokens: &mut Vec<Token>, start: &mut Option<usize>, word: &mut String, end: usize) {
    if let Some(s) = start.take() {
        tokens.push(make_token(tokens.len(), s, end, std::mem::take(word), TokenKind::Word));
    }
}

fn make_token(index: usize, start: usize, end: usize, text: String, kind: TokenKind) -> Token {
    Token {
        id: format!("t{index}"),
        index,
        char_start: start,
        char_end: end,
        text,
        kind,
        attributes: BTreeMap::new(),
    }
}

/// Number of characters in `text`, in the unit used for anchor positions.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
