use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Canonical scripture locator.
///
/// `osis_id` is derived from the other fields and is the stable join key
/// between formats (`Gen.1.1`, `Gen.1.1-Gen.1.3`, `Gen.1.1!a`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ref {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verse_end: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_verse: Option<String>,
    pub osis_id: String,
}

impl Ref {
    /// Single-verse reference.
    pub fn new(book: impl Into<String>, chapter: u32, verse: u32) -> Self {
        let mut r = Self {
            book: book.into(),
            chapter,
            verse,
            verse_end: None,
            sub_verse: None,
            osis_id: String::new(),
        };
        r.osis_id = r.derive_osis_id();
        r
    }

    /// Verse range within one chapter. A range ending on its start verse
    /// collapses to a single verse.
    pub fn range(book: impl Into<String>, chapter: u32, verse: u32, verse_end: u32) -> Self {
        let mut r = Self::new(book, chapter, verse);
        if verse_end != verse {
            r.verse_end = Some(verse_end);
            r.osis_id = r.derive_osis_id();
        }
        r
    }

    /// Attach a sub-verse marker (e.g. `a`, `b`).
    pub fn with_sub_verse(mut self, sub: impl Into<String>) -> Self {
        self.sub_verse = Some(sub.into());
        self.osis_id = self.derive_osis_id();
        self
    }

    /// Compute the OSIS id from the structured fields.
    pub fn derive_osis_id(&self) -> String {
        let mut id = format!("{}.{}.{}", self.book, self.chapter, self.verse);
        if let Some(end) = self.verse_end {
            id.push_str(&format!("-{}.{}.{}", self.book, self.chapter, end));
        }
        if let Some(sub) = &self.sub_verse {
            id.push('!');
            id.push_str(sub);
        }
        id
    }

    /// Returns `true` if the stored `osis_id` matches the structured fields.
    pub fn is_consistent(&self) -> bool {
        self.osis_id == self.derive_osis_id()
    }

    /// Parse `Book.C.V`, `Book.C.V!sub` or `Book.C.V-Book.C.E`.
    pub fn parse_osis(s: &str) -> Result<Self, TypeError> {
        let invalid = || TypeError::InvalidReference(s.to_string());

        let (body, sub) = match s.split_once('!') {
            Some((b, sub)) if !sub.is_empty() => (b, Some(sub)),
            Some(_) => return Err(invalid()),
            None => (s, None),
        };
        let (start, end) = match body.split_once('-') {
            Some((a, b)) => (a, Some(b)),
            None => (body, None),
        };

        let (book, chapter, verse) = split_osis(start).ok_or_else(invalid)?;
        let mut r = match end {
            Some(end) => {
                let (end_book, end_chapter, end_verse) = split_osis(end).ok_or_else(invalid)?;
                if end_book != book || end_chapter != chapter || end_verse < verse {
                    return Err(invalid());
                }
                Ref::range(book, chapter, verse, end_verse)
            }
            None => Ref::new(book, chapter, verse),
        };
        if let Some(sub) = sub {
            r = r.with_sub_verse(sub);
        }
        Ok(r)
    }
}

fn split_osis(s: &str) -> Option<(&str, u32, u32)> {
    let mut parts = s.rsplitn(3, '.');
    let verse = parts.next()?.parse().ok()?;
    let chapter = parts.next()?.parse().ok()?;
    let book = parts.next()?;
    if book.is_empty() {
        return None;
    }
    Some((book, chapter, verse))
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.book, self.chapter, self.verse)?;
        if let Some(end) = self.verse_end {
            write!(f, "-{end}")?;
        }
        if let Some(sub) = &self.sub_verse {
            write!(f, "{sub}")?;
        }
        Ok(())
    }
}
