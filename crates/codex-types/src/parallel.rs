//! Multi-corpus extensions: parallel alignments and interlinear layers.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::corpus::Corpus;
use crate::reference::Ref;

/// Lightweight pointer to a corpus taking part in an alignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusRef {
    pub id: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub title: String,
}

impl From<&Corpus> for CorpusRef {
    fn from(c: &Corpus) -> Self {
        Self {
            id: c.id.clone(),
            language: c.language.clone(),
            title: c.title.clone(),
        }
    }
}

/// Granularity of an alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentLevel {
    Book,
    Chapter,
    Verse,
    Token,
}

/// One aligned position across corpora: a reference and the text each
/// corpus has there. A corpus missing from `texts` has no text at `ref`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedUnit {
    pub id: String,
    #[serde(rename = "ref")]
    pub reference: Ref,
    pub texts: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    pub id: String,
    pub level: AlignmentLevel,
    #[serde(default)]
    pub units: Vec<AlignedUnit>,
}

/// Several translations aligned against each other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelCorpus {
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_corpus: Option<CorpusRef>,
    pub corpora: Vec<CorpusRef>,
    #[serde(default)]
    pub alignments: Vec<Alignment>,
    /// Id of the alignment used when a consumer does not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_alignment: Option<String>,
}

impl ParallelCorpus {
    /// Build a verse-level alignment by joining corpora on `osis_id`.
    ///
    /// The first corpus is the base; its verse order drives the unit order,
    /// and verses that only appear in later corpora are appended in the
    /// order they are first seen.
    pub fn align_by_verse(id: impl Into<String>, corpora: &[Corpus]) -> Self {
        let id = id.into();
        let mut units: Vec<AlignedUnit> = Vec::new();
        let mut by_osis: HashMap<String, usize> = HashMap::new();

        for corpus in corpora {
            for (_, block) in corpus.blocks() {
                let Some(r) = block.verse_ref() else { continue };
                let idx = *by_osis.entry(r.osis_id.clone()).or_insert_with(|| {
                    units.push(AlignedUnit {
                        id: r.osis_id.clone(),
                        reference: r.clone(),
                        texts: BTreeMap::new(),
                    });
                    units.len() - 1
                });
                units[idx]
                    .texts
                    .entry(corpus.id.clone())
                    .and_modify(|t| {
                        t.push(' ');
                        t.push_str(&block.text);
                    })
                    .or_insert_with(|| block.text.clone());
            }
        }

        let alignment_id = format!("{id}.verse");
        Self {
            id,
            version: "1.0.0".to_string(),
            base_corpus: corpora.first().map(CorpusRef::from),
            corpora: corpora.iter().map(CorpusRef::from).collect(),
            alignments: vec![Alignment {
                id: alignment_id.clone(),
                level: AlignmentLevel::Verse,
                units,
            }],
            default_alignment: Some(alignment_id),
        }
    }

    /// The alignment named by `default_alignment`, or the first one.
    pub fn primary_alignment(&self) -> Option<&Alignment> {
        self.default_alignment
            .as_deref()
            .and_then(|id| self.alignments.iter().find(|a| a.id == id))
            .or_else(|| self.alignments.first())
    }
}

/// One annotation layer of an interlinear line (surface text, gloss,
/// lemma, morphology, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlinearLayer {
    #[serde(default)]
    pub corpus_id: String,
    #[serde(default)]
    pub label: String,
    pub tokens: Vec<String>,
}

/// One verse rendered as stacked, token-aligned layers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlinearLine {
    #[serde(rename = "ref")]
    pub reference: Ref,
    pub layers: BTreeMap<String, InterlinearLayer>,
}

impl InterlinearLine {
    /// Returns `true` if every layer has the same number of tokens.
    pub fn is_aligned(&self) -> bool {
        let mut counts = self.layers.values().map(|l| l.tokens.len());
        match counts.next() {
            Some(first) => counts.all(|n| n == first),
            None => true,
        }
    }
}
