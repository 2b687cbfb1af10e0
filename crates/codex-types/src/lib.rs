//! Intermediate representation (IR) shared by every Codex converter.
//!
//! A native Bible format is translated into a [`Corpus`] of ordered
//! [`Document`]s, each holding immutable [`ContentBlock`]s. Structure
//! (verses, chapters, notes, word tagging) is layered on top of the text as
//! [`Span`]s between zero-width [`Anchor`]s, so several annotation layers can
//! overlap without copying or mutating text.
//!
//! # Key Types
//!
//! - [`Corpus`] / [`Document`] / [`ContentBlock`] -- the text model
//! - [`Anchor`] / [`Span`] / [`Ref`] -- the overlay model and scripture locator
//! - [`LossClass`] / [`LossReport`] -- fidelity classification (L0-L3)
//! - [`RawPayload`] -- original bytes carried for bit-exact replay
//! - [`ParallelCorpus`] / [`InterlinearLine`] -- multi-corpus extensions
//! - [`Sha256Digest`] -- content hash used by the IR and the blob store

pub mod corpus;
pub mod digest;
pub mod error;
pub mod loss;
pub mod parallel;
pub mod raw;
pub mod reference;
pub mod text;

pub use corpus::{
    Anchor, Attributes, ContentBlock, Corpus, Document, Span, SpanType, Token, TokenKind,
};
pub use digest::{sha256_hex, Sha256Digest};
pub use error::TypeError;
pub use loss::{LossClass, LossReport, LostElement, BYTE_SERIALIZATION};
pub use parallel::{
    AlignedUnit, Alignment, AlignmentLevel, CorpusRef, InterlinearLayer, InterlinearLine,
    ParallelCorpus,
};
pub use raw::{legacy_raw_attribute, RawPayload};
pub use reference::Ref;
pub use text::{char_len, tokenize};
