//! Reference converters for Codex.
//!
//! - [`OlbConverter`] -- flat verse-per-line text (`Book C:V text`)
//! - [`ZipConverter`] -- ZIP bundles of per-book text members
//!
//! Both are plain [`Converter`](codex_engine::Converter) implementations;
//! [`default_registry`] registers them.

pub mod olb;
pub mod verse_line;
pub mod zip_bundle;

use codex_engine::ConverterRegistry;

pub use olb::OlbConverter;
pub use zip_bundle::ZipConverter;

/// A registry holding every converter in this crate.
pub fn default_registry() -> ConverterRegistry {
    let mut registry = ConverterRegistry::new();
    registry.register(OlbConverter);
    registry.register(ZipConverter);
    registry
}
