//! Lookup of converters by format id.

use std::collections::BTreeMap;
use std::path::Path;

use codex_protocol::DetectResult;
use tracing::debug;

use crate::converter::Converter;
use crate::error::{EngineError, EngineResult};

/// Converters keyed by [`Converter::format_id`].
#[derive(Default)]
pub struct ConverterRegistry {
    converters: BTreeMap<&'static str, Box<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter, replacing any with the same id.
    pub fn register<C: Converter + 'static>(&mut self, converter: C) {
        self.converters
            .insert(converter.format_id(), Box::new(converter));
    }

    pub fn get(&self, format: &str) -> EngineResult<&dyn Converter> {
        self.converters
            .get(format)
            .map(|c| c.as_ref())
            .ok_or_else(|| EngineError::UnknownFormat(format.to_string()))
    }

    pub fn has(&self, format: &str) -> bool {
        self.converters.contains_key(format)
    }

    /// Format ids in sorted order.
    pub fn formats(&self) -> Vec<&'static str> {
        self.converters.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Converter> {
        self.converters.values().map(|c| c.as_ref())
    }

    /// Run every detector on `path`. Returns one result per format, in
    /// format-id order.
    pub fn detect_all(&self, path: &Path) -> Vec<(&'static str, DetectResult)> {
        self.converters
            .iter()
            .map(|(id, c)| {
                let result = c
                    .detect(path)
                    .unwrap_or_else(|e| DetectResult::not_matched(e.to_string()));
                debug!(format = id, detected = result.detected, "registry detect");
                (*id, result)
            })
            .collect()
    }

    /// The first format whose detector accepts `path`.
    pub fn detect(&self, path: &Path) -> Option<&'static str> {
        self.detect_all(path)
            .into_iter()
            .find(|(_, r)| r.detected)
            .map(|(id, _)| id)
    }

    /// Format claiming the extension of `path`, without reading it.
    pub fn format_for_extension(&self, path: &Path) -> Option<&'static str> {
        let ext = crate::converter::extension_of(path)?;
        self.converters
            .iter()
            .find(|(_, c)| c.extensions().iter().any(|e| e.eq_ignore_ascii_case(&ext)))
            .map(|(id, _)| *id)
    }
}
