use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "CODEX_CONFIG";

/// Tunables shared by the host and the converters.
///
/// ```toml
/// embed_raw_bytes = true
/// max_raw_bytes = 268435456
/// max_entry_bytes = 67108864
/// pretty_ir = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Embed the source bytes in the IR so `emit-native` can replay them.
    pub embed_raw_bytes: bool,
    /// Sources larger than this are not embedded; the structural loss class
    /// stands instead.
    pub max_raw_bytes: u64,
    /// Container members larger than this are skipped during extraction.
    pub max_entry_bytes: u64,
    /// Pretty-print IR JSON files.
    pub pretty_ir: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embed_raw_bytes: true,
            max_raw_bytes: 256 * 1024 * 1024,
            max_entry_bytes: 64 * 1024 * 1024,
            pretty_ir: true,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> EngineResult<Self> {
        toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::io(format!("reading config {}", path.display()), e))?;
        debug!(path = %path.display(), "loaded engine config");
        Self::from_toml_str(&text)
    }

    /// Load from an explicit path, else from `$CODEX_CONFIG`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> EngineResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(p) if !p.is_empty() => Self::load(Path::new(&p)),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = EngineConfig::default();
        assert!(c.embed_raw_bytes);
        assert_eq!(c.max_raw_bytes, 256 * 1024 * 1024);
        assert_eq!(c.max_entry_bytes, 64 * 1024 * 1024);
        assert!(c.pretty_ir);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = EngineConfig::from_toml_str("embed_raw_bytes = false\n").unwrap();
        assert!(!c.embed_raw_bytes);
        assert_eq!(c.max_entry_bytes, EngineConfig::default().max_entry_bytes);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = EngineConfig::from_toml_str("max_raw_bytes = \"lots\"").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codex.toml");
        std::fs::write(&path, "pretty_ir = false\nmax_raw_bytes = 10\n").unwrap();
        let c = EngineConfig::resolve(Some(&path)).unwrap();
        assert!(!c.pretty_ir);
        assert_eq!(c.max_raw_bytes, 10);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
