//! Write-then-rename output.
//!
//! Every file a converter produces is written to a temporary file in the
//! destination directory and renamed over the final name only once the
//! bytes are flushed. A process killed mid-write leaves a `.tmp*` file that
//! can never be mistaken for committed output.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Atomically write `bytes` to `dir/file_name`, creating `dir` if needed.
///
/// An existing file at the destination is replaced.
pub fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> EngineResult<PathBuf> {
    if file_name.is_empty()
        || file_name.contains(['/', '\\'])
        || file_name == "."
        || file_name == ".."
    {
        return Err(EngineError::io(
            format!("refusing to write output named {file_name:?}"),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a plain file name"),
        ));
    }

    ensure_dir(dir)?;
    let target = dir.join(file_name);

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| EngineError::io(format!("creating temporary file in {}", dir.display()), e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.flush())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| EngineError::io(format!("writing {}", target.display()), e))?;
    tmp.persist(&target)
        .map_err(|e| EngineError::io(format!("committing {}", target.display()), e.error))?;

    debug!(path = %target.display(), size = bytes.len(), "output committed");
    Ok(target)
}

/// Create an output directory (and parents) if it does not exist.
pub fn ensure_dir(dir: &Path) -> EngineResult<()> {
    fs::create_dir_all(dir)
        .map_err(|e| EngineError::io(format!("creating output directory {}", dir.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");
        let path = write_atomic(&out, "kjv.ir.json", b"{}").unwrap();
        assert_eq!(path, out.join("kjv.ir.json"));
        assert_eq!(fs::read(&path).unwrap(), b"{}");
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        write_atomic(dir.path(), "a.txt", b"old").unwrap();
        let path = write_atomic(dir.path(), "a.txt", b"new").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"new");
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["", "..", "a/b", "a\\b"] {
            assert!(write_atomic(dir.path(), bad, b"x").is_err(), "{bad:?}");
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
