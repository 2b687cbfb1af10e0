use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use codex_types::Sha256Digest;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobRef, BlobStore};

/// Filesystem blob store with a two-level sharded layout.
///
/// A blob with hash `h` lives at `<root>/<h[0:2]>/<h>`, which bounds the
/// fan-out of any single directory to 256 shards. Blobs are written to a
/// temporary file inside the shard directory and renamed into place only
/// after the bytes are flushed to disk, so an interrupted write never leaves
/// a file under a valid blob name.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root`. Directories are created lazily on the
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for FsBlobStore {
    fn store(&self, bytes: &[u8]) -> StoreResult<BlobRef> {
        let digest = Sha256Digest::of(bytes);
        let path = self.path_for(&digest);
        let blob = |newly_written| BlobRef {
            hash: digest.to_hex(),
            size_bytes: bytes.len() as u64,
            path: path.clone(),
            newly_written,
        };

        if path.exists() {
            debug!(hash = %digest.short_hex(), "blob already stored; skipping write");
            return Ok(blob(false));
        }

        let shard_dir = self.root.join(digest.shard());
        fs::create_dir_all(&shard_dir).map_err(|e| StoreError::io(&shard_dir, e))?;

        let mut tmp = NamedTempFile::new_in(&shard_dir).map_err(|e| StoreError::io(&shard_dir, e))?;
        write_fully(&mut tmp, bytes).map_err(|e| StoreError::io(tmp.path(), e))?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!(hash = %digest.short_hex(), size = bytes.len(), "blob written");
                Ok(blob(true))
            }
            // Another writer committed the same content first.
            Err(_) if path.exists() => Ok(blob(false)),
            Err(e) => Err(StoreError::io(&path, e.error)),
        }
    }

    fn read(&self, hash: &str) -> StoreResult<Option<Vec<u8>>> {
        let digest = Sha256Digest::from_hex(hash)?;
        let path = self.path_for(&digest);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let computed = Sha256Digest::of(&bytes);
        if computed != digest {
            return Err(StoreError::HashMismatch {
                expected: digest.to_hex(),
                computed: computed.to_hex(),
            });
        }
        Ok(Some(bytes))
    }

    fn exists(&self, hash: &str) -> StoreResult<bool> {
        let digest = Sha256Digest::from_hex(hash)?;
        Ok(self.path_for(&digest).is_file())
    }

    fn path_for(&self, digest: &Sha256Digest) -> PathBuf {
        self.root.join(digest.shard()).join(digest.to_hex())
    }
}

fn write_fully(tmp: &mut NamedTempFile, bytes: &[u8]) -> io::Result<()> {
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()
}
