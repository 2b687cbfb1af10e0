use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use codex_types::Sha256Digest;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobRef, BlobStore};

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Paths are virtual: the same relative
/// `<shard>/<hash>` layout the filesystem backend uses, without a root.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn store(&self, bytes: &[u8]) -> StoreResult<BlobRef> {
        let digest = Sha256Digest::of(bytes);
        let hash = digest.to_hex();
        let mut map = self.blobs.write().expect("lock poisoned");
        let newly_written = !map.contains_key(&hash);
        map.entry(hash.clone()).or_insert_with(|| bytes.to_vec());
        Ok(BlobRef {
            hash,
            size_bytes: bytes.len() as u64,
            path: self.path_for(&digest),
            newly_written,
        })
    }

    fn read(&self, hash: &str) -> StoreResult<Option<Vec<u8>>> {
        let digest = Sha256Digest::from_hex(hash)?;
        let map = self.blobs.read().expect("lock poisoned");
        match map.get(&digest.to_hex()) {
            None => Ok(None),
            Some(bytes) => {
                let computed = Sha256Digest::of(bytes);
                if computed != digest {
                    return Err(StoreError::HashMismatch {
                        expected: digest.to_hex(),
                        computed: computed.to_hex(),
                    });
                }
                Ok(Some(bytes.clone()))
            }
        }
    }

    fn exists(&self, hash: &str) -> StoreResult<bool> {
        let digest = Sha256Digest::from_hex(hash)?;
        Ok(self
            .blobs
            .read()
            .expect("lock poisoned")
            .contains_key(&digest.to_hex()))
    }

    fn path_for(&self, digest: &Sha256Digest) -> PathBuf {
        PathBuf::from(digest.shard()).join(digest.to_hex())
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}
