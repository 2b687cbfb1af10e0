use std::path::PathBuf;

use codex_types::Sha256Digest;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Where a stored blob lives and what it is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Lowercase hex SHA-256 of the blob.
    pub hash: String,
    pub size_bytes: u64,
    /// Location of the blob (`<root>/<hash[0:2]>/<hash>` for the filesystem
    /// backend).
    pub path: PathBuf,
    /// `false` if identical bytes were already stored and the write was
    /// skipped.
    pub newly_written: bool,
}

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - The key of a blob is the SHA-256 of its exact bytes.
/// - Storing identical bytes twice yields the same key and location; the
///   second write may be skipped but must never alter the existing blob.
/// - A blob becomes visible only once fully written.
/// - The store never interprets blob contents.
pub trait BlobStore {
    /// Store bytes and return where they live.
    fn store(&self, bytes: &[u8]) -> StoreResult<BlobRef>;

    /// Read a blob by hex hash, verifying its content.
    ///
    /// Returns `Ok(None)` if the blob does not exist.
    fn read(&self, hash: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Check whether a blob exists.
    fn exists(&self, hash: &str) -> StoreResult<bool>;

    /// The location a blob with this digest has (or would have).
    fn path_for(&self, digest: &Sha256Digest) -> PathBuf;
}
