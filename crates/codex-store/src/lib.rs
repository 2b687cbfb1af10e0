//! Content-addressed blob storage for Codex.
//!
//! Ingested source files are stored verbatim, keyed by the lowercase hex
//! SHA-256 of their bytes, at `<root>/<hash[0:2]>/<hash>`.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`FsBlobStore`] -- sharded directory tree, write-then-rename
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written; the key is the content hash.
//! 2. Storing identical bytes twice is a no-op that returns the same location.
//! 3. A blob is visible under its final name only once it is fully written.
//! 4. Reads re-hash the content and report corruption.
//! 5. The store never interprets blob contents.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use memory::InMemoryBlobStore;
pub use traits::{BlobRef, BlobStore};
