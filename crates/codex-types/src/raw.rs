use serde::{Deserialize, Serialize};

use crate::digest::Sha256Digest;

/// Legacy corpus attribute key holding hex-encoded raw bytes (`_<format>_raw`).
pub fn legacy_raw_attribute(format: &str) -> String {
    format!("_{format}_raw")
}

/// Original source bytes carried inside the IR for bit-exact replay.
///
/// Only the native format named in `format` may replay these bytes; a
/// converter for another format ignores them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPayload {
    /// Format id of the converter that captured the bytes.
    pub format: String,
    /// SHA-256 of `bytes`, checked before replay.
    pub sha256: Sha256Digest,
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

impl RawPayload {
    pub fn new(format: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            format: format.into(),
            sha256: Sha256Digest::of(&bytes),
            bytes,
        }
    }

    /// Returns `true` if the stored digest matches the bytes.
    pub fn verify(&self) -> bool {
        Sha256Digest::of(&self.bytes) == self.sha256
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for RawPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawPayload")
            .field("format", &self.format)
            .field("sha256", &self.sha256)
            .field("len", &self.bytes.len())
            .finish()
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
