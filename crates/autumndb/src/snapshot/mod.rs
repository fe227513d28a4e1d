//! Spectral Bloom filter + rolling digest (component I).
//!
//! Both summaries are computed over the concatenation of a document's JSON
//! leaf values. The pair `(SBF bytes || digest bytes)` is the [`Snapshot`];
//! two documents are considered identical iff their snapshots are byte-equal.

mod digest;
mod leaves;
mod sbf;

pub use digest::Ph2Digest;
pub use leaves::leaf_bytes;
pub use sbf::SpectralBloomFilter;

use crate::error::Result;

/// A content-summary fingerprint: `(SBF bytes, PH2 digest bytes)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    sbf: SpectralBloomFilter,
    digest: Ph2Digest,
}

impl Snapshot {
    /// Computes the snapshot of a parsed JSON document.
    pub fn of(value: &serde_json::Value) -> Self {
        let bytes = leaf_bytes(value);
        let mut sbf = SpectralBloomFilter::new();
        sbf.add(&bytes);
        let mut digest = Ph2Digest::new();
        digest.append(&bytes);
        Self { sbf, digest }
    }

    /// Computes the snapshot directly from raw document bytes, parsing them
    /// as JSON first.
    pub fn of_payload(payload: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        Ok(Self::of(&value))
    }

    /// Encodes as `SBF bytes || digest bytes`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.sbf.encode();
        out.extend_from_slice(&self.digest.encode());
        out
    }

    /// Decodes a snapshot previously produced by [`Self::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let digest_start = bytes.len().saturating_sub(crate::constants::PH2_DIGEST_LEN);
        let (sbf_bytes, digest_bytes) = bytes.split_at(digest_start);
        Ok(Self {
            sbf: SpectralBloomFilter::decode(sbf_bytes)?,
            digest: Ph2Digest::decode(digest_bytes)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn byte_equal_documents_have_byte_equal_snapshots() {
        let a = Snapshot::of(&json!({"name": "Alice", "age": 30}));
        let b = Snapshot::of(&json!({"name": "Alice", "age": 30}));
        assert_eq!(a.encode(), b.encode());
    }

    #[test]
    fn different_content_gives_different_snapshot() {
        let a = Snapshot::of(&json!({"name": "Alice"}));
        let b = Snapshot::of(&json!({"name": "Bob"}));
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn snapshot_encode_decode_round_trips_byte_for_byte() {
        let snapshot = Snapshot::of(&json!({"a": [1, 2, 3], "b": "text"}));
        let encoded = snapshot.encode();
        let decoded = Snapshot::decode(&encoded).unwrap();
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn of_payload_rejects_invalid_json() {
        assert!(Snapshot::of_payload(b"not json").is_err());
    }
}
