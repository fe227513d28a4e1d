//! PH2: an append-only polynomial rolling digest, used as a secondary
//! fingerprint to distinguish cases where SBF cell counts match but content
//! differs.

use crate::constants::PH2_DIGEST_LEN;
use crate::error::{AutumnError, Result};

const ROLLING_PRIME: u128 = 0x0100_0000_01b3;

/// A fixed-length (16-byte) rolling polynomial digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ph2Digest {
    accumulator: u128,
}

impl Ph2Digest {
    /// Builds a digest in its initial (empty) state.
    pub const fn new() -> Self { Self { accumulator: 0 } }

    /// Folds `bytes` into the digest, byte by byte.
    pub fn append(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.accumulator = self.accumulator.wrapping_mul(ROLLING_PRIME).wrapping_add(u128::from(byte));
        }
    }

    /// Encodes the digest as [`PH2_DIGEST_LEN`] big-endian bytes.
    pub fn encode(&self) -> [u8; PH2_DIGEST_LEN] { self.accumulator.to_be_bytes() }

    /// Decodes a digest previously produced by [`Self::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let array: [u8; PH2_DIGEST_LEN] = bytes.try_into().map_err(|_source| AutumnError::Protocol {
            reason: format!("PH2 digest must be exactly {PH2_DIGEST_LEN} bytes"),
        })?;
        Ok(Self {
            accumulator: u128::from_be_bytes(array),
        })
    }
}

impl Default for Ph2Digest {
    fn default() -> Self { Self::new() }
}
