//! Spectral Bloom filter: a counting-Bloom variant that returns the minimum
//! cell count across its `k` hash positions as an approximate membership
//! frequency.

use crate::constants::{SBF_CELL_BYTES, SBF_DEFAULT_K, SBF_DEFAULT_M};
use crate::error::{AutumnError, Result};

/// Fixed-size counting Bloom filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectralBloomFilter {
    cells: Vec<u32>,
    k: usize,
}

impl SpectralBloomFilter {
    /// Builds an empty filter with the default `m`/`k` parameters.
    pub fn new() -> Self { Self::with_params(SBF_DEFAULT_M, SBF_DEFAULT_K) }

    /// Builds an empty filter with explicit `m` cells and `k` hash functions.
    pub fn with_params(m: usize, k: usize) -> Self {
        Self {
            cells: vec![0_u32; m],
            k,
        }
    }

    /// Increments the cells at this filter's `k` hash positions for `bytes`.
    pub fn add(&mut self, bytes: &[u8]) {
        for position in self.positions(bytes) {
            if let Some(cell) = self.cells.get_mut(position) {
                *cell = cell.saturating_add(1);
            }
        }
    }

    /// Returns the minimum cell count across `bytes`'s `k` hash positions.
    pub fn query(&self, bytes: &[u8]) -> u32 {
        self.positions(bytes)
            .filter_map(|position| self.cells.get(position).copied())
            .min()
            .unwrap_or(0)
    }

    fn positions(&self, bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
        let (h1, h2) = double_hash(bytes);
        let m = self.cells.len();
        #[allow(clippy::as_conversions, reason = "m is small and fits in u64 for the modulo below")]
        (0..self.k).map(move |i| {
            let combined = h1.wrapping_add((i as u64).wrapping_mul(h2));
            usize::try_from(combined % m as u64).unwrap_or(0)
        })
    }

    /// Encodes the filter as `m` big-endian 4-byte cells, preceded by a
    /// fixed header (`m`, `k`, cell width) so future parameter changes fail
    /// decode cleanly instead of silently misreading bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(6 + self.cells.len() * SBF_CELL_BYTES);
        #[allow(clippy::as_conversions, reason = "cell counts fit comfortably in u32")]
        out.extend_from_slice(&(self.cells.len() as u32).to_be_bytes());
        #[allow(clippy::as_conversions, reason = "k is a small configured constant")]
        out.push(self.k as u8);
        out.push(SBF_CELL_BYTES as u8);
        for cell in &self.cells {
            out.extend_from_slice(&cell.to_be_bytes());
        }
        out
    }

    /// Decodes a filter previously produced by [`Self::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 6 {
            return Err(AutumnError::Protocol {
                reason: "SBF header truncated".to_string(),
            });
        }
        let (m_bytes, rest) = bytes.split_at(4);
        #[allow(clippy::unwrap_used, reason = "m_bytes is exactly 4 bytes by construction above")]
        let m = u32::from_be_bytes(m_bytes.try_into().unwrap());
        let m = usize::try_from(m).map_err(|_source| AutumnError::Protocol {
            reason: "SBF cell count does not fit in memory".to_string(),
        })?;
        let (&k_byte, rest) = rest.split_first().ok_or_else(|| AutumnError::Protocol {
            reason: "SBF header truncated before k".to_string(),
        })?;
        let (&cell_width, rest) = rest.split_first().ok_or_else(|| AutumnError::Protocol {
            reason: "SBF header truncated before cell width".to_string(),
        })?;
        if usize::from(cell_width) != SBF_CELL_BYTES {
            return Err(AutumnError::Protocol {
                reason: format!("unsupported SBF cell width {cell_width}"),
            });
        }
        if rest.len() != m * SBF_CELL_BYTES {
            return Err(AutumnError::Protocol {
                reason: "SBF body length does not match header".to_string(),
            });
        }

        let cells = rest
            .chunks_exact(SBF_CELL_BYTES)
            .map(|chunk| {
                #[allow(clippy::unwrap_used, reason = "chunks_exact(4) guarantees exactly 4 bytes")]
                u32::from_be_bytes(chunk.try_into().unwrap())
            })
            .collect();

        Ok(Self {
            cells,
            k: usize::from(k_byte),
        })
    }
}

impl Default for SpectralBloomFilter {
    fn default() -> Self { Self::new() }
}

/// Deterministic double-hash: two independent 64-bit FNV-1a variants, used
/// for the standard `h1 + i*h2` combination in Bloom-filter position derivation.
fn double_hash(bytes: &[u8]) -> (u64, u64) {
    const FNV_OFFSET_1: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME_1: u64 = 0x0000_0100_0000_01b3;
    const FNV_OFFSET_2: u64 = 0x8444_2325_cbf2_9ce4;
    const FNV_PRIME_2: u64 = 0x0000_01b3_0000_0100;

    let mut h1 = FNV_OFFSET_1;
    let mut h2 = FNV_OFFSET_2;
    for &byte in bytes {
        h1 = (h1 ^ u64::from(byte)).wrapping_mul(FNV_PRIME_1);
        h2 = (h2 ^ u64::from(byte)).wrapping_mul(FNV_PRIME_2);
    }
    (h1, h2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_on_empty_filter_is_zero() {
        let sbf = SpectralBloomFilter::new();
        assert_eq!(sbf.query(b"anything"), 0);
    }

    #[test]
    fn add_then_query_is_at_least_one() {
        let mut sbf = SpectralBloomFilter::new();
        sbf.add(b"hello");
        assert!(sbf.query(b"hello") >= 1);
    }

    #[test]
    fn encode_decode_round_trips() {
        let mut sbf = SpectralBloomFilter::new();
        sbf.add(b"alpha");
        sbf.add(b"beta");

        let decoded = SpectralBloomFilter::decode(&sbf.encode()).unwrap();
        assert_eq!(decoded, sbf);
    }

    #[test]
    fn decode_rejects_mismatched_cell_width() {
        let sbf = SpectralBloomFilter::new();
        let mut encoded = sbf.encode();
        encoded[5] = 8; // claim 8-byte cells while body still has 4-byte cells
        assert!(SpectralBloomFilter::decode(&encoded).is_err());
    }

    #[test]
    fn decode_rejects_truncated_body() {
        let sbf = SpectralBloomFilter::new();
        let mut encoded = sbf.encode();
        encoded.truncate(encoded.len() - 1);
        assert!(SpectralBloomFilter::decode(&encoded).is_err());
    }

    #[test]
    fn byte_equal_content_gives_byte_equal_filters() {
        let mut a = SpectralBloomFilter::new();
        let mut b = SpectralBloomFilter::new();
        a.add(b"same content");
        b.add(b"same content");
        assert_eq!(a.encode(), b.encode());
    }
}
