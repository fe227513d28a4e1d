//! Constants for wire formats, directory layout and AAE timing.
//!
//! This module centralizes all special names and magic numbers to prevent typos
//! and keep the client, peer and on-disk formats in lockstep.

/// Directory name for document payloads within a collection.
pub const DATA_DIR: &str = "data";

/// Directory name for document metadata sidecars within a collection.
pub const METADATA_DIR: &str = "metadata";

/// Filename for collection-level metadata stored within a collection directory.
pub const COLLECTION_METADATA_FILE: &str = ".metadata.json";

/// Filename for store-level metadata stored in the data root directory.
pub const STORE_METADATA_FILE: &str = ".store_metadata.json";

/// `strftime`/`strptime` pattern for `DocumentId` and `updated_at` timestamps.
///
/// Rendered length is always [`DOC_ID_LENGTH`] bytes: `YYYY-MM-DDTHH:MM:SS.ffffffZ`
/// (microsecond precision, six fractional digits).
pub const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Fixed byte length of a `DocumentId` / `updated_at` timestamp string.
///
/// Six-digit microsecond precision renders to 27 bytes, not 26; see DESIGN.md.
pub const DOC_ID_LENGTH: usize = 27;

/// Ceiling on collection name length, in both client and peer frames.
pub const MAX_COLLECTION_NAME_LEN: usize = 255;

/// Default cell count for the spectral Bloom filter.
pub const SBF_DEFAULT_M: usize = 256;

/// Default number of hash functions for the spectral Bloom filter.
pub const SBF_DEFAULT_K: usize = 4;

/// Byte width of a single spectral Bloom filter cell on the wire.
pub const SBF_CELL_BYTES: usize = 4;

/// Digest length, in bytes, produced by the PH2 rolling digest.
pub const PH2_DIGEST_LEN: usize = 16;

/// Default client-protocol listening port.
pub const DEFAULT_CLIENT_PORT: u16 = 50000;

/// Poll timeout for the AAE answerer's UDP and TCP listeners.
pub const AAE_ANSWERER_POLL_TIMEOUT_MS: u64 = 200;

/// Timeout an AAE originator waits for a `CheckSnapshot` reply before giving up on a neighbor.
pub const AAE_ORIGINATOR_UDP_TIMEOUT_SECS: u64 = 3;

/// Single-byte terminator client frames use instead of closing the connection.
pub const FRAME_TERMINATOR: u8 = 0x00;
