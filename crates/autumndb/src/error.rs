use thiserror::Error;

/// Crate-wide error type for AutumnDB.
///
/// Covers the storage engine, the operation engine, the wire codec and the
/// AAE replicator so that `?` composes across all of them.
#[derive(Error, Debug)]
pub enum AutumnError {
    /// Filesystem operation failed.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Document or metadata payload was not valid JSON.
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// A malformed wire frame: bad opcode, truncated body, or a length field
    /// that does not agree with the bytes that follow it.
    #[error("protocol error: {reason}")]
    Protocol { reason: String },

    /// Collection or document does not exist.
    #[error("'{what}' not found: {name}")]
    NotFound { what: &'static str, name: String },

    /// Filesystem create collided with an existing path.
    #[error("'{what}' already exists: {name}")]
    AlreadyExists { what: &'static str, name: String },

    /// Document body does not parse as JSON.
    #[error("invalid document payload: {reason}")]
    InvalidPayload { reason: String },

    /// Write attempted against a document with `is_frozen = true`.
    #[error("document '{id}' in collection '{collection}' is frozen")]
    FrozenConflict { collection: String, id: String },

    /// A neighbor did not answer a snapshot check or document push in time.
    #[error("peer unavailable: {addr}")]
    PeerUnavailable { addr: String },

    /// The node configuration file was missing or failed to parse.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

/// Result type alias used throughout AutumnDB.
pub type Result<T> = std::result::Result<T, AutumnError>;
