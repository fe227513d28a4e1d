//! Document payload operator (component B, data half).
//!
//! A thin wrapper binding a pathname to [`crate::fs::FsAccess`]. The engine
//! validates that a payload parses as JSON but stores the exact bytes handed
//! to it, whitespace included — re-serializing would make two JSON-equivalent
//! documents diverge from their on-wire snapshot (see `SPEC_FULL.md` §9).

use std::path::PathBuf;

use crate::error::{AutumnError, Result};
use crate::fs::FsAccess;

/// Binds a document payload path to [`FsAccess`].
pub struct DocumentOperator<'a> {
    fs: &'a FsAccess,
    path: PathBuf,
}

impl<'a> DocumentOperator<'a> {
    /// Creates an operator bound to `path`.
    pub const fn new(fs: &'a FsAccess, path: PathBuf) -> Self { Self { fs, path } }

    /// Creates the payload file, failing if it already exists.
    ///
    /// `payload` must parse as a single JSON value; the raw bytes are stored
    /// unmodified.
    pub async fn create(&self, payload: &[u8]) -> Result<()> {
        validate_json(payload)?;
        self.fs.create(&self.path, payload).await
    }

    /// Overwrites the payload file in place.
    pub async fn update(&self, payload: &[u8]) -> Result<()> {
        validate_json(payload)?;
        self.fs.update(&self.path, payload).await
    }

    /// Reads the raw payload bytes.
    pub async fn read(&self) -> Result<Vec<u8>> { self.fs.read(&self.path).await }

    /// Deletes the payload file.
    pub async fn delete(&self) -> Result<()> { self.fs.delete(&self.path).await }
}

fn validate_json(payload: &[u8]) -> Result<()> {
    serde_json::from_slice::<serde_json::Value>(payload).map_err(|source| AutumnError::InvalidPayload {
        reason: source.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let fs_access = FsAccess::new();
        let op = DocumentOperator::new(&fs_access, dir.path().join("doc"));

        let result = op.create(b"not json").await;
        assert!(matches!(result, Err(AutumnError::InvalidPayload { .. })));
    }

    #[tokio::test]
    async fn create_preserves_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let fs_access = FsAccess::new();
        let op = DocumentOperator::new(&fs_access, dir.path().join("doc"));

        let payload = br#"{ "a" :  1 }"#;
        op.create(payload).await.unwrap();

        let read_back = op.read().await.unwrap();
        assert_eq!(read_back, payload);
    }

    #[tokio::test]
    async fn update_overwrites_payload() {
        let dir = tempfile::tempdir().unwrap();
        let fs_access = FsAccess::new();
        let op = DocumentOperator::new(&fs_access, dir.path().join("doc"));

        op.create(br#"{"a":1}"#).await.unwrap();
        op.update(br#"{"a":2}"#).await.unwrap();

        let read_back = op.read().await.unwrap();
        assert_eq!(read_back, br#"{"a":2}"#);
    }

    #[tokio::test]
    async fn delete_removes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let fs_access = FsAccess::new();
        let op = DocumentOperator::new(&fs_access, dir.path().join("doc"));

        op.create(br#"{"a":1}"#).await.unwrap();
        op.delete().await.unwrap();
        assert!(op.read().await.is_err());
    }
}
