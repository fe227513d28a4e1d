//! Metadata sidecar operator (component B, metadata half).
//!
//! Binds a pathname to [`crate::fs::FsAccess`] and additionally JSON-encodes
//! and decodes the `{updated_at, is_frozen}` map. Timestamp parsing uses
//! exactly [`crate::constants::UTC_FORMAT`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::UTC_FORMAT;
use crate::error::{AutumnError, Result};
use crate::fs::FsAccess;

/// The `{updated_at, is_frozen}` sidecar stored alongside a document payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Last-writer-wins version, rendered in [`UTC_FORMAT`].
    pub updated_at: String,
    /// Write guard set by the AAE apply step.
    pub is_frozen: bool,
}

impl DocumentMetadata {
    /// Builds a fresh, unfrozen metadata record for `updated_at`.
    pub fn new(updated_at: impl Into<String>) -> Self {
        Self {
            updated_at: updated_at.into(),
            is_frozen: false,
        }
    }

    /// Parses [`Self::updated_at`] into a `DateTime<Utc>` using [`UTC_FORMAT`].
    pub fn parsed_updated_at(&self) -> Result<DateTime<Utc>> { parse_timestamp(&self.updated_at) }
}

/// Renders the current UTC instant in [`UTC_FORMAT`].
pub fn now_timestamp() -> String { format_timestamp(Utc::now()) }

/// Renders `instant` in [`UTC_FORMAT`].
pub fn format_timestamp(instant: DateTime<Utc>) -> String { instant.format(UTC_FORMAT).to_string() }

/// Parses a [`UTC_FORMAT`] string into a `DateTime<Utc>`.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(raw, UTC_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| AutumnError::Protocol {
            reason: format!("invalid timestamp '{raw}': {source}"),
        })
}

/// Binds a metadata sidecar path to [`FsAccess`].
pub struct MetadataOperator<'a> {
    fs: &'a FsAccess,
    path: PathBuf,
}

impl<'a> MetadataOperator<'a> {
    /// Creates an operator bound to `path`.
    pub const fn new(fs: &'a FsAccess, path: PathBuf) -> Self { Self { fs, path } }

    /// Creates the sidecar file, failing if it already exists.
    pub async fn create(&self, metadata: &DocumentMetadata) -> Result<()> {
        let bytes = serde_json::to_vec(metadata)?;
        self.fs.create(&self.path, &bytes).await
    }

    /// Overwrites the sidecar file in place.
    pub async fn write(&self, metadata: &DocumentMetadata) -> Result<()> {
        let bytes = serde_json::to_vec(metadata)?;
        self.fs.update(&self.path, &bytes).await
    }

    /// Reads and parses the sidecar file.
    pub async fn read(&self) -> Result<DocumentMetadata> {
        let bytes = self.fs.read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Deletes the sidecar file.
    pub async fn delete(&self) -> Result<()> { self.fs.delete(&self.path).await }

    /// Returns `updated_at` as a parsed `DateTime<Utc>`.
    pub async fn get_updated_at(&self) -> Result<DateTime<Utc>> { self.read().await?.parsed_updated_at() }

    /// Overwrites `updated_at`, leaving `is_frozen` untouched.
    pub async fn set_updated_at(&self, updated_at: DateTime<Utc>) -> Result<()> {
        let mut metadata = self.read().await?;
        metadata.updated_at = format_timestamp(updated_at);
        self.write(&metadata).await
    }

    /// Returns the current `is_frozen` flag.
    pub async fn is_frozen(&self) -> Result<bool> { Ok(self.read().await?.is_frozen) }

    /// Overwrites the `is_frozen` flag, leaving `updated_at` untouched.
    pub async fn set_is_frozen(&self, is_frozen: bool) -> Result<()> {
        let mut metadata = self.read().await?;
        metadata.is_frozen = is_frozen;
        self.write(&metadata).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips_through_format() {
        let original = parse_timestamp("2024-03-14T09:26:53.589793Z").unwrap();
        let rendered = format_timestamp(original);
        assert_eq!(rendered, "2024-03-14T09:26:53.589793Z");
        let parsed = parse_timestamp(&rendered).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn rendered_timestamp_has_expected_length() {
        let rendered = now_timestamp();
        assert_eq!(rendered.len(), crate::constants::DOC_ID_LENGTH);
        assert!(rendered.ends_with('Z'));
    }

    #[test]
    fn parse_rejects_malformed_timestamp() {
        assert!(parse_timestamp("not-a-timestamp").is_err());
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let fs_access = FsAccess::new();
        let op = MetadataOperator::new(&fs_access, dir.path().join("doc"));

        let metadata = DocumentMetadata::new(now_timestamp());
        op.create(&metadata).await.unwrap();

        let read_back = op.read().await.unwrap();
        assert_eq!(read_back, metadata);
    }

    #[tokio::test]
    async fn set_is_frozen_updates_only_that_field() {
        let dir = tempfile::tempdir().unwrap();
        let fs_access = FsAccess::new();
        let op = MetadataOperator::new(&fs_access, dir.path().join("doc"));

        let metadata = DocumentMetadata::new("2024-01-01T00:00:00.000000Z");
        op.create(&metadata).await.unwrap();

        op.set_is_frozen(true).await.unwrap();
        let after = op.read().await.unwrap();
        assert!(after.is_frozen);
        assert_eq!(after.updated_at, "2024-01-01T00:00:00.000000Z");
    }
}
