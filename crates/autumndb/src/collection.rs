//! Collection operator (component C).
//!
//! State: collection name, root path, a single mutex — the only shared
//! mutable resource an AAE apply and a local client write can contend on
//! (§5). Every mutating entry point below acquires [`Collection::lock`] for
//! its full duration; the AAE answerer (component J) goes through the same
//! entry points rather than touching the filesystem directly.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace, warn};

use crate::constants::{COLLECTION_METADATA_FILE, DATA_DIR, METADATA_DIR};
use crate::document::DocumentOperator;
use crate::error::{AutumnError, Result};
use crate::fs::FsAccess;
use crate::metadata::{now_timestamp, DocumentMetadata, MetadataOperator};

/// Debounce interval for persisting [`CollectionMetadata`] to disk.
const METADATA_SAVE_INTERVAL_MS: u64 = 500;

/// Persistent, collection-level counters and bookkeeping, stored at
/// `<collection>/.metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub name: String,
    pub document_count: u64,
    pub total_size_bytes: u64,
}

impl CollectionMetadata {
    fn new(name: String) -> Self {
        Self {
            name,
            document_count: 0,
            total_size_bytes: 0,
        }
    }
}

/// A named group of documents sharing a directory (§3).
#[derive(Debug)]
pub struct Collection {
    name: String,
    root: PathBuf,
    fs: FsAccess,
    lock: Mutex<()>,
    document_count: Arc<AtomicU64>,
    total_size_bytes: Arc<AtomicU64>,
    dirty_tx: Option<mpsc::UnboundedSender<()>>,
    persister: Option<tokio::task::JoinHandle<()>>,
}

impl Collection {
    /// Builds a `Collection` handle over `root` without touching the filesystem.
    pub fn new(name: impl Into<String>, root: PathBuf) -> Self {
        Self {
            name: name.into(),
            root,
            fs: FsAccess::new(),
            lock: Mutex::new(()),
            document_count: Arc::new(AtomicU64::new(0)),
            total_size_bytes: Arc::new(AtomicU64::new(0)),
            dirty_tx: None,
            persister: None,
        }
    }

    /// Creates the `data/` and `metadata/` sub-directories and a fresh
    /// `.metadata.json`, starting the debounced persister.
    pub async fn create(&mut self) -> Result<()> {
        tokio::fs::create_dir_all(self.data_dir()).await?;
        tokio::fs::create_dir_all(self.metadata_dir()).await?;
        let metadata = CollectionMetadata::new(self.name.clone());
        self.save_metadata(&metadata).await?;
        self.start_metadata_persister();
        Ok(())
    }

    /// Opens a `Collection` whose directories already exist on disk, restoring
    /// its counters from `.metadata.json`.
    pub async fn open(name: impl Into<String>, root: PathBuf) -> Result<Self> {
        let mut collection = Self::new(name, root);
        let metadata = collection.load_metadata().await?;
        collection.document_count = Arc::new(AtomicU64::new(metadata.document_count));
        collection.total_size_bytes = Arc::new(AtomicU64::new(metadata.total_size_bytes));
        collection.start_metadata_persister();
        Ok(collection)
    }

    /// Recursively deletes the collection's root directory.
    pub async fn delete(&self) -> Result<()> {
        tokio::fs::remove_dir_all(&self.root).await?;
        Ok(())
    }

    /// Returns the collection's name.
    pub fn name(&self) -> &str { &self.name }

    /// Returns the number of documents currently in the collection.
    pub fn document_count(&self) -> u64 { self.document_count.load(Ordering::Relaxed) }

    /// Returns the total size, in bytes, of all documents in the collection.
    pub fn total_size_bytes(&self) -> u64 { self.total_size_bytes.load(Ordering::Relaxed) }

    fn data_dir(&self) -> PathBuf { self.root.join(DATA_DIR) }

    fn metadata_dir(&self) -> PathBuf { self.root.join(METADATA_DIR) }

    fn data_path(&self, id: &str) -> PathBuf { self.data_dir().join(id) }

    fn metadata_path(&self, id: &str) -> PathBuf { self.metadata_dir().join(id) }

    fn document_operator(&self, id: &str) -> DocumentOperator<'_> { DocumentOperator::new(&self.fs, self.data_path(id)) }

    fn metadata_operator(&self, id: &str) -> MetadataOperator<'_> { MetadataOperator::new(&self.fs, self.metadata_path(id)) }

    /// Creates a document's payload and metadata sidecar, atomically: if
    /// either write fails, the other is rolled back.
    pub async fn create_document(&self, id: &str, payload: &[u8], updated_at: Option<DateTime<Utc>>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let updated_at = updated_at.map_or_else(now_timestamp, crate::metadata::format_timestamp);
        self.create_document_locked(id, payload, &updated_at).await?;
        #[allow(clippy::as_conversions, clippy::cast_possible_truncation, reason = "document sizes fit in u64")]
        self.bump_after_create(payload.len() as u64);
        Ok(())
    }

    async fn create_document_locked(&self, id: &str, payload: &[u8], updated_at: &str) -> Result<()> {
        let doc_op = self.document_operator(id);
        doc_op.create(payload).await?;

        let metadata_op = self.metadata_operator(id);
        if let Err(source) = metadata_op.create(&DocumentMetadata::new(updated_at)).await {
            // Roll back the payload write so data/ and metadata/ stay paired.
            if let Err(rollback_err) = doc_op.delete().await {
                warn!("failed to roll back orphaned document '{id}' after metadata write failure: {rollback_err}");
            }
            return Err(source);
        }
        Ok(())
    }

    /// Overwrites a document's payload and bumps `updated_at`.
    ///
    /// Rejected with [`AutumnError::FrozenConflict`] if the document is
    /// currently frozen by an in-flight AAE apply.
    pub async fn update_document(&self, id: &str, payload: &[u8], updated_at: Option<DateTime<Utc>>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let metadata_op = self.metadata_operator(id);
        let mut metadata = metadata_op.read().await?;
        if metadata.is_frozen {
            return Err(AutumnError::FrozenConflict {
                collection: self.name.clone(),
                id: id.to_string(),
            });
        }

        let doc_op = self.document_operator(id);
        let old_size = doc_op.read().await.map(|bytes| bytes.len()).unwrap_or(0);
        doc_op.update(payload).await?;

        metadata.updated_at = updated_at.map_or_else(now_timestamp, crate::metadata::format_timestamp);
        metadata_op.write(&metadata).await?;

        #[allow(clippy::as_conversions, clippy::cast_possible_truncation, reason = "document sizes fit in u64")]
        self.bump_after_update(old_size as u64, payload.len() as u64);
        Ok(())
    }

    /// Reads a document's payload.
    pub async fn read_document(&self, id: &str) -> Result<Vec<u8>> {
        let _guard = self.lock.lock().await;
        self.document_operator(id).read().await
    }

    /// Reads a document's payload together with its `updated_at`, as one
    /// atomic snapshot under the mutex.
    pub async fn read_document_with_updated_at(&self, id: &str) -> Result<(Vec<u8>, DateTime<Utc>)> {
        let _guard = self.lock.lock().await;
        let payload = self.document_operator(id).read().await?;
        let updated_at = self.metadata_operator(id).get_updated_at().await?;
        Ok((payload, updated_at))
    }

    /// Deletes a document's payload and metadata sidecar.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let doc_op = self.document_operator(id);
        let size = doc_op.read().await.map(|bytes| bytes.len()).unwrap_or(0);
        doc_op.delete().await?;
        self.metadata_operator(id).delete().await?;
        #[allow(clippy::as_conversions, clippy::cast_possible_truncation, reason = "document sizes fit in u64")]
        self.bump_after_delete(size as u64);
        Ok(())
    }

    /// Overwrites `updated_at` for a document.
    pub async fn set_updated_at(&self, id: &str, updated_at: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.metadata_operator(id).set_updated_at(updated_at).await
    }

    /// Returns a document's `updated_at`.
    pub async fn get_updated_at(&self, id: &str) -> Result<DateTime<Utc>> {
        let _guard = self.lock.lock().await;
        self.metadata_operator(id).get_updated_at().await
    }

    /// Returns a document's `is_frozen` flag.
    pub async fn is_frozen(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        self.metadata_operator(id).is_frozen().await
    }

    /// Overwrites a document's `is_frozen` flag.
    pub async fn set_is_frozen(&self, id: &str, is_frozen: bool) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.metadata_operator(id).set_is_frozen(is_frozen).await
    }

    /// Enumerates the document ids currently stored in this collection.
    pub async fn doc_ids(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        let mut entries = tokio::fs::read_dir(self.data_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                ids.insert(name.to_string());
            }
        }
        Ok(ids)
    }

    /// Applies a peer's `DocumentPush` to this collection, following the
    /// AAE merge policy (§4.J):
    ///
    /// 1. If the document is absent locally, create it with the received
    ///    payload and timestamp.
    /// 2. Otherwise set `is_frozen = true`, re-read the local timestamp.
    ///    If the local timestamp is at least as new as the remote one,
    ///    clear the freeze and leave the payload untouched. Otherwise
    ///    overwrite the payload, set `updated_at` to the remote timestamp,
    ///    and clear `is_frozen`.
    pub async fn apply_replicated_document(&self, id: &str, payload: &[u8], remote_updated_at: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock.lock().await;

        if !self.fs.exists(&self.data_path(id)).await? {
            let updated_at = crate::metadata::format_timestamp(remote_updated_at);
            self.create_document_locked(id, payload, &updated_at).await?;
            #[allow(clippy::as_conversions, clippy::cast_possible_truncation, reason = "document sizes fit in u64")]
            self.bump_after_create(payload.len() as u64);
            return Ok(());
        }

        let metadata_op = self.metadata_operator(id);
        metadata_op.set_is_frozen(true).await?;
        let local_updated_at = metadata_op.get_updated_at().await?;

        if local_updated_at >= remote_updated_at {
            metadata_op.set_is_frozen(false).await?;
            trace!("AAE apply for '{id}' in '{}' superseded by local timestamp", self.name);
            return Ok(());
        }

        let doc_op = self.document_operator(id);
        let old_size = doc_op.read().await.map(|bytes| bytes.len()).unwrap_or(0);
        doc_op.update(payload).await?;
        metadata_op
            .write(&DocumentMetadata {
                updated_at: crate::metadata::format_timestamp(remote_updated_at),
                is_frozen: false,
            })
            .await?;

        #[allow(clippy::as_conversions, clippy::cast_possible_truncation, reason = "document sizes fit in u64")]
        self.bump_after_update(old_size as u64, payload.len() as u64);
        debug!("AAE apply overwrote '{id}' in '{}'", self.name);
        Ok(())
    }

    fn bump_after_create(&self, size: u64) {
        self.document_count.fetch_add(1, Ordering::Relaxed);
        self.total_size_bytes.fetch_add(size, Ordering::Relaxed);
        self.mark_dirty();
    }

    fn bump_after_update(&self, old_size: u64, new_size: u64) {
        self.total_size_bytes.fetch_sub(old_size, Ordering::Relaxed);
        self.total_size_bytes.fetch_add(new_size, Ordering::Relaxed);
        self.mark_dirty();
    }

    fn bump_after_delete(&self, size: u64) {
        self.document_count.fetch_sub(1, Ordering::Relaxed);
        self.total_size_bytes.fetch_sub(size, Ordering::Relaxed);
        self.mark_dirty();
    }

    fn mark_dirty(&self) {
        if let Some(tx) = &self.dirty_tx {
            let _ = tx.send(());
        }
    }

    async fn load_metadata(&self) -> Result<CollectionMetadata> {
        let path = self.root.join(COLLECTION_METADATA_FILE);
        if !self.fs.exists(&path).await? {
            return Ok(CollectionMetadata::new(self.name.clone()));
        }
        let bytes = self.fs.read(&path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save_metadata(&self, metadata: &CollectionMetadata) -> Result<()> {
        let path = self.root.join(COLLECTION_METADATA_FILE);
        let bytes = serde_json::to_vec_pretty(metadata)?;
        if self.fs.exists(&path).await? {
            self.fs.update(&path, &bytes).await
        }
        else {
            self.fs.create(&path, &bytes).await
        }
    }

    /// Spawns the background task that debounces `.metadata.json` saves.
    ///
    /// Mirrors the debounced-persistence pattern: rather than a disk write
    /// per mutation, counters are updated in memory immediately and flushed
    /// at most once per [`METADATA_SAVE_INTERVAL_MS`].
    fn start_metadata_persister(&mut self) {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        self.dirty_tx = Some(tx);

        let root = self.root.clone();
        let name = self.name.clone();
        let document_count = Arc::clone(&self.document_count);
        let total_size_bytes = Arc::clone(&self.total_size_bytes);
        let fs = self.fs;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(METADATA_SAVE_INTERVAL_MS));
            interval.tick().await;
            let mut dirty = false;

            loop {
                tokio::select! {
                    tick = rx.recv() => {
                        match tick {
                            Some(()) => dirty = true,
                            None => break,
                        }
                    }
                    _ = interval.tick() => {
                        if !dirty {
                            continue;
                        }
                        let metadata = CollectionMetadata {
                            name: name.clone(),
                            document_count: document_count.load(Ordering::Relaxed),
                            total_size_bytes: total_size_bytes.load(Ordering::Relaxed),
                        };
                        let path = root.join(COLLECTION_METADATA_FILE);
                        match serde_json::to_vec_pretty(&metadata) {
                            Ok(bytes) => {
                                if let Err(error) = fs.update(&path, &bytes).await {
                                    warn!("failed to persist collection metadata for '{name}': {error}");
                                } else {
                                    dirty = false;
                                }
                            },
                            Err(error) => warn!("failed to serialize collection metadata for '{name}': {error}"),
                        }
                    }
                }
            }
        });

        self.persister = Some(task);
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        if let Some(task) = self.persister.take() {
            task.abort();
        }
    }
}

/// Returns `true` if `name` is a valid [`crate::constants::MAX_COLLECTION_NAME_LEN`]-bounded UTF-8 collection name.
pub fn is_valid_collection_name(name: &str) -> bool { !name.is_empty() && name.len() <= crate::constants::MAX_COLLECTION_NAME_LEN }

/// Joins `data_root` and `name` into a collection's root directory.
pub fn collection_root(data_root: &Path, name: &str) -> PathBuf { data_root.join(name) }

#[cfg(test)]
mod tests {
    use super::*;

    async fn fresh_collection(dir: &tempfile::TempDir, name: &str) -> Collection {
        let mut collection = Collection::new(name, dir.path().join(name));
        collection.create().await.unwrap();
        collection
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let collection = fresh_collection(&dir, "users").await;

        collection.create_document("doc1", br#"{"a":1}"#, None).await.unwrap();
        let payload = collection.read_document("doc1").await.unwrap();
        assert_eq!(payload, br#"{"a":1}"#);
        assert_eq!(collection.document_count(), 1);
    }

    #[tokio::test]
    async fn create_document_pairs_data_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let collection = fresh_collection(&dir, "users").await;

        collection.create_document("doc1", br#"{"a":1}"#, None).await.unwrap();
        assert!(tokio::fs::try_exists(dir.path().join("users/data/doc1")).await.unwrap());
        assert!(tokio::fs::try_exists(dir.path().join("users/metadata/doc1")).await.unwrap());
    }

    #[tokio::test]
    async fn update_rejects_frozen_document() {
        let dir = tempfile::tempdir().unwrap();
        let collection = fresh_collection(&dir, "users").await;

        collection.create_document("doc1", br#"{"a":1}"#, None).await.unwrap();
        collection.set_is_frozen("doc1", true).await.unwrap();

        let result = collection.update_document("doc1", br#"{"a":2}"#, None).await;
        assert!(matches!(result, Err(AutumnError::FrozenConflict { .. })));
    }

    #[tokio::test]
    async fn delete_document_removes_both_files_and_decrements_count() {
        let dir = tempfile::tempdir().unwrap();
        let collection = fresh_collection(&dir, "users").await;

        collection.create_document("doc1", br#"{"a":1}"#, None).await.unwrap();
        collection.delete_document("doc1").await.unwrap();

        assert_eq!(collection.document_count(), 0);
        assert!(!tokio::fs::try_exists(dir.path().join("users/data/doc1")).await.unwrap());
        assert!(!tokio::fs::try_exists(dir.path().join("users/metadata/doc1")).await.unwrap());
    }

    #[tokio::test]
    async fn apply_replicated_document_creates_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let collection = fresh_collection(&dir, "users").await;
        let ts = crate::metadata::parse_timestamp("2024-01-01T00:00:00.000001Z").unwrap();

        collection.apply_replicated_document("doc1", br#"{"a":1}"#, ts).await.unwrap();

        let (payload, updated_at) = collection.read_document_with_updated_at("doc1").await.unwrap();
        assert_eq!(payload, br#"{"a":1}"#);
        assert_eq!(updated_at, ts);
        assert!(!collection.is_frozen("doc1").await.unwrap());
    }

    #[tokio::test]
    async fn apply_replicated_document_overwrites_when_remote_is_newer() {
        let dir = tempfile::tempdir().unwrap();
        let collection = fresh_collection(&dir, "users").await;
        let older = crate::metadata::parse_timestamp("2024-01-01T00:00:00.000000Z").unwrap();
        let newer = crate::metadata::parse_timestamp("2024-01-02T00:00:00.000000Z").unwrap();

        collection.create_document("doc1", br#"{"a":1}"#, Some(older)).await.unwrap();
        collection.apply_replicated_document("doc1", br#"{"a":2}"#, newer).await.unwrap();

        let (payload, updated_at) = collection.read_document_with_updated_at("doc1").await.unwrap();
        assert_eq!(payload, br#"{"a":2}"#);
        assert_eq!(updated_at, newer);
        assert!(!collection.is_frozen("doc1").await.unwrap());
    }

    #[tokio::test]
    async fn apply_replicated_document_ignores_and_unfreezes_when_local_is_newer() {
        let dir = tempfile::tempdir().unwrap();
        let collection = fresh_collection(&dir, "users").await;
        let older = crate::metadata::parse_timestamp("2024-01-01T00:00:00.000000Z").unwrap();
        let newer = crate::metadata::parse_timestamp("2024-01-02T00:00:00.000000Z").unwrap();

        collection.create_document("doc1", br#"{"a":1}"#, Some(newer)).await.unwrap();
        collection.apply_replicated_document("doc1", br#"{"a":2}"#, older).await.unwrap();

        let (payload, updated_at) = collection.read_document_with_updated_at("doc1").await.unwrap();
        assert_eq!(payload, br#"{"a":1}"#);
        assert_eq!(updated_at, newer);
        assert!(!collection.is_frozen("doc1").await.unwrap());
    }

    #[tokio::test]
    async fn doc_ids_enumerates_created_documents() {
        let dir = tempfile::tempdir().unwrap();
        let collection = fresh_collection(&dir, "users").await;

        collection.create_document("doc1", br#"{"a":1}"#, None).await.unwrap();
        collection.create_document("doc2", br#"{"a":2}"#, None).await.unwrap();

        let ids = collection.doc_ids().await.unwrap();
        assert_eq!(ids, HashSet::from(["doc1".to_string(), "doc2".to_string()]));
    }

    #[tokio::test]
    async fn reopening_a_collection_restores_counters() {
        let dir = tempfile::tempdir().unwrap();
        {
            let collection = fresh_collection(&dir, "users").await;
            collection.create_document("doc1", br#"{"a":1}"#, None).await.unwrap();
            collection.save_metadata(&CollectionMetadata {
                name: "users".to_string(),
                document_count: collection.document_count(),
                total_size_bytes: collection.total_size_bytes(),
            }).await.unwrap();
        }

        let reopened = Collection::open("users", dir.path().join("users")).await.unwrap();
        assert_eq!(reopened.document_count(), 1);
    }
}
