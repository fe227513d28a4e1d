//! Collection registry (component D).
//!
//! Owns the name → [`Collection`] map for one node, creates collections
//! lazily on first reference to an existing on-disk directory, and
//! persists a small roster of collection names to `.store_metadata.json`
//! so a restarted node can rebuild its map without a full directory scan.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::collection::{collection_root, Collection};
use crate::constants::STORE_METADATA_FILE;
use crate::error::{AutumnError, Result};
use crate::events::{Event, EventBus};
use crate::fs::FsAccess;

/// Debounce interval for persisting [`StoreMetadata`] to disk.
const METADATA_SAVE_INTERVAL_MS: u64 = 500;

/// Persisted roster of collection names, stored at `<data_root>/.store_metadata.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreMetadata {
    collection_names: Vec<String>,
}

/// Registry of collections for one node.
#[derive(Debug)]
pub struct Store {
    data_root: PathBuf,
    fs: FsAccess,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
    event_bus: Arc<EventBus>,
    persister: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Store {
    /// Opens (or initializes) the registry at `data_root`, restoring any
    /// collections already present on disk, and starts the debounced
    /// roster persister.
    pub async fn open(data_root: PathBuf, event_bus: Arc<EventBus>) -> Result<Arc<Self>> {
        tokio::fs::create_dir_all(&data_root).await?;
        let collections = Self::scan(&data_root).await?;

        let store = Arc::new(Self {
            data_root,
            fs: FsAccess::new(),
            collections: RwLock::new(collections),
            event_bus,
            persister: std::sync::Mutex::new(None),
        });

        Self::start_metadata_persister(&store);
        Ok(store)
    }

    async fn scan(data_root: &Path) -> Result<HashMap<String, Arc<Collection>>> {
        let mut collections = HashMap::new();
        let mut entries = tokio::fs::read_dir(data_root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let collection = Collection::open(name.clone(), entry.path()).await?;
            collections.insert(name, Arc::new(collection));
        }
        Ok(collections)
    }

    /// Creates a brand-new collection, failing with [`AutumnError::AlreadyExists`]
    /// if one by that name already exists.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        {
            let collections = self.collections.read().await;
            if collections.contains_key(name) {
                return Err(AutumnError::AlreadyExists {
                    what: "collection",
                    name: name.to_string(),
                });
            }
        }

        let mut collection = Collection::new(name, collection_root(&self.data_root, name));
        collection.create().await?;

        self.collections.write().await.insert(name.to_string(), Arc::new(collection));
        self.event_bus.publish(Event::Collection {
            op: crate::codec::OpCode::CreateCollection,
            collection: name.to_string(),
        });
        Ok(())
    }

    /// Deletes a collection and its contents, failing with
    /// [`AutumnError::NotFound`] if no such collection exists.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        let collection = {
            let mut collections = self.collections.write().await;
            collections.remove(name).ok_or_else(|| AutumnError::NotFound {
                what: "collection",
                name: name.to_string(),
            })?
        };
        collection.delete().await?;
        self.event_bus.publish(Event::Collection {
            op: crate::codec::OpCode::DeleteCollection,
            collection: name.to_string(),
        });
        Ok(())
    }

    /// Returns a collection by name, failing with [`AutumnError::NotFound`]
    /// if it does not exist. Document operations never auto-create a
    /// collection; `CREATE_COLLECTION` must run first.
    pub async fn collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.collections.read().await.get(name).cloned().ok_or_else(|| AutumnError::NotFound {
            what: "collection",
            name: name.to_string(),
        })
    }

    /// Returns the names of every collection currently registered.
    pub async fn collection_names(&self) -> Vec<String> { self.collections.read().await.keys().cloned().collect() }

    async fn load_metadata(&self) -> Result<StoreMetadata> {
        let path = self.data_root.join(STORE_METADATA_FILE);
        if !self.fs.exists(&path).await? {
            return Ok(StoreMetadata::default());
        }
        let bytes = self.fs.read(&path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save_metadata(&self, metadata: &StoreMetadata) -> Result<()> {
        let path = self.data_root.join(STORE_METADATA_FILE);
        let bytes = serde_json::to_vec_pretty(metadata)?;
        if self.fs.exists(&path).await? {
            self.fs.update(&path, &bytes).await
        }
        else {
            self.fs.create(&path, &bytes).await
        }
    }

    /// Spawns the background task that debounces `.store_metadata.json`
    /// saves in response to collection-create/delete events, mirroring the
    /// debounced per-collection persister in [`crate::collection`].
    fn start_metadata_persister(store: &Arc<Self>) {
        let mut receiver = store.event_bus.subscribe();
        let store = Arc::clone(store);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(METADATA_SAVE_INTERVAL_MS));
            interval.tick().await;
            let mut dirty = false;

            loop {
                tokio::select! {
                    event = receiver.recv() => {
                        match event {
                            Some(Event::Collection { .. }) => dirty = true,
                            Some(Event::Document { .. }) => {},
                            None => break,
                        }
                    }
                    _ = interval.tick() => {
                        if !dirty {
                            continue;
                        }
                        let metadata = StoreMetadata {
                            collection_names: store.collection_names().await,
                        };
                        if let Err(error) = store.save_metadata(&metadata).await {
                            warn!("failed to persist store metadata: {error}");
                        } else {
                            dirty = false;
                        }
                    }
                }
            }
        });

        if let Some(previous) = store.persister.lock().unwrap_or_else(std::sync::PoisonError::into_inner).replace(task) {
            previous.abort();
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Some(task) = self.persister.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take() {
            task.abort();
        }
    }
}
