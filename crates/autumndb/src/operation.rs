//! Operation engine (component E).
//!
//! A single-consumer FIFO queue in front of the collection registry: every
//! mutation a client or the AAE originator's local write path enqueues is
//! applied by exactly one worker task, so two requests against the same
//! collection never interleave at the filesystem layer. Successful
//! mutations publish a matching [`Event`] on the bus; a failed operation is
//! logged and dropped without one.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::codec::OpCode;
use crate::error::{AutumnError, Result};
use crate::events::{Event, EventBus};
use crate::metadata::now_timestamp;
use crate::registry::Store;

/// Depth of the operation queue before `submit` starts applying backpressure.
const QUEUE_CAPACITY: usize = 1024;

/// A queued mutation, not yet applied.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Create a collection.
    CreateCollection { collection: String },
    /// Delete a collection and its contents.
    DeleteCollection { collection: String },
    /// Create a document; the engine assigns its id.
    CreateDocument { collection: String, payload: Vec<u8> },
    /// Overwrite an existing document's payload.
    UpdateDocument { collection: String, id: String, payload: Vec<u8> },
    /// Remove a document.
    DeleteDocument { collection: String, id: String },
}

/// Result of successfully applying an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// A document was created with this id.
    DocumentCreated { id: String },
    /// The operation completed with no id to report back.
    Done,
}

struct QueuedOperation {
    operation: Operation,
    reply: oneshot::Sender<Result<OperationOutcome>>,
}

/// Handle to the running operation engine; cheap to clone, shares one worker.
#[derive(Debug, Clone)]
pub struct OperationEngine {
    sender: mpsc::Sender<QueuedOperation>,
}

impl OperationEngine {
    /// Spawns the worker task and returns a handle to submit operations to it.
    pub fn spawn(store: Arc<Store>, event_bus: Arc<EventBus>) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(Self::run(store, event_bus, receiver));
        Self { sender }
    }

    /// Enqueues `operation` and awaits its result.
    ///
    /// Returns [`AutumnError::Protocol`] if the worker has shut down.
    pub async fn submit(&self, operation: Operation) -> Result<OperationOutcome> {
        let (reply, reply_rx) = oneshot::channel();
        self.sender
            .send(QueuedOperation { operation, reply })
            .await
            .map_err(|_source| AutumnError::Protocol {
                reason: "operation engine is no longer accepting work".to_string(),
            })?;
        reply_rx.await.map_err(|_source| AutumnError::Protocol {
            reason: "operation engine dropped the reply channel".to_string(),
        })?
    }

    async fn run(store: Arc<Store>, event_bus: Arc<EventBus>, mut receiver: mpsc::Receiver<QueuedOperation>) {
        while let Some(queued) = receiver.recv().await {
            let result = Self::apply(&store, &event_bus, queued.operation.clone()).await;
            if let Err(error) = &result {
                warn!("operation {:?} failed: {error}", queued.operation);
            }
            let _ = queued.reply.send(result);
        }
    }

    async fn apply(store: &Arc<Store>, event_bus: &Arc<EventBus>, operation: Operation) -> Result<OperationOutcome> {
        match operation {
            Operation::CreateCollection { collection } => {
                store.create_collection(&collection).await?;
                Ok(OperationOutcome::Done)
            },
            Operation::DeleteCollection { collection } => {
                store.delete_collection(&collection).await?;
                Ok(OperationOutcome::Done)
            },
            Operation::CreateDocument { collection, payload } => {
                let target = store.collection(&collection).await?;
                let id = now_timestamp();
                target.create_document(&id, &payload, None).await?;
                event_bus.publish(Event::Document {
                    op: OpCode::CreateDoc,
                    collection,
                    id: id.clone(),
                });
                Ok(OperationOutcome::DocumentCreated { id })
            },
            Operation::UpdateDocument { collection, id, payload } => {
                let target = store.collection(&collection).await?;
                target.update_document(&id, &payload, None).await?;
                event_bus.publish(Event::Document {
                    op: OpCode::UpdateDoc,
                    collection,
                    id,
                });
                Ok(OperationOutcome::Done)
            },
            Operation::DeleteDocument { collection, id } => {
                let target = store.collection(&collection).await?;
                target.delete_document(&id).await?;
                event_bus.publish(Event::Document {
                    op: OpCode::DeleteDoc,
                    collection,
                    id,
                });
                Ok(OperationOutcome::Done)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn engine_with_store() -> (OperationEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let event_bus = Arc::new(EventBus::new());
        let store = Store::open(dir.path().to_path_buf(), Arc::clone(&event_bus)).await.unwrap();
        (OperationEngine::spawn(store, event_bus), dir)
    }

    #[tokio::test]
    async fn create_collection_then_create_document_round_trips() {
        let (engine, _dir) = engine_with_store().await;

        engine.submit(Operation::CreateCollection { collection: "users".to_string() }).await.unwrap();

        let outcome = engine
            .submit(Operation::CreateDocument {
                collection: "users".to_string(),
                payload: br#"{"a":1}"#.to_vec(),
            })
            .await
            .unwrap();

        assert!(matches!(outcome, OperationOutcome::DocumentCreated { .. }));
    }

    #[tokio::test]
    async fn create_document_against_missing_collection_is_not_found() {
        let (engine, _dir) = engine_with_store().await;

        let result = engine
            .submit(Operation::CreateDocument {
                collection: "ghost".to_string(),
                payload: br#"{"a":1}"#.to_vec(),
            })
            .await;

        assert!(matches!(result, Err(AutumnError::NotFound { .. })));
    }

    #[tokio::test]
    async fn update_then_delete_document_succeed_in_order() {
        let (engine, _dir) = engine_with_store().await;
        engine.submit(Operation::CreateCollection { collection: "users".to_string() }).await.unwrap();
        let created = engine
            .submit(Operation::CreateDocument {
                collection: "users".to_string(),
                payload: br#"{"a":1}"#.to_vec(),
            })
            .await
            .unwrap();
        let OperationOutcome::DocumentCreated { id } = created else {
            panic!("expected DocumentCreated");
        };

        engine
            .submit(Operation::UpdateDocument {
                collection: "users".to_string(),
                id: id.clone(),
                payload: br#"{"a":2}"#.to_vec(),
            })
            .await
            .unwrap();

        engine
            .submit(Operation::DeleteDocument {
                collection: "users".to_string(),
                id,
            })
            .await
            .unwrap();
    }
}
