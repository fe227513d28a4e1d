//! AAE originator: the push-on-change half of component J.
//!
//! Subscribes to the event bus like any other subscriber (§4.J "driving
//! events into the replicator") and, for each local document mutation,
//! walks the neighbor list running the state machine described in §4.J:
//! `IDLE -> AWAITING_REPLY -> {DONE, PUSHING -> DONE}`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt as _};
use tokio::io::AsyncWriteExt as _;
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, warn};

use crate::codec::{CheckSnapshot, DocumentPush, OpCode, SnapshotReply};
use crate::config::NodeEndpoints;
use crate::constants::AAE_ORIGINATOR_UDP_TIMEOUT_SECS;
use crate::error::{AutumnError, Result};
use crate::events::{Event, EventBus};
use crate::metadata::{format_timestamp, parse_timestamp};
use crate::registry::Store;
use crate::snapshot::Snapshot;

/// Largest reply datagram the originator expects from an answerer.
const SNAPSHOT_REPLY_BUFFER: usize = 4096;

/// Upper bound on neighbors contacted concurrently for a single document's propagation.
const NEIGHBOR_FANOUT_CONCURRENCY: usize = 8;

/// Outcome of a `CheckSnapshot` round-trip with one neighbor, from the
/// originator's point of view (the `AWAITING_REPLY` exit transitions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NeighborOutcome {
    Terminate,
    Push { ts_remote: DateTime<Utc> },
}

/// Drives the push-on-change half of Active Anti-Entropy.
pub struct AaeOriginator {
    store: Arc<Store>,
    neighbors: Vec<NodeEndpoints>,
}

impl AaeOriginator {
    /// Builds an originator over `store` that replicates to `neighbors`.
    pub const fn new(store: Arc<Store>, neighbors: Vec<NodeEndpoints>) -> Self { Self { store, neighbors } }

    /// Subscribes to `event_bus` and runs until the bus (and every sender
    /// handle to it) is dropped.
    pub async fn run(self, event_bus: Arc<EventBus>) {
        let mut receiver = event_bus.subscribe();
        while let Some(event) = receiver.recv().await {
            let Event::Document { op, collection, id } = event else {
                continue;
            };
            match op {
                OpCode::CreateDoc => self.propagate(&collection, &id, true).await,
                OpCode::UpdateDoc => self.propagate(&collection, &id, false).await,
                OpCode::DeleteDoc | OpCode::ReadDoc | OpCode::CreateCollection | OpCode::DeleteCollection => {},
            }
        }
    }

    async fn propagate(&self, collection: &str, id: &str, is_create: bool) {
        if self.neighbors.is_empty() {
            return;
        }

        let (payload, ts_local) = match self.read_local(collection, id).await {
            Ok(pair) => pair,
            Err(error) => {
                warn!("AAE originator could not read '{id}' in '{collection}': {error}");
                return;
            },
        };

        let snapshot = match Snapshot::of_payload(&payload) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!("AAE originator could not snapshot '{id}' in '{collection}': {error}");
                return;
            },
        };

        // Neighbors are contacted concurrently (bounded) rather than one at a
        // time, so one slow or down neighbor can't delay propagation to the rest.
        stream::iter(&self.neighbors)
            .for_each_concurrent(NEIGHBOR_FANOUT_CONCURRENCY, |neighbor| {
                self.propagate_to_neighbor(neighbor, collection, id, &payload, ts_local, &snapshot, is_create)
            })
            .await;
    }

    async fn read_local(&self, collection: &str, id: &str) -> Result<(Vec<u8>, DateTime<Utc>)> {
        self.store.collection(collection).await?.read_document_with_updated_at(id).await
    }

    async fn propagate_to_neighbor(
        &self,
        neighbor: &NodeEndpoints,
        collection: &str,
        id: &str,
        payload: &[u8],
        ts_local: DateTime<Utc>,
        snapshot: &Snapshot,
        is_create: bool,
    ) {
        // CREATE_DOC skips the handshake entirely and pushes directly (§4.J).
        if is_create {
            if let Err(error) = self.push(neighbor, collection, id, payload, ts_local).await {
                warn!("AAE push of new document '{id}' to {} failed: {error}", neighbor.document_receiver.display());
            }
            return;
        }

        match self.check_snapshot(neighbor, collection, id, snapshot).await {
            Ok(NeighborOutcome::Terminate) => debug!("AAE snapshot match with {}, no push needed", neighbor.snapshot_receiver.display()),
            Ok(NeighborOutcome::Push { ts_remote }) => {
                if ts_local > ts_remote {
                    if let Err(error) = self.push(neighbor, collection, id, payload, ts_local).await {
                        warn!("AAE push of '{id}' to {} failed: {error}", neighbor.document_receiver.display());
                    }
                }
                else {
                    debug!("AAE skip: local '{id}' is not newer than {}", neighbor.document_receiver.display());
                }
            },
            Err(error) => debug!("AAE neighbor {} unavailable: {error}", neighbor.snapshot_receiver.display()),
        }
    }

    async fn check_snapshot(&self, neighbor: &NodeEndpoints, collection: &str, id: &str, snapshot: &Snapshot) -> Result<NeighborOutcome> {
        let remote = neighbor.snapshot_receiver.to_socket_addr()?;
        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        let request = CheckSnapshot {
            collection: collection.to_string(),
            doc_id: id.to_string(),
            snapshot: snapshot.encode(),
        }
        .encode()?;
        socket.send_to(&request, remote).await?;

        let mut buf = [0_u8; SNAPSHOT_REPLY_BUFFER];
        let received = tokio::time::timeout(Duration::from_secs(AAE_ORIGINATOR_UDP_TIMEOUT_SECS), socket.recv(&mut buf))
            .await
            .map_err(|_elapsed| AutumnError::PeerUnavailable { addr: remote.to_string() })??;

        match SnapshotReply::decode(&buf[..received])? {
            SnapshotReply::TerminateSession => Ok(NeighborOutcome::Terminate),
            SnapshotReply::SendingTimestamp(timestamp) => Ok(NeighborOutcome::Push {
                ts_remote: parse_timestamp(&timestamp)?,
            }),
        }
    }

    async fn push(&self, neighbor: &NodeEndpoints, collection: &str, id: &str, payload: &[u8], updated_at: DateTime<Utc>) -> Result<()> {
        let remote = neighbor.document_receiver.to_socket_addr()?;
        let mut stream = TcpStream::connect(remote).await?;
        let frame = DocumentPush {
            collection: collection.to_string(),
            doc_id: id.to_string(),
            updated_at: format_timestamp(updated_at),
            payload: payload.to_vec(),
        }
        .encode()?;
        stream.write_all(&frame).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;

    #[tokio::test]
    async fn propagate_with_no_neighbors_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let event_bus = Arc::new(EventBus::new());
        let store = Store::open(dir.path().to_path_buf(), event_bus).await.unwrap();
        store.create_collection("users").await.unwrap();
        let collection = store.collection("users").await.unwrap();
        collection.create_document("doc1", br#"{"a":1}"#, None).await.unwrap();

        let originator = AaeOriginator::new(Arc::clone(&store), Vec::new());
        originator.propagate("users", "doc1", true).await;
    }

    #[tokio::test(start_paused = true)]
    async fn propagate_against_unreachable_neighbor_never_panics() {
        let dir = tempfile::tempdir().unwrap();
        let event_bus = Arc::new(EventBus::new());
        let store = Store::open(dir.path().to_path_buf(), event_bus).await.unwrap();
        store.create_collection("users").await.unwrap();
        let collection = store.collection("users").await.unwrap();
        collection.create_document("doc1", br#"{"a":1}"#, None).await.unwrap();

        let unreachable = NodeEndpoints {
            snapshot_receiver: crate::config::PeerAddress {
                addr: "127.0.0.1".to_string(),
                port: 1,
            },
            document_receiver: crate::config::PeerAddress {
                addr: "127.0.0.1".to_string(),
                port: 1,
            },
        };
        let originator = AaeOriginator::new(Arc::clone(&store), vec![unreachable]);
        originator.propagate("users", "doc1", false).await;
    }
}
