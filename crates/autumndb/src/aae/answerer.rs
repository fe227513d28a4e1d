//! AAE answerer: the snapshot-receiver and document-receiver half of
//! component J.
//!
//! The UDP path answers `CheckSnapshot` datagrams with either
//! `TERMINATE_SESSION` or `SENDING_TIMESTAMP`; the TCP path accepts
//! `DocumentPush` frames and applies them through
//! [`crate::collection::Collection::apply_replicated_document`], which
//! already implements the freeze/compare/overwrite merge policy (§4.J).
//! Both paths go through the same [`Store`] as local client writes, so the
//! per-collection mutex is never bypassed.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt as _;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{debug, info, warn};

use crate::codec::{CheckSnapshot, DocumentPush, SnapshotReply};
use crate::error::{AutumnError, Result};
use crate::metadata::{format_timestamp, parse_timestamp};
use crate::registry::Store;
use crate::snapshot::Snapshot;

/// Largest `CheckSnapshot` datagram the answerer will accept.
const SNAPSHOT_DATAGRAM_BUFFER: usize = 4096;

/// Timestamp used when an answerer is asked about a document it does not
/// yet have locally; it is always less than any real `updated_at`, so the
/// originator's comparison always resolves in favor of a push.
const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00.000000Z";

/// Answers incoming AAE traffic from peers.
pub struct AaeAnswerer {
    store: Arc<Store>,
}

impl AaeAnswerer {
    /// Builds an answerer over `store`.
    pub const fn new(store: Arc<Store>) -> Self { Self { store } }

    /// Runs the UDP snapshot-receiver loop forever.
    pub async fn run_snapshot_receiver(&self, bind_addr: SocketAddr) -> Result<()> {
        let socket = UdpSocket::bind(bind_addr).await?;
        info!("AAE snapshot receiver listening on {}", socket.local_addr()?);

        let mut buf = [0_u8; SNAPSHOT_DATAGRAM_BUFFER];
        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(error) => {
                    warn!("snapshot receiver recv failed: {error}");
                    continue;
                },
            };
            if let Err(error) = self.answer_check_snapshot(&socket, peer, &buf[..len]).await {
                warn!("snapshot receiver failed to answer {peer}: {error}");
            }
        }
    }

    async fn answer_check_snapshot(&self, socket: &UdpSocket, peer: SocketAddr, bytes: &[u8]) -> Result<()> {
        let check = CheckSnapshot::decode(bytes)?;
        let reply = self.build_reply(&check).await?;
        socket.send_to(&reply.encode(), peer).await?;
        Ok(())
    }

    async fn build_reply(&self, check: &CheckSnapshot) -> Result<SnapshotReply> {
        let collection = self.store.collection(&check.collection).await?;

        let local_payload = match collection.read_document(&check.doc_id).await {
            Ok(payload) => Some(payload),
            Err(AutumnError::Io { source }) if source.kind() == std::io::ErrorKind::NotFound => None,
            Err(error) => return Err(error),
        };

        let Some(local_payload) = local_payload else {
            debug!("CheckSnapshot for unknown local document '{}' in '{}'", check.doc_id, check.collection);
            return Ok(SnapshotReply::SendingTimestamp(EPOCH_TIMESTAMP.to_string()));
        };

        let local_snapshot = Snapshot::of_payload(&local_payload)?;
        if local_snapshot.encode() == check.snapshot {
            return Ok(SnapshotReply::TerminateSession);
        }

        let local_updated_at = collection.get_updated_at(&check.doc_id).await?;
        Ok(SnapshotReply::SendingTimestamp(format_timestamp(local_updated_at)))
    }

    /// Runs the TCP document-receiver loop forever, spawning one task per push.
    pub async fn run_document_receiver(&self, bind_addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        info!("AAE document receiver listening on {}", listener.local_addr()?);

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(error) => {
                    warn!("document receiver accept failed: {error}");
                    continue;
                },
            };
            let store = Arc::clone(&self.store);
            tokio::spawn(async move {
                if let Err(error) = handle_document_push(&store, stream).await {
                    warn!("document push from {peer} failed: {error}");
                }
            });
        }
    }
}

async fn handle_document_push(store: Arc<Store>, mut stream: TcpStream) -> Result<()> {
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await?;

    let push = DocumentPush::decode(&bytes)?;
    let updated_at = parse_timestamp(&push.updated_at)?;
    let collection = store.collection(&push.collection).await?;
    collection.apply_replicated_document(&push.doc_id, &push.payload, updated_at).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;

    async fn store_with_users() -> (Arc<Store>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let event_bus = Arc::new(EventBus::new());
        let store = Store::open(dir.path().to_path_buf(), event_bus).await.unwrap();
        store.create_collection("users").await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn build_reply_terminates_on_identical_snapshot() {
        let (store, _dir) = store_with_users().await;
        let collection = store.collection("users").await.unwrap();
        collection.create_document("doc1", br#"{"a":1}"#, None).await.unwrap();

        let snapshot = Snapshot::of_payload(br#"{"a":1}"#).unwrap();
        let check = CheckSnapshot {
            collection: "users".to_string(),
            doc_id: "doc1".to_string(),
            snapshot: snapshot.encode(),
        };

        let answerer = AaeAnswerer::new(store);
        let reply = answerer.build_reply(&check).await.unwrap();
        assert_eq!(reply, SnapshotReply::TerminateSession);
    }

    #[tokio::test]
    async fn build_reply_sends_timestamp_on_mismatch() {
        let (store, _dir) = store_with_users().await;
        let collection = store.collection("users").await.unwrap();
        collection.create_document("doc1", br#"{"a":1}"#, None).await.unwrap();

        let snapshot = Snapshot::of_payload(br#"{"a":2}"#).unwrap();
        let check = CheckSnapshot {
            collection: "users".to_string(),
            doc_id: "doc1".to_string(),
            snapshot: snapshot.encode(),
        };

        let answerer = AaeAnswerer::new(store);
        let reply = answerer.build_reply(&check).await.unwrap();
        assert!(matches!(reply, SnapshotReply::SendingTimestamp(_)));
    }

    #[tokio::test]
    async fn build_reply_on_unknown_document_asks_for_a_push() {
        let (store, _dir) = store_with_users().await;

        let check = CheckSnapshot {
            collection: "users".to_string(),
            doc_id: "ghost".to_string(),
            snapshot: vec![0; 16],
        };

        let answerer = AaeAnswerer::new(store);
        let reply = answerer.build_reply(&check).await.unwrap();
        assert_eq!(reply, SnapshotReply::SendingTimestamp(EPOCH_TIMESTAMP.to_string()));
    }

    #[tokio::test]
    async fn document_receiver_applies_an_incoming_push() {
        use tokio::io::AsyncWriteExt as _;

        let (store, _dir) = store_with_users().await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let push = DocumentPush {
            collection: "users".to_string(),
            doc_id: "doc1".to_string(),
            updated_at: "2024-01-01T00:00:00.000000Z".to_string(),
            payload: br#"{"a":1}"#.to_vec(),
        };
        let frame = push.encode().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            stream.write_all(&frame).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let (stream, _peer) = listener.accept().await.unwrap();
        handle_document_push(Arc::clone(&store), stream).await.unwrap();
        client.await.unwrap();

        let collection = store.collection("users").await.unwrap();
        let payload = collection.read_document("doc1").await.unwrap();
        assert_eq!(payload, br#"{"a":1}"#);
    }
}
