//! Client endpoint (component H).
//!
//! A TCP acceptor bound to the configured client port. Each accepted
//! connection is read to EOF or the `0x00` terminator, decoded as a
//! [`ClientRequest`], and turned into an [`Operation`] submitted to the
//! [`OperationEngine`]. Only `CREATE_DOC` and `READ_DOC` wait for a result
//! to write back; every other request is enqueued and the connection is
//! closed immediately, matching "the source returns no ack on write" for
//! everything but `CREATE_DOC` (§4.H, §9).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::codec::ClientRequest;
use crate::constants::FRAME_TERMINATOR;
use crate::error::Result;
use crate::operation::{Operation, OperationEngine, OperationOutcome};
use crate::registry::Store;

/// Largest single request frame the client endpoint will buffer in memory.
const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// TCP acceptor for the client CRUD protocol.
pub struct ClientEndpoint {
    listener: TcpListener,
    store: Arc<Store>,
    engine: OperationEngine,
}

impl ClientEndpoint {
    /// Binds the client listener to `addr`.
    pub async fn bind(addr: SocketAddr, store: Arc<Store>, engine: OperationEngine) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, store, engine })
    }

    /// Returns the address actually bound (useful when `addr`'s port was 0).
    pub fn local_addr(&self) -> Result<SocketAddr> { Ok(self.listener.local_addr()?) }

    /// Runs the accept loop forever, spawning one task per connection.
    pub async fn serve(self) -> Result<()> {
        info!("client endpoint listening on {}", self.listener.local_addr()?);
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(error) => {
                    warn!("client endpoint accept failed: {error}");
                    continue;
                },
            };
            let store = Arc::clone(&self.store);
            let engine = self.engine.clone();
            tokio::spawn(async move {
                if let Err(error) = handle_connection(&store, &engine, stream).await {
                    warn!("client connection from {peer} closed with error: {error}");
                }
            });
        }
    }
}

async fn handle_connection(store: &Arc<Store>, engine: &OperationEngine, mut stream: TcpStream) -> Result<()> {
    let Some(frame) = read_frame(&mut stream).await? else {
        return Ok(());
    };

    let request = match ClientRequest::decode(&frame) {
        Ok(request) => request,
        Err(error) => {
            // ProtocolError: close without a response (§7).
            warn!("malformed client frame: {error}");
            return Ok(());
        },
    };

    dispatch(store, engine, request, &mut stream).await
}

/// Reads a client frame: everything up to (but not including) the first
/// `0x00` terminator, or everything up to EOF if the peer closes instead.
async fn read_frame(stream: &mut TcpStream) -> Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Ok(if buf.is_empty() { None } else { Some(buf) });
        }
        if let Some(pos) = chunk[..read].iter().position(|&byte| byte == FRAME_TERMINATOR) {
            buf.extend_from_slice(&chunk[..pos]);
            return Ok(Some(buf));
        }
        buf.extend_from_slice(&chunk[..read]);
        if buf.len() > MAX_FRAME_BYTES {
            return Err(crate::error::AutumnError::Protocol {
                reason: format!("client frame exceeds {MAX_FRAME_BYTES} bytes"),
            });
        }
    }
}

async fn dispatch(store: &Arc<Store>, engine: &OperationEngine, request: ClientRequest, stream: &mut TcpStream) -> Result<()> {
    match request {
        ClientRequest::CreateDoc { collection, payload } => {
            match engine.submit(Operation::CreateDocument { collection, payload }).await {
                Ok(OperationOutcome::DocumentCreated { id }) => stream.write_all(id.as_bytes()).await?,
                Ok(OperationOutcome::Done) => {},
                Err(error) => warn!("create_doc failed: {error}"),
            }
        },
        ClientRequest::ReadDoc { collection, doc_id } => match read_document(store, &collection, &doc_id).await {
            Ok(payload) => stream.write_all(&payload).await?,
            Err(error) => warn!("read_doc '{doc_id}' in '{collection}' failed: {error}"),
        },
        ClientRequest::UpdateDoc { collection, doc_id, payload } => {
            fire_and_forget(engine, Operation::UpdateDocument { collection, id: doc_id, payload });
        },
        ClientRequest::DeleteDoc { collection, doc_id } => {
            fire_and_forget(engine, Operation::DeleteDocument { collection, id: doc_id });
        },
        ClientRequest::CreateCollection { collection } => {
            fire_and_forget(engine, Operation::CreateCollection { collection });
        },
        ClientRequest::DeleteCollection { collection } => {
            fire_and_forget(engine, Operation::DeleteCollection { collection });
        },
    }
    Ok(())
}

async fn read_document(store: &Arc<Store>, collection: &str, doc_id: &str) -> Result<Vec<u8>> {
    store.collection(collection).await?.read_document(doc_id).await
}

/// Enqueues `operation` without waiting for it to apply, matching the
/// no-ack response contract for every op but `CREATE_DOC`.
fn fire_and_forget(engine: &OperationEngine, operation: Operation) {
    let engine = engine.clone();
    tokio::spawn(async move {
        if let Err(error) = engine.submit(operation).await {
            warn!("fire-and-forget operation failed: {error}");
        }
    });
}
