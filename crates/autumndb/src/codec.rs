//! Binary framing codec (component G).
//!
//! Two frame flavors share the same opcode space but differ in how the
//! collection name length is encoded: client frames use a 4-byte big-endian
//! length, peer frames use a single byte. Per the redesign notes, every
//! message is a value type with explicit `encode`/`decode` methods rather
//! than raw byte-slice juggling at call sites, and op-code dispatch is an
//! exhaustive match over an enum.

use crate::constants::{DOC_ID_LENGTH, FRAME_TERMINATOR, MAX_COLLECTION_NAME_LEN};
use crate::error::{AutumnError, Result};

/// Client/operation-engine op codes. Values match the wire protocol exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Create a new document.
    CreateDoc,
    /// Overwrite an existing document.
    UpdateDoc,
    /// Remove a document.
    DeleteDoc,
    /// Read a document (never enqueued into the operation engine; client-only).
    ReadDoc,
    /// Create a collection.
    CreateCollection,
    /// Destroy a collection.
    DeleteCollection,
}

impl OpCode {
    /// Returns the wire byte for this op code.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::CreateDoc => 1,
            Self::UpdateDoc => 2,
            Self::DeleteDoc => 3,
            Self::ReadDoc => 4,
            Self::CreateCollection => 11,
            Self::DeleteCollection => 12,
        }
    }

    /// Parses a wire byte into an op code.
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::CreateDoc),
            2 => Some(Self::UpdateDoc),
            3 => Some(Self::DeleteDoc),
            4 => Some(Self::ReadDoc),
            11 => Some(Self::CreateCollection),
            12 => Some(Self::DeleteCollection),
            _ => None,
        }
    }
}

fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AutumnError::Protocol {
            reason: "collection name must not be empty".to_string(),
        });
    }
    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(AutumnError::Protocol {
            reason: format!("collection name exceeds {MAX_COLLECTION_NAME_LEN} bytes"),
        });
    }
    Ok(())
}

/// A parsed client request, before it becomes an [`crate::operation::Operation`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    /// `CREATE_DOC`: body is the document JSON.
    CreateDoc { collection: String, payload: Vec<u8> },
    /// `READ_DOC`: body is a 26-byte doc id.
    ReadDoc { collection: String, doc_id: String },
    /// `UPDATE_DOC`: body is `doc_id || document_json`.
    UpdateDoc {
        collection: String,
        doc_id: String,
        payload: Vec<u8>,
    },
    /// `DELETE_DOC`: body is a 26-byte doc id.
    DeleteDoc { collection: String, doc_id: String },
    /// `CREATE_COLLECTION`: body is empty.
    CreateCollection { collection: String },
    /// `DELETE_COLLECTION`: body is empty.
    DeleteCollection { collection: String },
}

impl ClientRequest {
    /// Encodes this request as a client frame, including the trailing terminator.
    pub fn encode(&self) -> Vec<u8> {
        let (opcode, collection, body): (OpCode, &str, Vec<u8>) = match self {
            Self::CreateDoc { collection, payload } => (OpCode::CreateDoc, collection, payload.clone()),
            Self::ReadDoc { collection, doc_id } => (OpCode::ReadDoc, collection, doc_id.as_bytes().to_vec()),
            Self::UpdateDoc {
                collection,
                doc_id,
                payload,
            } => {
                let mut body = doc_id.as_bytes().to_vec();
                body.extend_from_slice(payload);
                (OpCode::UpdateDoc, collection, body)
            },
            Self::DeleteDoc { collection, doc_id } => (OpCode::DeleteDoc, collection, doc_id.as_bytes().to_vec()),
            Self::CreateCollection { collection } => (OpCode::CreateCollection, collection, Vec::new()),
            Self::DeleteCollection { collection } => (OpCode::DeleteCollection, collection, Vec::new()),
        };

        let collection_bytes = collection.as_bytes();
        let mut frame = Vec::with_capacity(1 + 4 + collection_bytes.len() + body.len() + 1);
        frame.push(opcode.as_u8());
        #[allow(clippy::as_conversions, reason = "collection length is validated against MAX_COLLECTION_NAME_LEN")]
        frame.extend_from_slice(&(collection_bytes.len() as u32).to_be_bytes());
        frame.extend_from_slice(collection_bytes);
        frame.extend_from_slice(&body);
        frame.push(FRAME_TERMINATOR);
        frame
    }

    /// Decodes a client frame (terminator optional; callers may strip it first).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_suffix(&[FRAME_TERMINATOR]).unwrap_or(bytes);

        let (&opcode_byte, rest) = bytes.split_first().ok_or_else(|| AutumnError::Protocol {
            reason: "frame is empty".to_string(),
        })?;
        let opcode = OpCode::from_u8(opcode_byte).ok_or(AutumnError::Protocol {
            reason: format!("unknown opcode {opcode_byte}"),
        })?;

        if rest.len() < 4 {
            return Err(AutumnError::Protocol {
                reason: "frame truncated before collection name length".to_string(),
            });
        }
        let (len_bytes, rest) = rest.split_at(4);
        #[allow(clippy::unwrap_used, reason = "len_bytes is exactly 4 bytes by construction above")]
        let coll_len = u32::from_be_bytes(len_bytes.try_into().unwrap());
        let coll_len_usize = usize::try_from(coll_len).map_err(|_source| AutumnError::Protocol {
            reason: "collection name length does not fit in memory".to_string(),
        })?;
        if coll_len_usize > MAX_COLLECTION_NAME_LEN {
            return Err(AutumnError::Protocol {
                reason: format!("collection name length {coll_len_usize} exceeds {MAX_COLLECTION_NAME_LEN}"),
            });
        }
        if rest.len() < coll_len_usize {
            return Err(AutumnError::Protocol {
                reason: "frame truncated before collection name".to_string(),
            });
        }
        let (collection_bytes, body) = rest.split_at(coll_len_usize);
        let collection = String::from_utf8(collection_bytes.to_vec()).map_err(|_source| AutumnError::Protocol {
            reason: "collection name is not valid UTF-8".to_string(),
        })?;
        validate_collection_name(&collection)?;

        match opcode {
            OpCode::CreateDoc => Ok(Self::CreateDoc {
                collection,
                payload: body.to_vec(),
            }),
            OpCode::ReadDoc => Ok(Self::ReadDoc {
                collection,
                doc_id: take_doc_id(body)?,
            }),
            OpCode::UpdateDoc => {
                if body.len() < DOC_ID_LENGTH {
                    return Err(AutumnError::Protocol {
                        reason: "frame truncated before doc id".to_string(),
                    });
                }
                let (doc_id_bytes, payload) = body.split_at(DOC_ID_LENGTH);
                Ok(Self::UpdateDoc {
                    collection,
                    doc_id: doc_id_string(doc_id_bytes)?,
                    payload: payload.to_vec(),
                })
            },
            OpCode::DeleteDoc => Ok(Self::DeleteDoc {
                collection,
                doc_id: take_doc_id(body)?,
            }),
            OpCode::CreateCollection => Ok(Self::CreateCollection { collection }),
            OpCode::DeleteCollection => Ok(Self::DeleteCollection { collection }),
        }
    }
}

fn doc_id_string(bytes: &[u8]) -> Result<String> {
    if bytes.len() != DOC_ID_LENGTH {
        return Err(AutumnError::Protocol {
            reason: format!("doc id must be exactly {DOC_ID_LENGTH} bytes, got {}", bytes.len()),
        });
    }
    String::from_utf8(bytes.to_vec()).map_err(|_source| AutumnError::Protocol {
        reason: "doc id is not valid UTF-8".to_string(),
    })
}

fn take_doc_id(body: &[u8]) -> Result<String> { doc_id_string(body) }

/// A `DocumentPush` peer frame: originator → answerer's document receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPush {
    pub collection: String,
    pub doc_id: String,
    pub updated_at: String,
    pub payload: Vec<u8>,
}

impl DocumentPush {
    /// Encodes `coll_name_len(1) | coll_name | doc_id(N) | updated_at(N) | document_json`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        validate_collection_name(&self.collection)?;
        let collection_bytes = self.collection.as_bytes();
        #[allow(clippy::as_conversions, reason = "collection length was just validated against MAX_COLLECTION_NAME_LEN")]
        let mut frame = Vec::with_capacity(1 + collection_bytes.len() + DOC_ID_LENGTH * 2 + self.payload.len());
        frame.push(collection_bytes.len() as u8);
        frame.extend_from_slice(collection_bytes);
        frame.extend_from_slice(self.doc_id.as_bytes());
        frame.extend_from_slice(self.updated_at.as_bytes());
        frame.extend_from_slice(&self.payload);
        Ok(frame)
    }

    /// Decodes a `DocumentPush` frame.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&coll_len, rest) = bytes.split_first().ok_or_else(|| AutumnError::Protocol {
            reason: "frame is empty".to_string(),
        })?;
        let coll_len = usize::from(coll_len);
        if coll_len == 0 || coll_len > MAX_COLLECTION_NAME_LEN {
            return Err(AutumnError::Protocol {
                reason: format!("peer collection name length {coll_len} out of range"),
            });
        }
        if rest.len() < coll_len + 2 * DOC_ID_LENGTH {
            return Err(AutumnError::Protocol {
                reason: "document push frame truncated".to_string(),
            });
        }
        let (collection_bytes, rest) = rest.split_at(coll_len);
        let collection = String::from_utf8(collection_bytes.to_vec()).map_err(|_source| AutumnError::Protocol {
            reason: "peer collection name is not valid UTF-8".to_string(),
        })?;
        let (doc_id_bytes, rest) = rest.split_at(DOC_ID_LENGTH);
        let (updated_at_bytes, payload) = rest.split_at(DOC_ID_LENGTH);

        Ok(Self {
            collection,
            doc_id: doc_id_string(doc_id_bytes)?,
            updated_at: doc_id_string(updated_at_bytes)?,
            payload: payload.to_vec(),
        })
    }
}

/// Snapshot-exchange op codes (UDP), distinct from client [`OpCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOpCode {
    /// Answerer's snapshot matches; no push needed.
    TerminateSession,
    /// Originator's `CheckSnapshot` request marker.
    SendingSnapshot,
    /// Answerer's snapshots differ; here is my timestamp.
    SendingTimestamp,
}

impl SnapshotOpCode {
    const fn as_u8(self) -> u8 {
        match self {
            Self::TerminateSession => 0,
            Self::SendingSnapshot => 1,
            Self::SendingTimestamp => 2,
        }
    }

    const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::TerminateSession),
            1 => Some(Self::SendingSnapshot),
            2 => Some(Self::SendingTimestamp),
            _ => None,
        }
    }
}

/// `CheckSnapshot` UDP payload: originator → answerer.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckSnapshot {
    pub collection: String,
    pub doc_id: String,
    pub snapshot: Vec<u8>,
}

impl CheckSnapshot {
    /// Encodes `opcode=1(1) | coll_name_len(1) | coll_name | doc_id(N) | snapshot_bytes`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        validate_collection_name(&self.collection)?;
        let collection_bytes = self.collection.as_bytes();
        #[allow(clippy::as_conversions, reason = "collection length was just validated against MAX_COLLECTION_NAME_LEN")]
        let mut frame = Vec::with_capacity(2 + collection_bytes.len() + DOC_ID_LENGTH + self.snapshot.len());
        frame.push(SnapshotOpCode::SendingSnapshot.as_u8());
        frame.push(collection_bytes.len() as u8);
        frame.extend_from_slice(collection_bytes);
        frame.extend_from_slice(self.doc_id.as_bytes());
        frame.extend_from_slice(&self.snapshot);
        Ok(frame)
    }

    /// Decodes a `CheckSnapshot` datagram.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&opcode_byte, rest) = bytes.split_first().ok_or_else(|| AutumnError::Protocol {
            reason: "datagram is empty".to_string(),
        })?;
        if SnapshotOpCode::from_u8(opcode_byte) != Some(SnapshotOpCode::SendingSnapshot) {
            return Err(AutumnError::Protocol {
                reason: format!("expected CheckSnapshot opcode, got {opcode_byte}"),
            });
        }
        let (&coll_len, rest) = rest.split_first().ok_or_else(|| AutumnError::Protocol {
            reason: "datagram truncated before collection length".to_string(),
        })?;
        let coll_len = usize::from(coll_len);
        if coll_len == 0 || coll_len > MAX_COLLECTION_NAME_LEN {
            return Err(AutumnError::Protocol {
                reason: format!("peer collection name length {coll_len} out of range"),
            });
        }
        if rest.len() < coll_len + DOC_ID_LENGTH {
            return Err(AutumnError::Protocol {
                reason: "CheckSnapshot datagram truncated".to_string(),
            });
        }
        let (collection_bytes, rest) = rest.split_at(coll_len);
        let collection = String::from_utf8(collection_bytes.to_vec()).map_err(|_source| AutumnError::Protocol {
            reason: "peer collection name is not valid UTF-8".to_string(),
        })?;
        let (doc_id_bytes, snapshot) = rest.split_at(DOC_ID_LENGTH);

        Ok(Self {
            collection,
            doc_id: doc_id_string(doc_id_bytes)?,
            snapshot: snapshot.to_vec(),
        })
    }
}

/// The answerer's reply to a `CheckSnapshot` datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotReply {
    /// `0x00`: snapshots matched, no push needed.
    TerminateSession,
    /// `0x02 | timestamp(26 ASCII)`: snapshots differ, here is my version.
    SendingTimestamp(String),
}

impl SnapshotReply {
    /// Encodes the reply datagram.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::TerminateSession => vec![SnapshotOpCode::TerminateSession.as_u8()],
            Self::SendingTimestamp(timestamp) => {
                let mut frame = vec![SnapshotOpCode::SendingTimestamp.as_u8()];
                frame.extend_from_slice(timestamp.as_bytes());
                frame
            },
        }
    }

    /// Decodes a reply datagram.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&opcode_byte, rest) = bytes.split_first().ok_or_else(|| AutumnError::Protocol {
            reason: "reply datagram is empty".to_string(),
        })?;
        match SnapshotOpCode::from_u8(opcode_byte) {
            Some(SnapshotOpCode::TerminateSession) => Ok(Self::TerminateSession),
            Some(SnapshotOpCode::SendingTimestamp) => Ok(Self::SendingTimestamp(doc_id_string(rest)?)),
            _ => Err(AutumnError::Protocol {
                reason: format!("unexpected snapshot reply opcode {opcode_byte}"),
            }),
        }
    }
}
