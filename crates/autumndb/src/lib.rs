//! AutumnDB: a distributed, document-oriented key-value store.
//!
//! Each node persists JSON documents grouped into named collections on
//! local storage (components A-D), exposes a compact binary TCP protocol
//! for CRUD operations (components G-H) serialized through a single-writer
//! operation engine (component E) that fans post-commit events out over an
//! event bus (component F), and converges with peer nodes through an Active
//! Anti-Entropy replicator (components I-J) built on a spectral Bloom
//! filter plus rolling digest content summary and a last-writer-wins
//! timestamp rule.

/// Active Anti-Entropy replicator: originator and answerer (component J).
pub mod aae;
/// Binary framing codec shared by client and peer traffic (component G).
pub mod codec;
/// Collection operator: directory layout, mutex, document lifecycle (component C).
pub mod collection;
/// Node configuration loaded from a JSON file (ambient component K).
pub mod config;
/// Wire-format, directory-layout and AAE timing constants.
pub mod constants;
/// Document payload operator (component B, data half).
pub mod document;
/// Crate-wide error type.
pub mod error;
/// Publish/subscribe event bus (component F).
pub mod events;
/// Filesystem access primitive (component A).
pub mod fs;
/// Tracing-subscriber setup (ambient logging component L).
pub mod logging;
/// Document metadata sidecar operator (component B, metadata half).
pub mod metadata;
/// Single-consumer operation queue (component E).
pub mod operation;
/// Collection registry (component D).
pub mod registry;
/// Client TCP endpoint (component H).
pub mod server;
/// Spectral Bloom filter and rolling digest content summary (component I).
pub mod snapshot;

pub use aae::{AaeAnswerer, AaeOriginator};
pub use codec::{ClientRequest, OpCode};
pub use collection::Collection;
pub use config::{NodeConfig, NodeEndpoints, PeerAddress};
pub use error::{AutumnError, Result};
pub use events::{Event, EventBus};
pub use operation::{Operation, OperationEngine, OperationOutcome};
pub use registry::Store;
pub use server::ClientEndpoint;
pub use snapshot::Snapshot;
