//! Node configuration (ambient component K).
//!
//! `NodeConfig` is the external collaborator named in §6: a JSON file naming
//! this node's storage root, client listener port, and its own and its
//! neighbors' AAE endpoints. Loading it is in scope; anything past reading
//! a JSON file from a path given on the command line (env overlays, hot
//! reload, secret stores) is not.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CLIENT_PORT;
use crate::error::{AutumnError, Result};

/// One UDP/TCP endpoint a peer exposes, as `{addr, port}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddress {
    /// Hostname or IP literal to bind or connect to.
    pub addr: String,
    /// Port number.
    pub port: u16,
}

impl PeerAddress {
    /// Resolves this endpoint to a [`SocketAddr`] for binding or connecting.
    pub fn to_socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.addr, self.port).parse().map_err(|source| AutumnError::ConfigError {
            reason: format!("invalid peer address '{}:{}': {source}", self.addr, self.port),
        })
    }

    /// Renders `addr:port` for log messages.
    pub fn display(&self) -> String { format!("{}:{}", self.addr, self.port) }
}

/// A peer's pair of AAE listener addresses: the UDP snapshot receiver and
/// the TCP document receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoints {
    /// Where `CheckSnapshot` datagrams are sent/received.
    pub snapshot_receiver: PeerAddress,
    /// Where `DocumentPush` frames are sent/received.
    pub document_receiver: PeerAddress,
}

/// External node configuration: storage root, client port, this node's own
/// endpoints, and the neighbor list to run AAE against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory collections are persisted under.
    pub data_root: PathBuf,
    /// Port the client endpoint (component H) listens on.
    #[serde(default = "default_client_port")]
    pub client_port: u16,
    /// This node's own snapshot/document receiver addresses.
    pub current: NodeEndpoints,
    /// Peers to run Active Anti-Entropy against.
    #[serde(default)]
    pub neighbors: Vec<NodeEndpoints>,
}

const fn default_client_port() -> u16 { DEFAULT_CLIENT_PORT }

impl NodeConfig {
    /// Loads and parses a `NodeConfig` from a JSON file at `path`.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|source| AutumnError::ConfigError {
            reason: format!("failed to read config '{}': {source}", path.display()),
        })?;
        serde_json::from_slice(&bytes).map_err(|source| AutumnError::ConfigError {
            reason: format!("failed to parse config '{}': {source}", path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_a_well_formed_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        tokio::fs::write(
            &path,
            r#"{
                "data_root": "./data",
                "client_port": 50000,
                "current": {
                    "snapshot_receiver": {"addr": "0.0.0.0", "port": 50001},
                    "document_receiver": {"addr": "0.0.0.0", "port": 50002}
                },
                "neighbors": [
                    {
                        "snapshot_receiver": {"addr": "10.0.0.2", "port": 50001},
                        "document_receiver": {"addr": "10.0.0.2", "port": 50002}
                    }
                ]
            }"#,
        )
        .await
        .unwrap();

        let config = NodeConfig::load(&path).await.unwrap();
        assert_eq!(config.client_port, 50000);
        assert_eq!(config.neighbors.len(), 1);
        assert_eq!(config.current.snapshot_receiver.port, 50001);
    }

    #[tokio::test]
    async fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = NodeConfig::load(&dir.path().join("missing.json")).await;
        assert!(matches!(result, Err(AutumnError::ConfigError { .. })));
    }

    #[tokio::test]
    async fn malformed_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let result = NodeConfig::load(&path).await;
        assert!(matches!(result, Err(AutumnError::ConfigError { .. })));
    }

    #[tokio::test]
    async fn client_port_defaults_when_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        tokio::fs::write(
            &path,
            r#"{
                "data_root": "./data",
                "current": {
                    "snapshot_receiver": {"addr": "0.0.0.0", "port": 50001},
                    "document_receiver": {"addr": "0.0.0.0", "port": 50002}
                }
            }"#,
        )
        .await
        .unwrap();

        let config = NodeConfig::load(&path).await.unwrap();
        assert_eq!(config.client_port, DEFAULT_CLIENT_PORT);
        assert!(config.neighbors.is_empty());
    }

    #[test]
    fn peer_address_resolves_to_socket_addr() {
        let peer = PeerAddress {
            addr: "127.0.0.1".to_string(),
            port: 50001,
        };
        assert_eq!(peer.to_socket_addr().unwrap().to_string(), "127.0.0.1:50001");
    }
}
