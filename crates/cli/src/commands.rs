//! Command handlers for the AutumnDB driver.
//!
//! Each command opens one short-lived TCP connection to a node's client
//! endpoint, encodes a single [`ClientRequest`], and either waits for a
//! reply (`create`, `read`) or closes immediately — matching the wire
//! protocol's own "no ack on write" rule rather than adding any retry or
//! session logic of its own.

use std::net::SocketAddr;

use autumndb::codec::ClientRequest;
use autumndb::error::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpStream;

/// A thin driver for the AutumnDB client protocol.
#[derive(Parser)]
#[command(name = "autumndb-cli")]
pub struct Cli {
    #[command(subcommand)]
    /// The subcommand to execute.
    pub command: Commands,

    /// Node's client endpoint address, e.g. `127.0.0.1:50000`.
    #[arg(long, global = true, default_value = "127.0.0.1:50000")]
    pub node: SocketAddr,

    /// Output logs in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (can be used multiple times: -v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Enumeration of every client request this driver can send.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a collection.
    CreateCollection {
        /// Collection name.
        collection: String,
    },
    /// Delete a collection and its contents.
    DeleteCollection {
        /// Collection name.
        collection: String,
    },
    /// Create a document; prints the assigned id.
    Create {
        /// Collection name.
        collection: String,
        /// Document body, a JSON value.
        document: String,
    },
    /// Read a document by id; prints its payload.
    Read {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
    },
    /// Overwrite an existing document's payload.
    Update {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
        /// New document body, a JSON value.
        document: String,
    },
    /// Remove a document.
    Delete {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
    },
}

/// Dispatches `command` against the node at `node`.
pub async fn run_command(command: Commands, node: SocketAddr) -> Result<()> {
    let request = match command {
        Commands::CreateCollection { collection } => ClientRequest::CreateCollection { collection },
        Commands::DeleteCollection { collection } => ClientRequest::DeleteCollection { collection },
        Commands::Create { collection, document } => ClientRequest::CreateDoc {
            collection,
            payload: document.into_bytes(),
        },
        Commands::Read { collection, id } => ClientRequest::ReadDoc { collection, doc_id: id },
        Commands::Update { collection, id, document } => ClientRequest::UpdateDoc {
            collection,
            doc_id: id,
            payload: document.into_bytes(),
        },
        Commands::Delete { collection, id } => ClientRequest::DeleteDoc { collection, doc_id: id },
    };

    let expects_reply = matches!(request, ClientRequest::CreateDoc { .. } | ClientRequest::ReadDoc { .. });

    let mut stream = TcpStream::connect(node).await?;
    stream.write_all(&request.encode()).await?;

    if expects_reply {
        stream.shutdown().await?;
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;
        if response.is_empty() {
            println!("(no document)");
        }
        else if let Ok(text) = String::from_utf8(response.clone()) {
            println!("{text}");
        }
        else {
            println!("{response:?}");
        }
    }
    else {
        stream.shutdown().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_document_command() {
        let cli = Cli::try_parse_from(["autumndb-cli", "create", "users", r#"{"a":1}"#]).unwrap();
        match cli.command {
            Commands::Create { collection, document } => {
                assert_eq!(collection, "users");
                assert_eq!(document, r#"{"a":1}"#);
            },
            _ => panic!("expected Create command"),
        }
    }

    #[test]
    fn parses_node_address_override() {
        let cli = Cli::try_parse_from(["autumndb-cli", "--node", "10.0.0.5:9000", "delete-collection", "users"]).unwrap();
        assert_eq!(cli.node.to_string(), "10.0.0.5:9000");
    }

    #[test]
    fn defaults_to_local_node() {
        let cli = Cli::try_parse_from(["autumndb-cli", "read", "users", "docid"]).unwrap();
        assert_eq!(cli.node.to_string(), "127.0.0.1:50000");
    }
}
