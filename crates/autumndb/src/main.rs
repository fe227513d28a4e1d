use std::path::PathBuf;
use std::sync::Arc;

use autumndb::{AaeAnswerer, AaeOriginator, AutumnError, Result};
use autumndb::config::NodeConfig;
use autumndb::events::EventBus;
use autumndb::logging::init_tracing;
use autumndb::operation::OperationEngine;
use autumndb::registry::Store;
use autumndb::server::ClientEndpoint;
use clap::Parser;
use tracing::info;

/// AutumnDB node: filesystem-backed document store with Active Anti-Entropy replication.
#[derive(Debug, Parser)]
#[command(name = "autumndb", version, about)]
struct Cli {
    /// Path to the node's JSON configuration file.
    config: PathBuf,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, cli.verbose);

    let config = NodeConfig::load(&cli.config).await?;

    let event_bus = Arc::new(EventBus::new());
    let store = Store::open(config.data_root.clone(), Arc::clone(&event_bus)).await?;
    let engine = OperationEngine::spawn(Arc::clone(&store), Arc::clone(&event_bus));

    let client_addr = format!("0.0.0.0:{}", config.client_port).parse().map_err(|source| AutumnError::ConfigError {
        reason: format!("invalid client_port {}: {source}", config.client_port),
    })?;
    let client_endpoint = ClientEndpoint::bind(client_addr, Arc::clone(&store), engine).await?;

    let answerer = Arc::new(AaeAnswerer::new(Arc::clone(&store)));
    let snapshot_addr = config.current.snapshot_receiver.to_socket_addr()?;
    let document_addr = config.current.document_receiver.to_socket_addr()?;

    let originator = AaeOriginator::new(Arc::clone(&store), config.neighbors.clone());

    info!("autumndb node starting, data_root={}", config.data_root.display());

    let snapshot_receiver = {
        let answerer = Arc::clone(&answerer);
        tokio::spawn(async move { answerer.run_snapshot_receiver(snapshot_addr).await })
    };
    let document_receiver = {
        let answerer = Arc::clone(&answerer);
        tokio::spawn(async move { answerer.run_document_receiver(document_addr).await })
    };
    let client_task = tokio::spawn(client_endpoint.serve());
    let originator_task = tokio::spawn(originator.run(event_bus));

    tokio::select! {
        result = snapshot_receiver => result.map_err(join_error)??,
        result = document_receiver => result.map_err(join_error)??,
        result = client_task => result.map_err(join_error)??,
        _ = originator_task => {},
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }

    Ok(())
}

fn join_error(source: tokio::task::JoinError) -> AutumnError {
    AutumnError::Protocol {
        reason: format!("node task panicked: {source}"),
    }
}
