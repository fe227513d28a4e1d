use clap::Parser as _;

use crate::commands::{run_command, Cli};
use crate::logging::init_tracing;

/// Runs the AutumnDB driver: parses arguments, initializes tracing, and
/// sends one request to the configured node.
pub async fn run() -> autumndb::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.json, cli.verbose);

    run_command(cli.command, cli.node).await
}
