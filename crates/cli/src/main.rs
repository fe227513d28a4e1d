mod cli;
mod commands;
mod logging;

#[tokio::main]
async fn main() -> autumndb::Result<()> { cli::run().await }
