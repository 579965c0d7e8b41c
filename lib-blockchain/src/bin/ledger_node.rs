//! Ledger Node
//!
//! Loads the node configuration, starts the mining loop and runs until
//! interrupted.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use lib_blockchain::{Node, NodeConfig};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match parse_config_path() {
        Some(path) => NodeConfig::load(&path).await?,
        None => {
            tracing::info!("No --config given, using defaults");
            NodeConfig::default()
        }
    };

    let node = Arc::new(Node::in_memory(config)?);
    tracing::info!("Node ready: {:?}", node);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let miner = node.spawn_miner(shutdown_rx);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    miner.await?;

    Ok(())
}

/// `--config <path>` or `-c <path>`
fn parse_config_path() -> Option<PathBuf> {
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" if i + 1 < args.len() => return Some(PathBuf::from(&args[i + 1])),
            _ => i += 1,
        }
    }
    None
}
