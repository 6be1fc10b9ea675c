#![forbid(unsafe_code)]
//! Boot one TallyChain node: HTTP API plus background miner and consensus.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tallychain::api::run_api_server;
use tallychain::config::load_config;
use tallychain::node::Node;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ledger-node", about = "Run a TallyChain ledger node")]
struct Args {
    /// Port for the HTTP API
    port: Option<u16>,
    /// Identifier of this node
    node_id: Option<String>,
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Extra peers (host:port), comma separated
    #[arg(short, long, value_delimiter = ',')]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.node.api_port = port;
    }
    if let Some(node_id) = args.node_id {
        config.node.id = node_id;
    }
    config.merge_peers(&args.peers.join(","));
    config.validate()?;

    let node = Arc::new(Node::from_config(&config)?);
    tracing::info!(
        node = %node.id(),
        port = config.node.api_port,
        peers = config.network.peers.len(),
        difficulty = config.miner.difficulty,
        "node.starting"
    );

    let background = node.start_background_from_config(&config);
    if background.is_empty() {
        tracing::info!(node = %node.id(), "background.disabled");
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "signal.listen_failed");
        }
    };
    let served = run_api_server(node.clone(), config.node.api_port, shutdown).await;

    background.shutdown().await;
    tracing::info!(node = %node.id(), "node.stopped");
    served?;
    Ok(())
}
