//! framewired - standalone RPC server binary.
//!
//! `clap` derive for flags, `anyhow` at the binary boundary, and a
//! `tracing-subscriber` `EnvFilter` initialized from `RUST_LOG`.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use framewire::dispatch::ServiceRegistry;
use framewire::protocol::ProtocolVariant;
use framewire::server::{Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "framewired", about = "Framewire RPC server", version)]
struct Cli {
    /// TCP address to bind, e.g. 127.0.0.1:9000 (disabled unless set)
    #[arg(long)]
    tcp_bind: Option<String>,

    /// Unix socket path (POSIX) or named pipe name (Windows)
    #[arg(long)]
    socket_path: Option<String>,

    /// Maximum concurrent connections
    #[arg(long, default_value_t = 100)]
    max_connections: usize,

    /// Use the lean protocol variant (request/response only: no events,
    /// layer data, or config/protocol-error framelets)
    #[arg(long)]
    lean: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::default();
    if cli.tcp_bind.is_some() {
        config.tcp_bind = cli.tcp_bind;
    }
    if cli.socket_path.is_some() {
        config.socket_path = cli.socket_path;
    }
    config.max_connections = cli.max_connections;
    config.variant = if cli.lean { ProtocolVariant::Lean } else { ProtocolVariant::Rich };

    let services = Arc::new(ServiceRegistry::new());
    let server = Server::new(config, services);

    let shutdown_signal = server.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_signal.shutdown();
    });

    server.run().await.context("server exited with an error")
}
