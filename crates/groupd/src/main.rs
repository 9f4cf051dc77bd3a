use std::sync::Arc;

use chatfab_groupd::clock::SystemClock;
use chatfab_groupd::config::Cli;
use chatfab_groupd::engine::Engine;
use chatfab_groupd::logging::init_tracing;
use clap::Parser;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let socket = UdpSocket::bind(("0.0.0.0", cli.port)).await?;
    info!(
        group = %cli.name,
        port = cli.port,
        idle_timeout_sec = cli.idle_timeout_sec,
        "group daemon starting"
    );

    let shutdown = CancellationToken::new();
    let shutdown_signals = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        shutdown_signals.cancel();
    });

    let engine = Engine::new(cli.name, cli.idle_timeout_sec, socket, Arc::new(SystemClock));
    engine.run(shutdown).await;

    Ok(())
}
