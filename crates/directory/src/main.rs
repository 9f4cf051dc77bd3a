use std::sync::Arc;

use chatfab_directory::config::{Cli, Settings};
use chatfab_directory::logging::init_tracing;
use chatfab_directory::registry::GroupRegistry;
use chatfab_directory::spawn::Supervisor;
use chatfab_directory::{admin, server};
use clap::Parser;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let settings = Settings::load(&cli.config_path)?;
    settings.validate()?;
    info!(?settings, "directory starting");

    let bind_addr = (settings.server_ip, settings.server_port);
    let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
    info!(ip = %bind_addr.0, port = bind_addr.1, "directory bound");

    let groupd_path = groupd_sibling_path()?;
    let registry = Arc::new(GroupRegistry::new(settings.max_groups, settings.base_port));
    let supervisor = Arc::new(Supervisor::new(groupd_path));
    let shutdown = CancellationToken::new();

    let shutdown_signals = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        shutdown_signals.cancel();
    });

    let admin_task = tokio::spawn(admin::run(socket.clone(), registry.clone(), shutdown.clone()));

    server::run(socket, settings, registry, supervisor, shutdown).await?;
    let _ = admin_task.await;

    Ok(())
}

/// Locate the `groupd` binary expected to sit next to this one, the way a
/// monorepo's workspace binaries are deployed together.
fn groupd_sibling_path() -> anyhow::Result<std::path::PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().ok_or_else(|| anyhow::anyhow!("directoryd has no parent directory"))?;
    Ok(dir.join("groupd"))
}
