//! Group daemon process supervision.
//!
//! Grounded on the teacher's `driver::process::ProcessMonitor` (a
//! `tokio::select!` over a cancellation token and the monitored process) and
//! `pty::spawn::NativePty`'s spawn-then-reap shape, adapted from a
//! PTY-backed `forkpty`/`execvp` pair to a plain `tokio::process::Command`
//! child, since the group daemon is headless and needs no terminal.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::registry::GroupRegistry;

/// Spawns and supervises group daemon child processes.
pub struct Supervisor {
    groupd_path: PathBuf,
}

impl Supervisor {
    pub fn new(groupd_path: PathBuf) -> Self {
        Self { groupd_path }
    }

    /// Spawn a group daemon for `name` bound to `port`, and supervise it
    /// until it exits or `shutdown` fires. On either outcome the group's
    /// registry entry is freed.
    pub fn spawn(
        &self,
        name: String,
        port: u16,
        idle_timeout_sec: u64,
        registry: Arc<GroupRegistry>,
        shutdown: CancellationToken,
    ) -> std::io::Result<()> {
        let mut child = Command::new(&self.groupd_path)
            .arg(&name)
            .arg(port.to_string())
            .arg(idle_timeout_sec.to_string())
            .kill_on_drop(true)
            .spawn()?;

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    match status {
                        Ok(status) => info!(group = %name, %status, "group daemon exited"),
                        Err(error) => warn!(group = %name, %error, "error waiting on group daemon"),
                    }
                }
                () = shutdown.cancelled() => {
                    if let Err(error) = child.start_kill() {
                        warn!(group = %name, %error, "failed to signal group daemon shutdown");
                    }
                    let _ = child.wait().await;
                }
            }
            registry.remove(&name).await;
        });

        Ok(())
    }
}

#[cfg(test)]
// OK to panic in test-only code -- assertion failures should fail loudly.
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exited_child_frees_its_registry_slot() {
        let registry = Arc::new(GroupRegistry::new(4, 8010));
        registry.get_or_create("chat").await.unwrap();

        let supervisor = Supervisor::new(PathBuf::from("true"));
        supervisor
            .spawn("chat".to_owned(), 8010, 0, registry.clone(), CancellationToken::new())
            .unwrap();

        for _ in 0..50 {
            if registry.find("chat").await.is_none() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("registry entry was never freed after child exit");
    }

    #[tokio::test]
    async fn cancellation_kills_child_and_frees_slot() {
        let registry = Arc::new(GroupRegistry::new(4, 8010));
        // Name "5" doubles as `sleep`'s first operand so the supervised
        // child actually blocks until cancellation kills it.
        registry.get_or_create("5").await.unwrap();
        let shutdown = CancellationToken::new();

        let supervisor = Supervisor::new(PathBuf::from("sleep"));
        supervisor
            .spawn("5".to_owned(), 8010, 0, registry.clone(), shutdown.clone())
            .unwrap();

        shutdown.cancel();

        for _ in 0..50 {
            if registry.find("5").await.is_none() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("registry entry was never freed after cancellation");
    }
}
