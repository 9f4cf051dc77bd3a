use std::net::IpAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

/// Protocol-facing core for a chat client. The interactive menu/UI is out of
/// scope; this binary exposes one-shot subcommands for demonstration and
/// scripting instead.
#[derive(Debug, Parser)]
#[command(name = "chatfab-client", version, about)]
pub struct Cli {
    /// Path to the client config file (KEY=VALUE).
    pub config_path: PathBuf,

    #[command(subcommand)]
    pub command: Command,

    /// Log format (json or text).
    #[arg(long, env = "CHATFAB_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CHATFAB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List groups known to the directory.
    List,
    /// Create a new group.
    Create { name: String },
    /// Join a group and send a single message, then detach.
    Join { name: String, text: String },
    /// Merge two groups this user administers.
    Merge { token_a: String, group_a: String, token_b: String, group_b: String },
}

/// Parsed and validated client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub user: String,
    pub server_ip: IpAddr,
    pub server_port: u16,
    pub local_recv_port: u16,
}

impl Settings {
    /// Load settings from a KEY=VALUE config file. `USER` is required; the
    /// rest fall back to defaults aimed at a directory on localhost.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        Self::from_map(&chatfab_wire::kv_config::parse(&contents))
    }

    fn from_map(map: &std::collections::HashMap<String, String>) -> anyhow::Result<Self> {
        let user = map.get("USER").cloned().ok_or_else(|| anyhow::anyhow!("missing USER"))?;
        if !chatfab_wire::group::is_valid_user(&user) {
            anyhow::bail!("invalid USER: {user}");
        }

        let server_ip = match map.get("SERVER_IP") {
            Some(v) => v.parse().map_err(|_| anyhow::anyhow!("invalid SERVER_IP: {v}"))?,
            None => IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        };
        let server_port = parse_or_default(map, "SERVER_PORT", 8000)?;
        let local_recv_port = parse_or_default(map, "LOCAL_RECV_PORT", 0)?;

        Ok(Self { user, server_ip, server_port, local_recv_port })
    }
}

fn parse_or_default<T: std::str::FromStr>(
    map: &std::collections::HashMap<String, String>,
    key: &str,
    default: T,
) -> anyhow::Result<T> {
    match map.get(key) {
        Some(v) => v.parse().map_err(|_| anyhow::anyhow!("invalid {key}: {v}")),
        None => Ok(default),
    }
}
