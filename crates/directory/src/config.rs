use std::net::IpAddr;
use std::path::{Path, PathBuf};

use clap::Parser;

/// Multi-group chat directory service.
#[derive(Debug, Parser)]
#[command(name = "directoryd", version, about)]
pub struct Cli {
    /// Path to the directory config file (KEY=VALUE).
    pub config_path: PathBuf,

    /// Log format (json or text).
    #[arg(long, env = "CHATFAB_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CHATFAB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Parsed and validated directory settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_ip: IpAddr,
    pub server_port: u16,
    pub base_port: u16,
    pub max_groups: u16,
    pub idle_timeout_sec: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_ip: IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            server_port: 8000,
            base_port: 8010,
            max_groups: 32,
            idle_timeout_sec: 1800,
        }
    }
}

impl Settings {
    /// Load settings from a KEY=VALUE config file, falling back to defaults
    /// for any key that is absent.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        Self::from_map(&chatfab_wire::kv_config::parse(&contents))
    }

    fn from_map(map: &std::collections::HashMap<String, String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let server_ip = match map.get("SERVER_IP") {
            Some(v) => v.parse().map_err(|_| anyhow::anyhow!("invalid SERVER_IP: {v}"))?,
            None => defaults.server_ip,
        };
        let server_port = parse_or_default(map, "SERVER_PORT", defaults.server_port)?;
        let base_port = parse_or_default(map, "BASE_PORT", defaults.base_port)?;
        let max_groups = parse_or_default(map, "MAX_GROUPS", defaults.max_groups)?;
        let idle_timeout_sec = parse_or_default(map, "IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec)?;

        let settings = Self { server_ip, server_port, base_port, max_groups, idle_timeout_sec };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=256).contains(&self.max_groups) {
            anyhow::bail!("MAX_GROUPS must be between 1 and 256, got {}", self.max_groups);
        }
        if self.base_port.checked_add(self.max_groups).is_none() {
            anyhow::bail!("BASE_PORT + MAX_GROUPS overflows a u16 port range");
        }
        Ok(())
    }

    /// The exclusive upper bound of the group port range.
    pub fn port_range_end(&self) -> u16 {
        self.base_port + self.max_groups
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

#[cfg(test)]
// OK to panic in test-only code -- assertion failures should fail loudly.
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_file_empty() {
        let settings = Settings::from_map(&Default::default()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn overrides_from_map() {
        let mut map = std::collections::HashMap::new();
        map.insert("SERVER_PORT".to_owned(), "9000".to_owned());
        map.insert("MAX_GROUPS".to_owned(), "4".to_owned());
        let settings = Settings::from_map(&map).unwrap();
        assert_eq!(settings.server_port, 9000);
        assert_eq!(settings.max_groups, 4);
        assert_eq!(settings.base_port, 8010);
    }

    #[test]
    fn rejects_out_of_range_max_groups() {
        let mut map = std::collections::HashMap::new();
        map.insert("MAX_GROUPS".to_owned(), "0".to_owned());
        assert!(Settings::from_map(&map).is_err());
    }

    #[test]
    fn loads_from_real_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SERVER_IP=127.0.0.1\nBASE_PORT=9010\n# comment\n").unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.server_ip, "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(settings.base_port, 9010);
    }

    #[test]
    fn port_range_end_is_exclusive_upper_bound() {
        let settings = Settings::default();
        assert_eq!(settings.port_range_end(), 8010 + 32);
    }
}
