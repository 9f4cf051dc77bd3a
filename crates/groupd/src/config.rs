use clap::Parser;

/// A single chat group's broadcast daemon.
#[derive(Debug, Parser)]
#[command(name = "groupd", version, about)]
pub struct Cli {
    /// Group name.
    pub name: String,

    /// UDP port to bind.
    pub port: u16,

    /// Idle timeout in seconds (0 = disabled).
    pub idle_timeout_sec: u64,

    /// Log format (json or text).
    #[arg(long, env = "CHATFAB_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CHATFAB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
