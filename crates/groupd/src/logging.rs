use tracing_subscriber::EnvFilter;

use crate::config::Cli;

/// Initialize the global tracing subscriber. Priority: `--log-level` /
/// `CHATFAB_LOG_LEVEL` (via clap's env binding) > `RUST_LOG` > `"info"`.
pub fn init_tracing(cli: &Cli) {
    use tracing_subscriber::fmt;

    let filter = if std::env::var("CHATFAB_LOG_LEVEL").is_err() && cli.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level))
    } else {
        EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match cli.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}
