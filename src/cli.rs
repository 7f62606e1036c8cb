//! Command-line entry point.
//!
//! Parses the flags, initializes logging, loads the config file, and runs
//! the server in the foreground. Exit status is zero on clean shutdown and
//! nonzero on configuration errors.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::server;

/// Caching, rewriting proxy for the module-download protocol.
#[derive(Parser)]
#[command(name = "modproxy", version)]
pub struct Cli {
    /// IP address to listen on (all interfaces when empty)
    #[arg(long, default_value = "")]
    pub ip: String,

    /// Port to listen on
    #[arg(long, default_value_t = 9090)]
    pub port: u16,

    /// Path to the JSON config file
    #[arg(long, default_value = "./vgo.json")]
    pub config: PathBuf,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("modproxy=info,tower_http=info")),
        )
        .init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    info!(
        config = %serde_json::to_string_pretty(&config).unwrap_or_default(),
        "configuration loaded"
    );

    let state = server::build_state(&config)?;
    server::run_server(&cli.ip, cli.port, state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_interface() {
        let cli = Cli::parse_from(["modproxy"]);
        assert_eq!(cli.ip, "");
        assert_eq!(cli.port, 9090);
        assert_eq!(cli.config, PathBuf::from("./vgo.json"));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "modproxy",
            "--ip",
            "127.0.0.1",
            "--port",
            "8080",
            "--config",
            "/etc/modproxy.json",
        ]);
        assert_eq!(cli.ip, "127.0.0.1");
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.config, PathBuf::from("/etc/modproxy.json"));
    }
}
