//! deskrelay relay server: entry point.
//!
//! Pairs one desktop agent (`host`) with one viewer bridge (`client`) and
//! forwards bytes between them.
//!
//! # Usage
//!
//! ```text
//! deskrelay-server [OPTIONS]
//!
//! Options:
//!   --config <FILE>                 TOML config file
//!   --listen <ADDR>                 Listen address [default: 0.0.0.0:5000]
//!   --handshake-timeout-ms <MS>     Handshake deadline [default: 5000]
//!   --max-pending-bytes <BYTES>     Pre-pairing buffer limit [default: 33554432]
//!   --outbound-queue-len <CHUNKS>   Per-connection queue capacity [default: 256]
//! ```
//!
//! # Precedence
//!
//! Built-in defaults, then the config file, then environment variables and
//! flags.
//!
//! | Variable                          | Flag                     |
//! |-----------------------------------|--------------------------|
//! | `DESKRELAY_CONFIG`                | `--config`               |
//! | `DESKRELAY_LISTEN`                | `--listen`               |
//! | `DESKRELAY_HANDSHAKE_TIMEOUT_MS`  | `--handshake-timeout-ms` |
//! | `DESKRELAY_MAX_PENDING_BYTES`     | `--max-pending-bytes`    |
//! | `DESKRELAY_OUTBOUND_QUEUE_LEN`    | `--outbound-queue-len`   |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use deskrelay_server::domain::{load_config_file, RelayConfig};
use deskrelay_server::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// deskrelay relay server.
#[derive(Debug, Parser)]
#[command(
    name = "deskrelay-server",
    about = "Pairs a desktop agent with a viewer bridge and relays bytes between them",
    version
)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, env = "DESKRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. `0.0.0.0:5000`.
    #[arg(long, env = "DESKRELAY_LISTEN")]
    listen: Option<String>,

    /// Milliseconds a new connection has to send its role token.
    #[arg(long, env = "DESKRELAY_HANDSHAKE_TIMEOUT_MS")]
    handshake_timeout_ms: Option<u64>,

    /// Bytes buffered per connection before its counterpart attaches.
    #[arg(long, env = "DESKRELAY_MAX_PENDING_BYTES")]
    max_pending_bytes: Option<usize>,

    /// Capacity, in chunks, of each connection's outbound queue.
    #[arg(long, env = "DESKRELAY_OUTBOUND_QUEUE_LEN")]
    outbound_queue_len: Option<usize>,
}

impl Cli {
    /// Resolves defaults, the config file, and flags into a [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or `--listen` is
    /// not a valid socket address.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?
                .into_relay_config(),
            None => RelayConfig::default(),
        };

        if let Some(listen) = &self.listen {
            config.listen_addr = listen
                .parse::<SocketAddr>()
                .with_context(|| format!("invalid listen address: '{listen}'"))?;
        }
        if let Some(ms) = self.handshake_timeout_ms {
            config.handshake_timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = self.max_pending_bytes {
            config.max_pending_bytes = bytes;
        }
        if let Some(len) = self.outbound_queue_len {
            config.outbound_queue_len = len;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_relay_config()?;

    info!(
        "deskrelay relay starting: listen={}, handshake_timeout={:?}, max_pending_bytes={}",
        config.listen_addr, config.handshake_timeout, config.max_pending_bytes
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("deskrelay relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["deskrelay-server"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    fn bare() -> Cli {
        Cli {
            config: None,
            listen: None,
            handshake_timeout_ms: None,
            max_pending_bytes: None,
            outbound_queue_len: None,
        }
    }

    #[test]
    fn test_no_flags_yield_default_config() {
        let config = bare().into_relay_config().unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_listen_override() {
        let config = cli(&["--listen", "127.0.0.1:6000"]).into_relay_config().unwrap();
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:6000");
    }

    #[test]
    fn test_limit_overrides() {
        let config = cli(&[
            "--handshake-timeout-ms",
            "750",
            "--max-pending-bytes",
            "4096",
            "--outbound-queue-len",
            "16",
        ])
        .into_relay_config()
        .unwrap();

        assert_eq!(config.handshake_timeout, Duration::from_millis(750));
        assert_eq!(config.max_pending_bytes, 4096);
        assert_eq!(config.outbound_queue_len, 16);
    }

    #[test]
    fn test_invalid_listen_address_returns_error() {
        // Arrange
        let cli = Cli {
            listen: Some("not.an.address".to_string()),
            ..bare()
        };

        // Act
        let result = cli.into_relay_config();

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_config_file_returns_error() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/deskrelay.toml")),
            ..bare()
        };
        assert!(cli.into_relay_config().is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        // Arrange: a file that sets both the address and the timeout
        let path = std::env::temp_dir().join(format!(
            "deskrelay-cli-test-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "[relay]\nlisten_addr = \"127.0.0.1:7000\"\nhandshake_timeout_ms = 100\n",
        )
        .unwrap();

        // Act: the flag replaces the file's address only
        let cli = Cli {
            config: Some(path.clone()),
            listen: Some("127.0.0.1:7001".to_string()),
            ..bare()
        };
        let config = cli.into_relay_config();
        std::fs::remove_file(&path).unwrap();
        let config = config.unwrap();

        // Assert
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:7001");
        assert_eq!(config.handshake_timeout, Duration::from_millis(100));
    }
}
