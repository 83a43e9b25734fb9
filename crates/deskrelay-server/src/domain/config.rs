//! Relay configuration.
//!
//! [`RelayConfig`] holds the runtime settings.  It is built from defaults,
//! optionally overlaid with a TOML file, and finally with command-line flags
//! (see `main.rs`).
//!
//! ```toml
//! [relay]
//! listen_addr = "0.0.0.0:5000"
//! handshake_timeout_ms = 5000
//! max_pending_bytes = 33554432
//! outbound_queue_len = 256
//! ```
//!
//! Every key is optional; missing keys keep their default.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// All runtime configuration for the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the relay listens on for both agents and bridges.
    pub listen_addr: SocketAddr,

    /// How long a new connection has to send its role token.
    pub handshake_timeout: Duration,

    /// Ceiling on bytes buffered for one connection while its counterpart
    /// has not attached yet.
    pub max_pending_bytes: usize,

    /// Capacity, in chunks, of each connection's outbound queue.
    pub outbound_queue_len: usize,
}

impl Default for RelayConfig {
    /// | Field              | Default         |
    /// |--------------------|-----------------|
    /// | listen_addr        | `0.0.0.0:5000`  |
    /// | handshake_timeout  | 5 seconds       |
    /// | max_pending_bytes  | 32 MiB          |
    /// | outbound_queue_len | 256             |
    fn default() -> Self {
        Self {
            // Compile-time-known valid address.
            listen_addr: "0.0.0.0:5000".parse().unwrap(),
            handshake_timeout: Duration::from_secs(5),
            max_pending_bytes: 32 * 1024 * 1024,
            outbound_queue_len: 256,
        }
    }
}

// ── File schema ───────────────────────────────────────────────────────────────

/// Top-level shape of the TOML configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayFileConfig {
    #[serde(default)]
    pub relay: RelaySection,
}

/// The `[relay]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelaySection {
    pub listen_addr: SocketAddr,
    pub handshake_timeout_ms: u64,
    pub max_pending_bytes: usize,
    pub outbound_queue_len: usize,
}

impl Default for RelaySection {
    fn default() -> Self {
        let defaults = RelayConfig::default();
        Self {
            listen_addr: defaults.listen_addr,
            handshake_timeout_ms: defaults.handshake_timeout.as_millis() as u64,
            max_pending_bytes: defaults.max_pending_bytes,
            outbound_queue_len: defaults.outbound_queue_len,
        }
    }
}

impl RelayFileConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or mistyped values.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Converts the file values into a [`RelayConfig`].
    pub fn into_relay_config(self) -> RelayConfig {
        RelayConfig {
            listen_addr: self.relay.listen_addr,
            handshake_timeout: Duration::from_millis(self.relay.handshake_timeout_ms),
            max_pending_bytes: self.relay.max_pending_bytes,
            outbound_queue_len: self.relay.outbound_queue_len,
        }
    }
}

/// Loads a configuration file from `path`.
///
/// The file was named explicitly, so a missing file is an error rather than
/// a silent fallback to defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if its content is not a valid relay config.
pub fn load_config_file(path: &Path) -> Result<RelayFileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    RelayFileConfig::parse(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listen_port_is_5000() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.listen_addr.port(), 5000);
        assert!(cfg.listen_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_limits() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.handshake_timeout, Duration::from_secs(5));
        assert_eq!(cfg.max_pending_bytes, 32 * 1024 * 1024);
        assert_eq!(cfg.outbound_queue_len, 256);
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        // Arrange / Act
        let cfg = RelayFileConfig::parse("").unwrap().into_relay_config();

        // Assert
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_missing_defaults() {
        let toml = r#"
            [relay]
            listen_addr = "127.0.0.1:6000"
        "#;

        let cfg = RelayFileConfig::parse(toml).unwrap().into_relay_config();

        assert_eq!(cfg.listen_addr.to_string(), "127.0.0.1:6000");
        assert_eq!(cfg.handshake_timeout, Duration::from_secs(5));
        assert_eq!(cfg.max_pending_bytes, 32 * 1024 * 1024);
    }

    #[test]
    fn test_full_file_overrides_every_field() {
        let toml = r#"
            [relay]
            listen_addr = "10.0.0.1:7000"
            handshake_timeout_ms = 250
            max_pending_bytes = 1024
            outbound_queue_len = 8
        "#;

        let cfg = RelayFileConfig::parse(toml).unwrap().into_relay_config();

        assert_eq!(
            cfg,
            RelayConfig {
                listen_addr: "10.0.0.1:7000".parse().unwrap(),
                handshake_timeout: Duration::from_millis(250),
                max_pending_bytes: 1024,
                outbound_queue_len: 8,
            }
        );
    }

    #[test]
    fn test_invalid_address_is_parse_error() {
        let toml = r#"
            [relay]
            listen_addr = "not-an-address"
        "#;
        assert!(matches!(
            RelayFileConfig::parse(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_config_file(Path::new("/nonexistent/deskrelay/relay.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_file_schema_serializes_back_to_toml() {
        let text = toml::to_string(&RelayFileConfig::default()).unwrap();
        let reparsed = RelayFileConfig::parse(&text).unwrap();
        assert_eq!(reparsed, RelayFileConfig::default());
    }
}
