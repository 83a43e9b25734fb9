//! Domain layer for deskrelay-server.
//!
//! Plain configuration types with no I/O beyond parsing a TOML string.

pub mod config;

pub use config::{load_config_file, ConfigError, RelayConfig, RelayFileConfig};
