//! Domain layer for deskrelay-web-bridge.
//!
//! Pure types with no dependency on sockets or async runtimes: the JSON
//! vocabulary spoken with the browser and the bridge configuration.

pub mod config;
pub mod messages;

pub use config::BridgeConfig;
pub use messages::{BridgeToBrowserMsg, BrowserToBridgeMsg};
