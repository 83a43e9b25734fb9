//! Bridge configuration types.
//!
//! [`BridgeConfig`] is built once in `main.rs` from CLI arguments and shared
//! by every session behind an `Arc`.

use std::net::SocketAddr;

use deskrelay_core::DEFAULT_MAX_FRAME_LEN;

/// All runtime configuration for the WebSocket bridge.
///
/// # Example
///
/// ```rust
/// use deskrelay_web_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.ws_bind_addr.port(), 8080);
/// assert_eq!(cfg.relay_addr.port(), 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Address the WebSocket server binds to.
    pub ws_bind_addr: SocketAddr,

    /// TCP address of the relay (or of an agent, in direct mode).
    pub relay_addr: SocketAddr,

    /// Whether to open each relay connection with the `client` token.
    ///
    /// Disabled in direct mode, where the agent speaks the same framing but
    /// knows nothing about relay roles.
    pub send_handshake: bool,

    /// Largest stream frame accepted from the relay, in bytes.
    pub max_frame_len: u32,
}

impl Default for BridgeConfig {
    /// | Field          | Default          |
    /// |----------------|------------------|
    /// | ws_bind_addr   | `0.0.0.0:8080`   |
    /// | relay_addr     | `127.0.0.1:5000` |
    /// | send_handshake | `true`           |
    /// | max_frame_len  | 16 MiB           |
    fn default() -> Self {
        Self {
            // Compile-time-known valid socket address strings.
            ws_bind_addr: "0.0.0.0:8080".parse().unwrap(),
            relay_addr: "127.0.0.1:5000".parse().unwrap(),
            send_handshake: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ws_port_is_8080() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.ws_bind_addr.port(), 8080);
    }

    #[test]
    fn test_default_relay_is_local_port_5000() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.relay_addr.to_string(), "127.0.0.1:5000");
    }

    #[test]
    fn test_default_sends_handshake() {
        assert!(BridgeConfig::default().send_handshake);
    }

    #[test]
    fn test_default_frame_limit_matches_core() {
        assert_eq!(BridgeConfig::default().max_frame_len, DEFAULT_MAX_FRAME_LEN);
    }
}
