//! deskrelay WebSocket bridge: entry point.
//!
//! Accepts WebSocket connections from a browser viewer and gives each one its
//! own TCP connection to the relay.  JSON input events from the browser go
//! out as compact wire frames; stream frames from the relay come back as a
//! JSON resolution message or raw binary image data.
//!
//! # Usage
//!
//! ```text
//! deskrelay-web-bridge [OPTIONS]
//!
//! Options:
//!   --ws-bind <IP>             WebSocket bind address [default: 0.0.0.0]
//!   --ws-port <PORT>           WebSocket listener port [default: 8080]
//!   --relay-host <HOST>        Relay hostname or IP [default: 127.0.0.1]
//!   --relay-port <PORT>        Relay TCP port [default: 5000]
//!   --no-handshake             Connect straight to an agent, no role token
//!   --max-frame-len <BYTES>    Largest accepted stream frame [default: 16777216]
//! ```
//!
//! | Variable                  | Flag              |
//! |---------------------------|-------------------|
//! | `DESKRELAY_WS_BIND`       | `--ws-bind`       |
//! | `DESKRELAY_WS_PORT`       | `--ws-port`       |
//! | `DESKRELAY_RELAY_HOST`    | `--relay-host`    |
//! | `DESKRELAY_RELAY_PORT`    | `--relay-port`    |
//! | `DESKRELAY_NO_HANDSHAKE`  | `--no-handshake`  |
//! | `DESKRELAY_MAX_FRAME_LEN` | `--max-frame-len` |
//!
//! ```text
//! Browser  (JSON / binary over WebSocket)
//!       ↕
//! deskrelay-web-bridge
//!   domain/          JSON message types, BridgeConfig
//!   application/     JSON ↔ wire frame translation, stream routing
//!   infrastructure/  WebSocket server, relay connection
//!       ↕
//! deskrelay-server  (length-prefixed frames over TCP)
//! ```

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use deskrelay_core::DEFAULT_MAX_FRAME_LEN;
use deskrelay_web_bridge::domain::BridgeConfig;
use deskrelay_web_bridge::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// deskrelay WebSocket bridge.
#[derive(Debug, Parser)]
#[command(
    name = "deskrelay-web-bridge",
    about = "Bridges a browser viewer's WebSocket to the deskrelay relay",
    version
)]
struct Cli {
    /// IP address to bind the WebSocket server to.
    #[arg(long, default_value = "0.0.0.0", env = "DESKRELAY_WS_BIND")]
    ws_bind: String,

    /// TCP port for the WebSocket server.
    #[arg(long, default_value_t = 8080, env = "DESKRELAY_WS_PORT")]
    ws_port: u16,

    /// Hostname or IP address of the relay.
    #[arg(long, default_value = "127.0.0.1", env = "DESKRELAY_RELAY_HOST")]
    relay_host: String,

    /// TCP port of the relay.
    #[arg(long, default_value_t = 5000, env = "DESKRELAY_RELAY_PORT")]
    relay_port: u16,

    /// Skip the `client` token and talk to an agent directly.
    #[arg(long, env = "DESKRELAY_NO_HANDSHAKE")]
    no_handshake: bool,

    /// Largest stream frame accepted from the relay, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN, env = "DESKRELAY_MAX_FRAME_LEN")]
    max_frame_len: u32,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--ws-bind` is not an IP address or `--relay-host`
    /// does not resolve.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let ws_ip: IpAddr = self
            .ws_bind
            .parse()
            .with_context(|| format!("invalid WebSocket bind address: '{}'", self.ws_bind))?;

        let relay_addr = (self.relay_host.as_str(), self.relay_port)
            .to_socket_addrs()
            .with_context(|| {
                format!(
                    "invalid relay address: '{}:{}'",
                    self.relay_host, self.relay_port
                )
            })?
            .next()
            .with_context(|| format!("relay host '{}' resolved to no address", self.relay_host))?;

        Ok(BridgeConfig {
            ws_bind_addr: SocketAddr::new(ws_ip, self.ws_port),
            relay_addr,
            send_handshake: !self.no_handshake,
            max_frame_len: self.max_frame_len,
        })
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

    let config = Cli::parse().into_bridge_config()?;

    info!(
        "deskrelay WebSocket bridge starting: ws={}, relay={}, handshake={}",
        config.ws_bind_addr, config.relay_addr, config.send_handshake
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    // The accept loop re-checks the flag every 200 ms.
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

    info!("deskrelay WebSocket bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
