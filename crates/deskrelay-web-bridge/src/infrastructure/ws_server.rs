//! WebSocket server: accept loop and per-session task management.
//!
//! For every browser connection this module:
//!
//! 1. Completes the WebSocket upgrade.
//! 2. Opens a TCP connection to the relay (sending the `client` token unless
//!    running in direct mode).
//! 3. Runs two forwarding tasks:
//!    - **Browser → Relay**: JSON text frames become wire frames.
//!    - **Relay → Browser**: stream frames become JSON or binary messages.
//! 4. Ends the session when either task finishes: a browser close drops the
//!    relay connection, and a relay close sends a Close frame to the browser.
//!
//! Sessions share nothing, so each has its own reassembly buffer.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use deskrelay_core::FrameReassembler;

use crate::application::{browser_text_to_wire, BrowserSink};
use crate::domain::config::BridgeConfig;
use crate::infrastructure::relay_conn::{read_relay_stream, write_wire_frame, RelayConnection};

/// Upper bound on waiting for the browser to accept our Close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsWriter = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.ws_bind_addr` and serves browsers until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(config: BridgeConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.ws_bind_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind WebSocket listener on {}",
                config.ws_bind_addr
            )
        })?;
    serve(listener, config, running).await
}

/// Accepts browser connections on an already-bound `listener`.
///
/// # Errors
///
/// Returns an error only if the listener's local address cannot be read.
pub async fn serve(
    listener: TcpListener,
    config: BridgeConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let local_addr = listener
        .local_addr()
        .context("failed to read WebSocket listener address")?;
    info!(
        "WebSocket bridge listening on {local_addr}, relay at {}{}",
        config.relay_addr,
        if config.send_handshake { "" } else { " (direct mode)" }
    );

    let config = Arc::new(config);

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Poll with a timeout so the shutdown flag is seen even when idle.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                let cfg = Arc::clone(&config);
                tokio::spawn(async move {
                    handle_browser_session(stream, peer_addr, cfg).await;
                });
            }
            Ok(Err(e)) => {
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Browser sink ──────────────────────────────────────────────────────────────

/// [`BrowserSink`] over the write half of a browser WebSocket.
struct WebSocketSink {
    writer: Mutex<WsWriter>,
}

#[async_trait]
impl BrowserSink for WebSocketSink {
    async fn send_text(&self, text: String) -> Result<(), String> {
        let mut writer = self.writer.lock().await;
        writer
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| e.to_string())
    }

    async fn send_binary(&self, data: Vec<u8>) -> Result<(), String> {
        let mut writer = self.writer.lock().await;
        writer
            .send(WsMessage::Binary(data))
            .await
            .map_err(|e| e.to_string())
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_browser_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<BridgeConfig>,
) {
    let session_id = Uuid::new_v4().to_string();
    info!("session {session_id}: browser connected from {peer_addr}");
    match run_session(raw_stream, &session_id, config).await {
        Ok(()) => info!("session {session_id}: closed"),
        Err(e) => warn!("session {session_id}: closed with error: {e:#}"),
    }
}

async fn run_session(
    raw_stream: TcpStream,
    session_id: &str,
    config: Arc<BridgeConfig>,
) -> anyhow::Result<()> {
    // ── Step 1: WebSocket upgrade ─────────────────────────────────────────────
    let mut ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("session {session_id}: WebSocket handshake failed"))?;

    // ── Step 2: relay connection ──────────────────────────────────────────────
    let relay = match RelayConnection::connect(config.relay_addr, config.send_handshake).await {
        Ok(conn) => conn,
        Err(e) => {
            // Tell the browser instead of leaving it with a silent socket.
            let _ = timeout(CLOSE_TIMEOUT, ws_stream.close(None)).await;
            return Err(e.context(format!("session {session_id}: relay unavailable")));
        }
    };
    info!("session {session_id}: connected to relay at {}", config.relay_addr);

    let RelayConnection {
        read_half: relay_read,
        write_half: mut relay_write,
    } = relay;
    let (ws_tx, mut ws_rx) = ws_stream.split();
    let sink = Arc::new(WebSocketSink {
        writer: Mutex::new(ws_tx),
    });

    // ── Task A: Relay → Browser ───────────────────────────────────────────────
    let sink_r2b = Arc::clone(&sink);
    let session_r2b = session_id.to_string();
    let reassembler = FrameReassembler::new(config.max_frame_len);
    let mut relay_to_browser = tokio::spawn(async move {
        read_relay_stream(relay_read, &session_r2b, reassembler, sink_r2b.as_ref()).await;
    });

    // ── Task B: Browser → Relay ───────────────────────────────────────────────
    let session_b2r = session_id.to_string();
    let mut browser_to_relay = tokio::spawn(async move {
        loop {
            let ws_msg = match ws_rx.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                    debug!("session {session_b2r}: browser WebSocket closed");
                    break;
                }
                Some(Err(e)) => {
                    warn!("session {session_b2r}: browser WebSocket error: {e}");
                    break;
                }
                None => {
                    debug!("session {session_b2r}: browser stream ended");
                    break;
                }
            };

            match ws_msg {
                WsMessage::Text(text) => {
                    let bytes = match browser_text_to_wire(&text) {
                        Ok(bytes) => bytes,
                        Err(e) if e.is_recoverable() => {
                            // One bad message does not end the session.
                            warn!("session {session_b2r}: dropping browser message: {e}");
                            continue;
                        }
                        Err(e) => {
                            warn!("session {session_b2r}: cannot encode browser message: {e}");
                            break;
                        }
                    };
                    if let Err(e) = write_wire_frame(&mut relay_write, &bytes, &session_b2r).await
                    {
                        warn!("{e:#}");
                        break;
                    }
                }
                WsMessage::Binary(data) => {
                    warn!(
                        "session {session_b2r}: unexpected binary frame from browser ({} bytes, ignored)",
                        data.len()
                    );
                }
                WsMessage::Ping(data) => {
                    debug!("session {session_b2r}: WebSocket ping ({} bytes)", data.len());
                }
                WsMessage::Pong(_) => {
                    debug!("session {session_b2r}: WebSocket pong");
                }
                WsMessage::Close(_) => {
                    debug!("session {session_b2r}: WebSocket Close frame received");
                    break;
                }
                WsMessage::Frame(_) => {
                    debug!("session {session_b2r}: raw frame (ignored)");
                }
            }
        }
    });

    // ── Step 3: wait for either direction to finish ───────────────────────────
    tokio::select! {
        _ = &mut relay_to_browser => {
            debug!("session {session_id}: relay → browser task ended");
        }
        _ = &mut browser_to_relay => {
            debug!("session {session_id}: browser → relay task ended");
        }
    }

    // Dropping the tasks drops their relay socket halves.
    relay_to_browser.abort();
    browser_to_relay.abort();

    let mut writer = sink.writer.lock().await;
    if timeout(CLOSE_TIMEOUT, writer.close()).await.is_err() {
        debug!("session {session_id}: browser did not acknowledge close");
    }

    Ok(())
}
