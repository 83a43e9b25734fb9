//! TCP accept loop and per-connection tasks.
//!
//! Each accepted socket goes through three stages:
//!
//! 1. **Handshake**: read until the `host` / `client` token is recognised,
//!    bounded by `handshake_timeout`.
//! 2. **Registration**: join [`RelayState`] under that role.  A writer task
//!    drains the connection's outbound queue into its socket.
//! 3. **Relaying**: every chunk read from the socket is handed to
//!    [`RelayState::forward`] until EOF, an error, or the kill switch.
//!    A forward that has to wait for buffer room pauses the reads.
//!
//! On exit the connection releases its slot, which closes the counterpart.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use deskrelay_core::{Handshake, HandshakeReader};

use crate::application::{ConnId, PeerHandle, RelayState};
use crate::domain::RelayConfig;

/// Size of each socket read.
const READ_CHUNK: usize = 4096;

/// How long a closing connection may spend draining its outbound queue.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.listen_addr` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind relay listener on {}", config.listen_addr))?;

    let state = Arc::new(RelayState::new(config.max_pending_bytes));
    serve(listener, state, config, running).await
}

/// Accepts connections on an already-bound `listener`.
///
/// The accept is polled with a short timeout so the `running` flag is
/// checked at least every 200 ms.
///
/// # Errors
///
/// Returns an error only if the listener's local address cannot be read.
pub async fn serve(
    listener: TcpListener,
    state: Arc<RelayState>,
    config: RelayConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let local_addr = listener
        .local_addr()
        .context("failed to read relay listener address")?;
    info!("relay listening on {local_addr}");

    let config = Arc::new(config);

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                let cfg = Arc::clone(&config);
                let st = Arc::clone(&state);
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, st, cfg).await;
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

// ── Per-connection handler ────────────────────────────────────────────────────

/// Runs one connection and logs how it ended.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<RelayState>,
    config: Arc<RelayConfig>,
) {
    let id = Uuid::new_v4();
    info!("conn {id}: accepted from {peer_addr}");
    match run_connection(stream, id, state, config).await {
        Ok(()) => info!("conn {id}: closed"),
        Err(e) => warn!("conn {id}: closed with error: {e:#}"),
    }
}

async fn run_connection(
    stream: TcpStream,
    id: ConnId,
    state: Arc<RelayState>,
    config: Arc<RelayConfig>,
) -> anyhow::Result<()> {
    // Relayed chunks are small and latency-sensitive.
    if let Err(e) = stream.set_nodelay(true) {
        debug!("conn {id}: could not set TCP_NODELAY: {e}");
    }
    let (mut read_half, write_half) = stream.into_split();

    // ── Stage 1: handshake ────────────────────────────────────────────────────
    let Handshake { role, leftover } =
        match timeout(config.handshake_timeout, read_handshake(&mut read_half)).await {
            Ok(result) => result.with_context(|| format!("conn {id}: handshake failed"))?,
            Err(_) => bail!(
                "conn {id}: no handshake within {:?}",
                config.handshake_timeout
            ),
        };
    info!("conn {id}: identified as {role}");

    // ── Stage 2: registration ─────────────────────────────────────────────────
    let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(config.outbound_queue_len.max(1));
    let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
    let handle = PeerHandle {
        id,
        outbound: outbound_tx,
        kill: kill_tx,
    };

    state
        .register(role, handle, leftover)
        .await
        .with_context(|| format!("conn {id}: rejected as {role}"))?;

    let mut writer = tokio::spawn(write_outbound(write_half, outbound_rx, id));
    let mut writer_done = false;

    // ── Stage 3: relaying ─────────────────────────────────────────────────────
    let mut read_buf = vec![0u8; READ_CHUNK];
    let outcome: anyhow::Result<()> = loop {
        tokio::select! {
            _ = &mut kill_rx => {
                debug!("conn {id}: counterpart closed");
                break Ok(());
            }
            _ = &mut writer => {
                writer_done = true;
                debug!("conn {id}: writer ended");
                break Ok(());
            }
            read = read_half.read(&mut read_buf) => match read {
                Ok(0) => {
                    debug!("conn {id}: peer closed (EOF)");
                    break Ok(());
                }
                // Waits while this side's pending buffer is full, which
                // pauses reading until a counterpart attaches.
                Ok(n) => state.forward(role, id, &read_buf[..n]).await,
                Err(e) => {
                    break Err(anyhow::Error::new(e).context(format!("conn {id}: read failed")));
                }
            },
        }
    };

    state.release(role, id).await;

    // Releasing dropped our slot's sender, so the writer finishes once the
    // queue is drained.
    if !writer_done && timeout(DRAIN_TIMEOUT, &mut writer).await.is_err() {
        debug!("conn {id}: drain timed out");
        writer.abort();
    }

    outcome
}

/// Reads from `read_half` until a role token is recognised.
async fn read_handshake(read_half: &mut OwnedReadHalf) -> anyhow::Result<Handshake> {
    let mut reader = HandshakeReader::new();
    let mut buf = [0u8; 64];
    loop {
        let n = read_half
            .read(&mut buf)
            .await
            .context("read during handshake failed")?;
        if n == 0 {
            bail!(
                "connection closed after {} handshake bytes",
                reader.buffered_len()
            );
        }
        if let Some(handshake) = reader.feed(&buf[..n])? {
            return Ok(handshake);
        }
    }
}

/// Writes queued chunks to the socket until every sender is dropped.
async fn write_outbound(
    mut write_half: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
    id: ConnId,
) {
    while let Some(chunk) = outbound_rx.recv().await {
        if let Err(e) = write_half.write_all(&chunk).await {
            debug!("conn {id}: write failed: {e}");
            return;
        }
    }
    if let Err(e) = write_half.shutdown().await {
        debug!("conn {id}: shutdown failed: {e}");
    }
}
