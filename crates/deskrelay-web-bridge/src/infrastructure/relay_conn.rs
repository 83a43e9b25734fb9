//! TCP connection to the relay.
//!
//! Each browser session gets its own connection.  The bridge opens it with
//! the `client` token so the relay pairs it with the agent, then writes wire
//! frames and reads length-prefixed stream frames.
//!
//! TCP gives no message boundaries: one `read()` may return part of a frame
//! or several frames.  [`read_relay_stream`] hands every chunk to a
//! per-session [`FrameReassembler`] through
//! [`crate::application::route_stream_chunk`].

use std::net::SocketAddr;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use deskrelay_core::protocol::handshake::CLIENT_TOKEN;
use deskrelay_core::FrameReassembler;

use crate::application::{route_stream_chunk, BrowserSink};

/// An open connection to the relay, split into halves.
pub struct RelayConnection {
    pub read_half: OwnedReadHalf,
    pub write_half: OwnedWriteHalf,
}

impl RelayConnection {
    /// Connects to `relay_addr` and, if `send_handshake` is set, writes the
    /// `client` token.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the token
    /// cannot be written.
    pub async fn connect(relay_addr: SocketAddr, send_handshake: bool) -> anyhow::Result<Self> {
        let mut stream = TcpStream::connect(relay_addr)
            .await
            .with_context(|| format!("failed to connect to relay at {relay_addr}"))?;

        // Input events are tiny; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY on relay connection: {e}");
        }

        if send_handshake {
            stream
                .write_all(CLIENT_TOKEN)
                .await
                .context("failed to send client handshake to relay")?;
        }

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            read_half,
            write_half,
        })
    }
}

/// Reads the relay stream and routes every completed frame to `sink`.
///
/// Returns when the relay closes the connection, a read fails, the stream is
/// malformed, or the browser side is gone.
pub async fn read_relay_stream(
    mut read_half: OwnedReadHalf,
    session_id: &str,
    mut reassembler: FrameReassembler,
    sink: &dyn BrowserSink,
) {
    let mut read_tmp = vec![0u8; 4096];

    loop {
        let n = match read_half.read(&mut read_tmp).await {
            Ok(0) => {
                debug!("session {session_id}: relay connection closed (EOF)");
                if !reassembler.is_idle() {
                    match reassembler.pending_frame_len() {
                        Some(len) => debug!(
                            "session {session_id}: truncated frame discarded ({} of {len} payload bytes)",
                            reassembler.buffered_len()
                        ),
                        None => debug!(
                            "session {session_id}: partial frame header discarded ({} bytes)",
                            reassembler.buffered_len()
                        ),
                    }
                }
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("session {session_id}: read from relay failed: {e}");
                break;
            }
        };

        if let Err(e) = route_stream_chunk(&mut reassembler, &read_tmp[..n], sink).await {
            warn!("session {session_id}: relay stream error: {e}");
            break;
        }
    }
}

/// Writes one encoded wire frame to the relay.
///
/// # Errors
///
/// Returns an error if the write fails (e.g., the relay closed the connection).
pub async fn write_wire_frame(
    write_half: &mut OwnedWriteHalf,
    bytes: &[u8],
    session_id: &str,
) -> anyhow::Result<()> {
    write_half
        .write_all(bytes)
        .await
        .with_context(|| format!("session {session_id}: write to relay failed"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
