//! The relay's single host/client pair.
//!
//! At most one host and one client are registered at a time.  Each side is
//! represented by a [`PeerHandle`]: a sender into that connection's writer
//! task and a kill switch the other side can fire.
//!
//! # Ordering
//!
//! Bytes a connection sends before its counterpart exists are kept in that
//! connection's pending buffer.  When the counterpart registers, the pending
//! bytes are queued to it inside the same critical section that makes it
//! visible, so later forwards can never overtake them.
//!
//! # Back-pressure
//!
//! The pending buffer is bounded by `max_pending_bytes`.  A forward that
//! would exceed it waits until the pair changes instead of failing, so the
//! connection's reader stops and TCP flow control stalls the sender.
//!
//! # Teardown
//!
//! When either side releases, its counterpart is removed too and its kill
//! switch fires.  The state is then empty and accepts a fresh pair.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tracing::{debug, info};
use uuid::Uuid;

use deskrelay_core::Role;

/// Identifier of one accepted connection.
pub type ConnId = Uuid;

/// Errors raised by the pairing rules.
///
/// Every variant means the offending connection must be closed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// A second connection claimed a role that is already taken.
    #[error("{0} role is already occupied")]
    RoleOccupied(Role),
}

/// A registered connection as seen by its counterpart.
#[derive(Debug)]
pub struct PeerHandle {
    pub id: ConnId,
    /// Chunks queued here are written to this connection's socket in order.
    pub outbound: mpsc::Sender<Vec<u8>>,
    /// Firing this closes the connection.
    pub kill: oneshot::Sender<()>,
}

#[derive(Debug)]
struct Slot {
    handle: PeerHandle,
    /// Bytes received from this connection while it had no counterpart.
    pending: Vec<u8>,
}

#[derive(Debug, Default)]
struct Pair {
    host: Option<Slot>,
    client: Option<Slot>,
}

impl Pair {
    /// Returns `(own, counterpart)` slots for `role`.
    fn split_mut(&mut self, role: Role) -> (&mut Option<Slot>, &mut Option<Slot>) {
        match role {
            Role::Host => (&mut self.host, &mut self.client),
            Role::Client => (&mut self.client, &mut self.host),
        }
    }
}

/// Point-in-time view of the pair, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairSnapshot {
    pub host: Option<ConnId>,
    pub client: Option<ConnId>,
    pub host_pending: usize,
    pub client_pending: usize,
}

impl PairSnapshot {
    /// `true` when both sides are registered.
    pub fn is_paired(&self) -> bool {
        self.host.is_some() && self.client.is_some()
    }
}

/// Shared pairing state, passed to every connection task.
#[derive(Debug)]
pub struct RelayState {
    pair: Mutex<Pair>,
    /// Fired whenever a slot is filled or emptied.
    changed: Notify,
    max_pending_bytes: usize,
}

impl RelayState {
    pub fn new(max_pending_bytes: usize) -> Self {
        Self {
            pair: Mutex::new(Pair::default()),
            changed: Notify::new(),
            max_pending_bytes,
        }
    }

    /// Registers a classified connection under `role`.
    ///
    /// `leftover` is whatever followed the handshake token in the same read.
    /// If the counterpart is already present, its pending bytes are queued
    /// to the new connection and `leftover` is queued to the counterpart.
    /// Otherwise `leftover` starts the new connection's pending buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::RoleOccupied`] if `role` is taken; the existing
    /// connection is left untouched.
    pub async fn register(
        &self,
        role: Role,
        handle: PeerHandle,
        leftover: Vec<u8>,
    ) -> Result<(), RelayError> {
        let mut pair = self.pair.lock().await;
        let (own, counterpart) = pair.split_mut(role);

        if own.is_some() {
            return Err(RelayError::RoleOccupied(role));
        }

        let pending = match counterpart {
            Some(peer) => {
                // Both queues are empty at this point: the new connection's
                // channel is fresh and a waiting peer never had a counterpart.
                let buffered = std::mem::take(&mut peer.pending);
                if !buffered.is_empty() {
                    debug!(
                        "conn {}: flushing {} pending bytes from {} conn {}",
                        handle.id,
                        buffered.len(),
                        role.counterpart(),
                        peer.handle.id
                    );
                    queue(&handle.outbound, buffered);
                }
                if !leftover.is_empty() {
                    queue(&peer.handle.outbound, leftover);
                }
                info!(
                    "paired {role} conn {} with {} conn {}",
                    handle.id,
                    role.counterpart(),
                    peer.handle.id
                );
                Vec::new()
            }
            None => {
                // The leftover is bounded by the handshake read size.
                info!("{role} conn {} waiting for {}", handle.id, role.counterpart());
                leftover
            }
        };

        *own = Some(Slot { handle, pending });
        self.changed.notify_waiters();
        Ok(())
    }

    /// Delivers `bytes` received from connection `id` acting as `role`.
    ///
    /// With a counterpart present the bytes are queued to it; the send
    /// happens outside the lock so a slow reader only back-pressures its
    /// own sender.  Without one they are appended to the pending buffer.
    /// If that would take the buffer past `max_pending_bytes`, this waits
    /// until a counterpart registers (or `id` is released) and tries again.
    /// Bytes from a connection that is no longer registered are dropped.
    pub async fn forward(&self, role: Role, id: ConnId, bytes: &[u8]) {
        loop {
            // Created before the check so a registration after it still wakes us.
            let changed = self.changed.notified();

            let target = {
                let mut pair = self.pair.lock().await;
                let (own, counterpart) = pair.split_mut(role);

                let Some(own) = own.as_mut().filter(|slot| slot.handle.id == id) else {
                    debug!("conn {id}: dropping {} bytes after release", bytes.len());
                    return;
                };

                match counterpart {
                    Some(peer) => Some(peer.handle.outbound.clone()),
                    None if own.pending.is_empty()
                        || own.pending.len() + bytes.len() <= self.max_pending_bytes =>
                    {
                        own.pending.extend_from_slice(bytes);
                        return;
                    }
                    None => {
                        debug!(
                            "conn {id}: pending buffer full ({} bytes); pausing reads",
                            own.pending.len()
                        );
                        None
                    }
                }
            };

            match target {
                Some(target) => {
                    if target.send(bytes.to_vec()).await.is_err() {
                        debug!(
                            "conn {id}: counterpart writer closed; dropping {} bytes",
                            bytes.len()
                        );
                    }
                    return;
                }
                None => changed.await,
            }
        }
    }

    /// Removes connection `id` from `role` and closes its counterpart.
    ///
    /// Returns `false` if `id` was no longer registered, which happens when
    /// the counterpart released first.
    pub async fn release(&self, role: Role, id: ConnId) -> bool {
        let mut pair = self.pair.lock().await;
        let (own, counterpart) = pair.split_mut(role);

        if !own.as_ref().is_some_and(|slot| slot.handle.id == id) {
            return false;
        }
        *own = None;
        self.changed.notify_waiters();

        if let Some(peer) = counterpart.take() {
            info!(
                "{role} conn {id} left; closing {} conn {}",
                role.counterpart(),
                peer.handle.id
            );
            // The peer task may already be gone.
            let _ = peer.handle.kill.send(());
        } else {
            info!("{role} conn {id} left");
        }
        true
    }

    /// Returns who is registered and how much each side has buffered.
    pub async fn snapshot(&self) -> PairSnapshot {
        let pair = self.pair.lock().await;
        PairSnapshot {
            host: pair.host.as_ref().map(|s| s.handle.id),
            client: pair.client.as_ref().map(|s| s.handle.id),
            host_pending: pair.host.as_ref().map_or(0, |s| s.pending.len()),
            client_pending: pair.client.as_ref().map_or(0, |s| s.pending.len()),
        }
    }
}

/// Queues `bytes` on a channel known to have room.
fn queue(outbound: &mpsc::Sender<Vec<u8>>, bytes: Vec<u8>) {
    if let Err(e) = outbound.try_send(bytes) {
        debug!("outbound queue unavailable during pairing: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
