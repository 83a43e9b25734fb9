//! Application layer for deskrelay-server.
//!
//! Owns the pairing rules: who may register, where bytes go, and what happens
//! when one side of the pair leaves.  It knows nothing about sockets; each
//! connection is represented by a channel to its writer task and a kill
//! switch.

pub mod relay_state;

pub use relay_state::{ConnId, PairSnapshot, PeerHandle, RelayError, RelayState};
