//! deskrelay-server library crate.
//!
//! The relay accepts raw TCP connections, classifies each one as the `host`
//! (desktop agent) or the `client` (viewer bridge) from its opening token,
//! and forwards bytes verbatim between the two once both are present.
//!
//! # Architecture
//!
//! ```text
//! agent ── TCP ──┐                         ┌── TCP ── web bridge
//!                ▼                         ▼
//!        [deskrelay-server]
//!          ├── domain/          RelayConfig, TOML file schema
//!          ├── application/     RelayState: the single host/client pair
//!          └── infrastructure/  accept loop, per-connection reader/writer tasks
//! ```
//!
//! The relay never parses frames.  It only needs the handshake token to know
//! which side a connection is on.

/// Domain layer: configuration types.
pub mod domain;

/// Application layer: pairing state and forwarding rules.
pub mod application;

/// Infrastructure layer: TCP listener and connection tasks.
pub mod infrastructure;
