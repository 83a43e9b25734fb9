//! deskrelay-web-bridge library crate.
//!
//! Lets a web browser act as the viewer: browsers cannot open raw TCP
//! sockets, so the bridge terminates the WebSocket and speaks the relay's
//! binary framing on their behalf.
//!
//! # Architecture
//!
//! ```text
//! Browser (JSON + binary over WebSocket)
//!         ↕
//! [deskrelay-web-bridge]
//!   ├── domain/           JSON message enums, BridgeConfig
//!   ├── application/      JSON → wire frame, stream frame → browser message
//!   └── infrastructure/
//!         ├── ws_server/  WebSocket accept loop (tokio-tungstenite)
//!         └── relay_conn/ TCP connection to the relay (deskrelay-core framing)
//!         ↕
//! deskrelay-server (raw TCP)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `deskrelay-core`; its only seam
//!   to the outside world is the [`application::BrowserSink`] trait.
//! - `infrastructure` depends on everything plus `tokio` and `tungstenite`.

/// Domain layer: browser message types and configuration.
pub mod domain;

/// Application layer: translation and stream routing.
pub mod application;

/// Infrastructure layer: WebSocket server and relay TCP connection.
pub mod infrastructure;
