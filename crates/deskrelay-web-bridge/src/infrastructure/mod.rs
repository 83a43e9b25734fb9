//! Infrastructure layer for deskrelay-web-bridge.
//!
//! Accepts browser WebSocket connections, opens one relay TCP connection per
//! browser, and runs the two forwarding tasks of each session.

pub mod relay_conn;
pub mod ws_server;

pub use ws_server::{run_server, serve};
