//! Infrastructure layer for deskrelay-server.
//!
//! Binds the TCP listener, runs the handshake on each accepted socket, and
//! drives the reader and writer halves of every connection.

pub mod relay_server;

pub use relay_server::{run_server, serve};
