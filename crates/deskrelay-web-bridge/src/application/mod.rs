//! Application layer for deskrelay-web-bridge.
//!
//! Knows *what* to do with each message in either direction and leaves the
//! socket work to the infrastructure layer.
//!
//! - Browser → relay: JSON text → [`deskrelay_core::InputEvent`] → wire frame
//! - Relay → browser: stream bytes → reassembled frame → JSON or binary

pub mod bridge_service;

pub use bridge_service::{
    browser_text_to_wire, parse_browser_message, route_stream_chunk, translate_browser_to_event,
    translate_stream_frame, BridgeError, BrowserOutbound, BrowserSink,
};
