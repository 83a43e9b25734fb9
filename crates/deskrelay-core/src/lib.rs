//! # deskrelay-core
//!
//! Shared protocol library for deskrelay: the wire formats that connect a
//! browser viewer, the relay pairing server, and a remote desktop agent.
//!
//! It has zero dependencies on sockets, async runtimes, or OS APIs.  Every
//! function here is synchronous and operates on byte slices, which keeps the
//! framing logic testable without a network.
//!
//! # Architecture overview
//!
//! ```text
//! Browser ── JSON/WebSocket ── web bridge ── TCP ── relay ── TCP ── agent
//!                                  │                  │
//!                        codec + reassembler      handshake
//! ```
//!
//! - **`protocol::event`** – The input events a viewer produces (pointer,
//!   wheel, keyboard, control-state) and their fixed wire type codes.
//! - **`protocol::codec`** – Encodes input events into wire frames
//!   (`[type:1][len:4][payload]`) and classifies stream payloads coming back
//!   from the agent (resolution announcement vs. image blob).
//! - **`protocol::reassembler`** – Turns arbitrarily-chunked TCP reads into
//!   complete length-prefixed frames.
//! - **`protocol::handshake`** – Accumulates the `host` / `client` role
//!   token a relay connection opens with.

pub mod protocol;

pub use protocol::codec::{
    decode_stream_payload, decode_wire_frame, encode_input_event, CodecError, StreamFrame,
};
pub use protocol::event::{EventType, InputEvent, KeyAction};
pub use protocol::handshake::{Handshake, HandshakeError, HandshakeReader, Role};
pub use protocol::reassembler::{FrameError, FrameReassembler, DEFAULT_MAX_FRAME_LEN};
