//! Protocol module containing the event model, codecs, and stream framing.

pub mod codec;
pub mod event;
pub mod handshake;
pub mod reassembler;

pub use codec::{decode_stream_payload, decode_wire_frame, encode_input_event, CodecError};
pub use event::*;
pub use reassembler::FrameReassembler;
