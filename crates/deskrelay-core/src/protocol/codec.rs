//! Binary codecs for the two directions of the relay.
//!
//! Toward the agent (wire frame):
//! ```text
//! [type:1][payload_len:4][payload:N]
//! ```
//! The payload is ASCII decimal text, comma-separated per event type.
//!
//! From the agent (stream frame):
//! ```text
//! [payload_len:4][payload:N]
//! ```
//! The payload is either `RES:<width>,<height>` or an opaque image blob.
//! All multi-byte integers are big-endian.

use thiserror::Error;

use crate::protocol::event::{EventType, InputEvent, KeyAction};

/// Size of the wire frame header (type byte + length).
pub const WIRE_HEADER_SIZE: usize = 5;

/// Size of the stream frame length prefix.
pub const STREAM_HEADER_SIZE: usize = 4;

/// Marker that distinguishes a resolution announcement from an image blob.
pub const RESOLUTION_MARKER: &[u8] = b"RES:";

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    /// The event type tag is not part of the fixed enumeration.
    #[error("unsupported event type: {0:?}")]
    UnsupportedEventType(String),

    /// The type byte of a wire frame is not an assigned code.
    #[error("unknown wire type code: 0x{0:02X}")]
    UnknownTypeCode(u8),

    /// The byte slice is shorter than the frame it starts.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The payload does not fit in the 32-bit length field.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// A `RES:` payload did not contain two comma-separated integers.
    #[error("malformed resolution announcement: {0:?}")]
    MalformedResolution(String),

    /// A wire frame payload could not be parsed for its event type.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Wire frames (bridge → agent) ──────────────────────────────────────────────

/// Encodes an [`InputEvent`] into a complete wire frame.
///
/// # Errors
///
/// Returns [`CodecError::PayloadTooLarge`] if a keyboard token is longer
/// than the length field can describe.
///
/// # Examples
///
/// ```rust
/// use deskrelay_core::{encode_input_event, InputEvent};
///
/// let bytes = encode_input_event(&InputEvent::PointerMove { x: 120, y: 80 }).unwrap();
/// assert_eq!(bytes, [0x01, 0, 0, 0, 6, b'1', b'2', b'0', b',', b'8', b'0']);
/// ```
pub fn encode_input_event(event: &InputEvent) -> Result<Vec<u8>, CodecError> {
    let payload = encode_payload(event);
    let payload_len =
        u32::try_from(payload.len()).map_err(|_| CodecError::PayloadTooLarge(payload.len()))?;

    let mut buf = Vec::with_capacity(WIRE_HEADER_SIZE + payload.len());
    buf.push(event.event_type() as u8);
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(payload.as_bytes());
    Ok(buf)
}

/// Decodes one wire frame from the beginning of `bytes`.
///
/// Returns the event and the number of bytes consumed.  Keyboard frames
/// decode with [`KeyAction::Press`] since the action is not on the wire.
///
/// # Errors
///
/// Returns [`CodecError::InsufficientData`] while the frame is incomplete,
/// and [`CodecError::UnknownTypeCode`] or [`CodecError::MalformedPayload`]
/// for bytes that are not an encoded event.
pub fn decode_wire_frame(bytes: &[u8]) -> Result<(InputEvent, usize), CodecError> {
    if bytes.len() < WIRE_HEADER_SIZE {
        return Err(CodecError::InsufficientData {
            needed: WIRE_HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let type_byte = bytes[0];
    let event_type =
        EventType::try_from(type_byte).map_err(|_| CodecError::UnknownTypeCode(type_byte))?;

    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    let total = WIRE_HEADER_SIZE + payload_len;
    if bytes.len() < total {
        return Err(CodecError::InsufficientData {
            needed: total,
            available: bytes.len(),
        });
    }

    let payload = std::str::from_utf8(&bytes[WIRE_HEADER_SIZE..total])
        .map_err(|e| CodecError::MalformedPayload(format!("payload is not UTF-8: {e}")))?;
    let event = decode_payload(event_type, payload)?;
    Ok((event, total))
}

fn encode_payload(event: &InputEvent) -> String {
    match event {
        InputEvent::PointerMove { x, y } => format!("{x},{y}"),
        InputEvent::PointerDown { x, y, button } | InputEvent::PointerUp { x, y, button } => {
            format!("{x},{y},{button}")
        }
        InputEvent::Wheel { x, y, delta } => format!("{x},{y},{delta}"),
        InputEvent::Keyboard { key, .. } => key.clone(),
        InputEvent::ControlState { active } => (if *active { "1" } else { "0" }).to_string(),
    }
}

fn decode_payload(event_type: EventType, payload: &str) -> Result<InputEvent, CodecError> {
    match event_type {
        EventType::PointerMove => {
            let [x, y] = parse_fields::<2>(payload)?;
            Ok(InputEvent::PointerMove { x, y })
        }
        EventType::PointerDown | EventType::PointerUp => {
            let [x, y, button] = parse_fields::<3>(payload)?;
            let button = u8::try_from(button).map_err(|_| {
                CodecError::MalformedPayload(format!("button index out of range: {button}"))
            })?;
            if event_type == EventType::PointerDown {
                Ok(InputEvent::PointerDown { x, y, button })
            } else {
                Ok(InputEvent::PointerUp { x, y, button })
            }
        }
        EventType::Wheel => {
            let [x, y, delta] = parse_fields::<3>(payload)?;
            Ok(InputEvent::Wheel { x, y, delta })
        }
        EventType::Keyboard => Ok(InputEvent::Keyboard {
            key: payload.to_string(),
            action: KeyAction::Press,
        }),
        EventType::ControlState => match payload {
            "1" => Ok(InputEvent::ControlState { active: true }),
            "0" => Ok(InputEvent::ControlState { active: false }),
            other => Err(CodecError::MalformedPayload(format!(
                "control state must be \"1\" or \"0\", got {other:?}"
            ))),
        },
    }
}

/// Parses exactly `N` comma-separated signed integers.
fn parse_fields<const N: usize>(payload: &str) -> Result<[i32; N], CodecError> {
    let mut out = [0i32; N];
    let mut parts = payload.split(',');
    for slot in out.iter_mut() {
        let part = parts.next().ok_or_else(|| {
            CodecError::MalformedPayload(format!("expected {} fields in {payload:?}", N))
        })?;
        *slot = part.parse().map_err(|_| {
            CodecError::MalformedPayload(format!("invalid integer {part:?} in {payload:?}"))
        })?;
    }
    if parts.next().is_some() {
        return Err(CodecError::MalformedPayload(format!(
            "expected {} fields in {payload:?}",
            N
        )));
    }
    Ok(out)
}

// ── Stream frames (agent → bridge) ────────────────────────────────────────────

/// A complete stream payload after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// The agent announced its screen size.
    Resolution { width: u32, height: u32 },
    /// An opaque compressed image, forwarded to the viewer untouched.
    Binary(Vec<u8>),
}

/// Classifies one complete stream payload.
///
/// Takes the payload by value so image blobs pass through without a copy.
///
/// # Errors
///
/// Returns [`CodecError::MalformedResolution`] if the payload starts with
/// `RES:` but the remainder is not `<width>,<height>`.
pub fn decode_stream_payload(payload: Vec<u8>) -> Result<StreamFrame, CodecError> {
    if !payload.starts_with(RESOLUTION_MARKER) {
        return Ok(StreamFrame::Binary(payload));
    }
    let rest = &payload[RESOLUTION_MARKER.len()..];

    let text = std::str::from_utf8(rest)
        .map_err(|_| CodecError::MalformedResolution(String::from_utf8_lossy(rest).into_owned()))?;
    let malformed = || CodecError::MalformedResolution(text.to_string());

    let (width, height) = text.split_once(',').ok_or_else(malformed)?;
    let width = width.trim().parse().map_err(|_| malformed())?;
    let height = height.trim().parse().map_err(|_| malformed())?;
    Ok(StreamFrame::Resolution { width, height })
}

/// Builds the `RES:<width>,<height>` announcement payload.
pub fn encode_resolution(width: u32, height: u32) -> Vec<u8> {
    format!("RES:{width},{height}").into_bytes()
}

/// Prefixes `payload` with its 4-byte big-endian length.
///
/// # Errors
///
/// Returns [`CodecError::PayloadTooLarge`] if `payload` exceeds `u32::MAX`.
pub fn encode_stream_frame(payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    let len =
        u32::try_from(payload.len()).map_err(|_| CodecError::PayloadTooLarge(payload.len()))?;
    let mut buf = Vec::with_capacity(STREAM_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
