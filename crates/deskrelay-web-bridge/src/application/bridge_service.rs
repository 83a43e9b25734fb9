//! Protocol translation between the browser and the relay.
//!
//! ```text
//! Browser → Relay:  JSON text ─ parse_browser_message ─ translate_browser_to_event
//!                   ─ encode_input_event ─ wire frame bytes
//!
//! Relay → Browser:  TCP chunk ─ FrameReassembler ─ decode_stream_payload
//!                   ─ translate_stream_frame ─ BrowserSink
//! ```
//!
//! Everything here except [`route_stream_chunk`] is synchronous and pure.
//! The route function talks to the browser only through [`BrowserSink`].

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use deskrelay_core::{
    decode_stream_payload, encode_input_event, CodecError, EventType, FrameError,
    FrameReassembler, InputEvent, KeyAction, StreamFrame,
};

use crate::domain::messages::{BridgeToBrowserMsg, BrowserToBridgeMsg};

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors raised while translating or routing messages.
///
/// The first four concern a single browser message: log it, drop it, keep
/// the session.  The rest end the session.
#[derive(Debug, Error, PartialEq)]
pub enum BridgeError {
    /// The text frame is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The `type` tag is not one of the known event types.
    #[error("unsupported event type: {0:?}")]
    UnsupportedEventType(String),

    /// A field the event type requires is absent.
    #[error("missing field: {0}")]
    MissingField(String),

    /// A field is present but has the wrong type or range.
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// Encoding or stream classification failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The relay stream announced an oversized frame.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The browser side can no longer be written to.
    #[error("browser sink closed: {0}")]
    SinkClosed(String),
}

impl BridgeError {
    /// `true` if the error concerns one browser message only.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidJson(_)
                | BridgeError::UnsupportedEventType(_)
                | BridgeError::MissingField(_)
                | BridgeError::InvalidField { .. }
        )
    }
}

// ── Browser → Relay ───────────────────────────────────────────────────────────

/// Parses one browser text frame.
///
/// The `type` tag is checked against the fixed event enumeration before any
/// other field, so an unknown event is reported as such rather than as a
/// missing field.
///
/// # Errors
///
/// [`BridgeError::InvalidJson`], [`BridgeError::UnsupportedEventType`],
/// [`BridgeError::MissingField`], or [`BridgeError::InvalidField`].
pub fn parse_browser_message(text: &str) -> Result<BrowserToBridgeMsg, BridgeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| BridgeError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(BridgeError::InvalidJson("expected a JSON object".to_string()));
    }

    match value.get("type") {
        None => return Err(BridgeError::MissingField("type".to_string())),
        Some(Value::String(tag)) => {
            EventType::from_name(tag).map_err(|e| match e {
                CodecError::UnsupportedEventType(name) => BridgeError::UnsupportedEventType(name),
                other => BridgeError::Codec(other),
            })?;
        }
        Some(other) => {
            return Err(BridgeError::InvalidField(format!(
                "type: expected a string, got {other}"
            )))
        }
    }

    serde_json::from_value(value).map_err(field_error)
}

/// Maps a typed deserialization failure to a field-level error.
fn field_error(e: serde_json::Error) -> BridgeError {
    let msg = e.to_string();
    match msg
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
    {
        Some(field) => BridgeError::MissingField(field.to_string()),
        None => BridgeError::InvalidField(msg),
    }
}

/// Converts a parsed browser message into an [`InputEvent`].
///
/// # Errors
///
/// Returns [`BridgeError::InvalidField`] for a keyboard `action` other than
/// `down`, `up`, `press` or `release`.
pub fn translate_browser_to_event(msg: &BrowserToBridgeMsg) -> Result<InputEvent, BridgeError> {
    let event = match msg {
        BrowserToBridgeMsg::MouseMove { x, y } => InputEvent::PointerMove { x: *x, y: *y },
        BrowserToBridgeMsg::MouseDown { x, y, button } => InputEvent::PointerDown {
            x: *x,
            y: *y,
            button: *button,
        },
        BrowserToBridgeMsg::MouseUp { x, y, button } => InputEvent::PointerUp {
            x: *x,
            y: *y,
            button: *button,
        },
        BrowserToBridgeMsg::MouseWheel { x, y, delta } => InputEvent::Wheel {
            x: *x,
            y: *y,
            delta: *delta,
        },
        BrowserToBridgeMsg::Keyboard { key, action } => InputEvent::Keyboard {
            key: key.clone(),
            action: parse_key_action(action.as_deref())?,
        },
        BrowserToBridgeMsg::ControlState { state } => InputEvent::ControlState { active: *state },
    };
    Ok(event)
}

/// Parses, translates and encodes one browser text frame into wire bytes.
///
/// # Errors
///
/// Any error from [`parse_browser_message`], [`translate_browser_to_event`]
/// or [`encode_input_event`].
///
/// # Example
///
/// ```rust
/// use deskrelay_web_bridge::application::browser_text_to_wire;
///
/// let bytes = browser_text_to_wire(r#"{"type":"mouse_move","x":120,"y":80}"#).unwrap();
/// assert_eq!(bytes, b"\x01\x00\x00\x00\x06120,80");
/// ```
pub fn browser_text_to_wire(text: &str) -> Result<Vec<u8>, BridgeError> {
    let msg = parse_browser_message(text)?;
    let event = translate_browser_to_event(&msg)?;
    let bytes = encode_input_event(&event)?;
    debug!("browser → relay: {} ({} bytes)", msg.type_name(), bytes.len());
    Ok(bytes)
}

fn parse_key_action(action: Option<&str>) -> Result<KeyAction, BridgeError> {
    match action {
        None | Some("down") | Some("press") => Ok(KeyAction::Press),
        Some("up") | Some("release") => Ok(KeyAction::Release),
        Some(other) => Err(BridgeError::InvalidField(format!(
            "action: unknown key action {other:?}"
        ))),
    }
}

// ── Relay → Browser ───────────────────────────────────────────────────────────

/// What a classified stream frame becomes on the WebSocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserOutbound {
    /// A JSON text message.
    Text(String),
    /// An image payload, untouched.
    Binary(Vec<u8>),
}

/// Maps one stream frame to the WebSocket message the browser receives.
pub fn translate_stream_frame(frame: StreamFrame) -> BrowserOutbound {
    match frame {
        StreamFrame::Resolution { width, height } => {
            let msg = BridgeToBrowserMsg::Resolution { width, height };
            // A two-integer enum variant always serializes.
            BrowserOutbound::Text(serde_json::to_string(&msg).unwrap_or_default())
        }
        StreamFrame::Binary(data) => BrowserOutbound::Binary(data),
    }
}

/// Destination for messages bound to the browser.
///
/// The WebSocket session implements this over its sink; tests use a
/// recording implementation.
#[async_trait]
pub trait BrowserSink: Send + Sync {
    /// Sends a JSON text message.
    async fn send_text(&self, text: String) -> Result<(), String>;

    /// Sends a binary message.
    async fn send_binary(&self, data: Vec<u8>) -> Result<(), String>;
}

/// Feeds one relay chunk through `reassembler` and delivers every frame it
/// completes to `sink`, in order.
///
/// Returns the number of frames delivered.
///
/// # Errors
///
/// [`BridgeError::Frame`] for an oversized frame, [`BridgeError::Codec`] for
/// a malformed resolution announcement, and [`BridgeError::SinkClosed`] if
/// the browser is gone.  All of them end the session.
pub async fn route_stream_chunk(
    reassembler: &mut FrameReassembler,
    chunk: &[u8],
    sink: &dyn BrowserSink,
) -> Result<usize, BridgeError> {
    let payloads = reassembler.feed(chunk)?;
    let count = payloads.len();

    for payload in payloads {
        let frame = decode_stream_payload(payload)?;
        match translate_stream_frame(frame) {
            BrowserOutbound::Text(text) => {
                debug!("relay → browser: {text}");
                sink.send_text(text).await.map_err(BridgeError::SinkClosed)?;
            }
            BrowserOutbound::Binary(data) => {
                debug!("relay → browser: binary frame ({} bytes)", data.len());
                sink.send_binary(data).await.map_err(BridgeError::SinkClosed)?;
            }
        }
    }
    Ok(count)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
