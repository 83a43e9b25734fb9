//! Input events produced by the viewer and carried toward the agent.
//!
//! Events are ephemeral: the bridge builds one from a browser message,
//! encodes it, and drops it.  The wire type codes are fixed by the agent.

use crate::protocol::codec::CodecError;

// ── Wire type codes ───────────────────────────────────────────────────────────

/// The type byte at the start of every wire frame.
///
/// Code `0x02` is unassigned; the agent never understood it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    PointerMove = 0x01,
    Keyboard = 0x03,
    PointerDown = 0x04,
    PointerUp = 0x05,
    Wheel = 0x06,
    ControlState = 0x07,
}

impl EventType {
    /// All encodable event types, in wire-code order.
    pub const ALL: [EventType; 6] = [
        EventType::PointerMove,
        EventType::Keyboard,
        EventType::PointerDown,
        EventType::PointerUp,
        EventType::Wheel,
        EventType::ControlState,
    ];

    /// The `type` tag the browser uses for this event.
    pub fn name(self) -> &'static str {
        match self {
            EventType::PointerMove => "mouse_move",
            EventType::Keyboard => "keyboard",
            EventType::PointerDown => "mouse_down",
            EventType::PointerUp => "mouse_up",
            EventType::Wheel => "mouse_wheel",
            EventType::ControlState => "control_state",
        }
    }

    /// Looks up an event type by its browser `type` tag.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedEventType`] for any tag outside the
    /// fixed enumeration, so no frame is ever built with an undefined code.
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        EventType::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| CodecError::UnsupportedEventType(name.to_string()))
    }
}

impl TryFrom<u8> for EventType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(EventType::PointerMove),
            0x03 => Ok(EventType::Keyboard),
            0x04 => Ok(EventType::PointerDown),
            0x05 => Ok(EventType::PointerUp),
            0x06 => Ok(EventType::Wheel),
            0x07 => Ok(EventType::ControlState),
            _ => Err(()),
        }
    }
}

// ── Keyboard action ───────────────────────────────────────────────────────────

/// Whether a keyboard event is a key press or a key release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAction {
    #[default]
    Press,
    Release,
}

// ── Input event ───────────────────────────────────────────────────────────────

/// One input event in host-screen coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Cursor moved to an absolute position.
    PointerMove { x: i32, y: i32 },
    /// Mouse button pressed.  `button` is 1=left, 2=right, 3=middle.
    PointerDown { x: i32, y: i32, button: u8 },
    /// Mouse button released.
    PointerUp { x: i32, y: i32, button: u8 },
    /// Wheel scrolled; positive `delta` scrolls away from the user.
    Wheel { x: i32, y: i32, delta: i32 },
    /// A key token such as `a`, `Enter`, or `<ctrl+c>`.
    ///
    /// The action is not carried on the wire; the agent taps the key.
    Keyboard { key: String, action: KeyAction },
    /// The viewer took (`true`) or released (`false`) control of the host.
    ControlState { active: bool },
}

impl InputEvent {
    /// Returns the wire type code for this event.
    pub fn event_type(&self) -> EventType {
        match self {
            InputEvent::PointerMove { .. } => EventType::PointerMove,
            InputEvent::PointerDown { .. } => EventType::PointerDown,
            InputEvent::PointerUp { .. } => EventType::PointerUp,
            InputEvent::Wheel { .. } => EventType::Wheel,
            InputEvent::Keyboard { .. } => EventType::Keyboard,
            InputEvent::ControlState { .. } => EventType::ControlState,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
