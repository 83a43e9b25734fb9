//! JSON message types for the browser-facing WebSocket protocol.
//!
//! ```text
//! Browser → Bridge:  JSON text frame   →  BrowserToBridgeMsg
//! Bridge  → Browser: BridgeToBrowserMsg →  JSON text frame
//!                    image payload      →  binary frame (no JSON)
//! ```
//!
//! Every JSON message is an object with a snake_case `"type"` field naming
//! the variant; the remaining fields sit alongside it:
//!
//! ```json
//! {"type":"mouse_move","x":120,"y":80}
//! {"type":"keyboard","key":"<ctrl+c>","action":"down"}
//! {"type":"resolution","width":1920,"height":1080}
//! ```

use serde::{Deserialize, Serialize};

// ── Browser → Bridge messages ─────────────────────────────────────────────────

/// Input messages a browser sends to the bridge.
///
/// Coordinates are already scaled to host-screen pixels by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowserToBridgeMsg {
    MouseMove {
        x: i32,
        y: i32,
    },
    /// `button` is forwarded unchanged; the agent reads 1 as left, 2 as
    /// right and 3 as middle.
    MouseDown {
        x: i32,
        y: i32,
        button: u8,
    },
    MouseUp {
        x: i32,
        y: i32,
        button: u8,
    },
    /// `delta` is ±120 per notch; positive scrolls up.
    MouseWheel {
        x: i32,
        y: i32,
        delta: i32,
    },
    Keyboard {
        /// A single character, a named key (`Enter`), or a chord such as
        /// `<ctrl+shift+t>`.
        key: String,
        /// `"down"` / `"up"`, or the aliases `"press"` / `"release"`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
    /// The viewer took (`true`) or gave back (`false`) control.
    ControlState {
        state: bool,
    },
}

impl BrowserToBridgeMsg {
    /// Returns the `type` tag, for log lines that must not echo key text.
    pub fn type_name(&self) -> &'static str {
        match self {
            BrowserToBridgeMsg::MouseMove { .. } => "mouse_move",
            BrowserToBridgeMsg::MouseDown { .. } => "mouse_down",
            BrowserToBridgeMsg::MouseUp { .. } => "mouse_up",
            BrowserToBridgeMsg::MouseWheel { .. } => "mouse_wheel",
            BrowserToBridgeMsg::Keyboard { .. } => "keyboard",
            BrowserToBridgeMsg::ControlState { .. } => "control_state",
        }
    }
}

// ── Bridge → Browser messages ─────────────────────────────────────────────────

/// JSON messages the bridge sends to the browser.
///
/// Image frames are not listed here: they go out as binary WebSocket
/// messages exactly as the agent produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeToBrowserMsg {
    /// The agent's screen size, sent before the first image.
    Resolution { width: u32, height: u32 },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
