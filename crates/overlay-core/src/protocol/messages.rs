//! Wire message types for the subscriber-facing JSON protocol.
//!
//! # Message flow
//!
//! ```text
//! Subscriber → Relay:  {"listen":"Keyboard"}        → ClientMessage::Listen
//!                      {"ping":12345}               → ClientMessage::Ping
//! Relay → Subscriber:  ServerMessage  →  {"type":"Keyboard",...}
//! ```
//!
//! Outbound messages use serde's internally tagged representation: the
//! `"type"` field carries the variant name and the remaining fields sit in the
//! same object.  Inbound messages are untagged single-property objects.
//! [`crate::protocol::codec`] deserializes them into a serde struct with
//! `deny_unknown_fields` and then checks that exactly one property is set, so
//! every deviation is rejected.

use serde::{Deserialize, Serialize};

use crate::domain::buttons::{KeyboardButton, MouseButton};
use crate::domain::category::EventCategory;
use crate::domain::event::RawKeyboard;

/// A decoded control message from a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    /// Add a category to the subscriber's mask.
    Listen(EventCategory),
    /// Echo of the most recent heartbeat nonce.
    Ping(i64),
}

/// Every message the relay sends to a subscriber.
///
/// # Serde representation
///
/// ```json
/// {"type":"Ping","ping":12345}
/// {"type":"Keyboard","button":"A","pressed":true,"presses":1,"raw":{"makecode":30,"flags":0,"vkey":65}}
/// {"type":"MouseButtons","button":"Mouse1","pressed":true,"presses":4}
/// {"type":"MouseButtons","button":"MouseWheelUp","count":3,"presses":0}
/// {"type":"Devices","hDevice":"0x0000000000010043","attached":true}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Heartbeat probe; the subscriber must answer `{"ping":<same value>}`.
    Ping { ping: i64 },

    /// A keyboard key transition.
    Keyboard {
        button: KeyboardButton,
        pressed: bool,
        presses: u32,
        raw: RawKeyboard,
    },

    /// A mouse click or wheel movement.
    ///
    /// Clicks carry `pressed`, wheel events carry `count`; never both.
    MouseButtons {
        button: MouseButton,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pressed: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<i32>,
        presses: u32,
    },

    /// A raw input device was attached or detached.
    Devices {
        #[serde(rename = "hDevice")]
        h_device: String,
        attached: bool,
    },
}

impl ServerMessage {
    /// The `"type"` discriminant, for log lines that must not dump field values.
    pub fn type_name(&self) -> &'static str {
        match self {
            ServerMessage::Ping { .. } => "Ping",
            ServerMessage::Keyboard { .. } => "Keyboard",
            ServerMessage::MouseButtons { .. } => "MouseButtons",
            ServerMessage::Devices { .. } => "Devices",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
