//! JSON codec for the subscriber protocol.
//!
//! Encoding turns domain events into the exact text a subscriber receives.
//! Decoding accepts exactly two inbound shapes, `{"listen":"<Category>"}` and
//! `{"ping":<integer>}`, and rejects everything else:
//!
//! - any property other than `listen` / `ping`
//! - both properties in one message, or neither
//! - a non-string `listen`, or a `ping` that is not an integer
//! - an unknown category name
//! - anything that is not a single JSON object (arrays, trailing values, ...)
//!
//! The codec holds no state: each call owns its buffers for the duration of
//! that call only.

use serde::Deserialize;
use thiserror::Error;

use crate::domain::category::{classify_name, ClassifyError};
use crate::domain::event::{ButtonEvent, DeviceEvent};
use crate::protocol::messages::{ClientMessage, ServerMessage};

/// Errors that can occur while encoding or decoding protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The text is not a single JSON object with only known, correctly typed
    /// properties.
    #[error("malformed client message: {0}")]
    Malformed(String),

    /// The message carried both `listen` and `ping`.
    #[error("client message carries both listen and ping")]
    Ambiguous,

    /// The message carried neither `listen` nor `ping`.
    #[error("client message carries neither listen nor ping")]
    Empty,

    /// The `listen` value named no known category.
    #[error(transparent)]
    Category(#[from] ClassifyError),

    /// Serialization of an outbound message failed.
    #[error("failed to encode {type_name} message: {reason}")]
    Encode {
        type_name: &'static str,
        reason: String,
    },
}

/// Shape of an inbound control message before validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClientMessage {
    listen: Option<String>,
    ping: Option<i64>,
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes one complete inbound text message.
///
/// # Errors
///
/// Returns a [`ProtocolError`] for every shape other than a lone `listen`
/// with a known category or a lone integer `ping`.
///
/// # Examples
///
/// ```rust
/// use overlay_core::protocol::{decode_client_message, ClientMessage};
/// use overlay_core::EventCategory;
///
/// let msg = decode_client_message(r#"{"listen":"Keyboard"}"#).unwrap();
/// assert_eq!(msg, ClientMessage::Listen(EventCategory::KEYBOARD));
/// assert!(decode_client_message(r#"{"listen":"Keyboard","ping":1}"#).is_err());
/// ```
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let raw: RawClientMessage =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    match (raw.listen, raw.ping) {
        (Some(name), None) => Ok(ClientMessage::Listen(classify_name(&name)?)),
        (None, Some(nonce)) => Ok(ClientMessage::Ping(nonce)),
        (Some(_), Some(_)) => Err(ProtocolError::Ambiguous),
        (None, None) => Err(ProtocolError::Empty),
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Serializes any [`ServerMessage`] to its wire text.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Encode {
        type_name: msg.type_name(),
        reason: e.to_string(),
    })
}

/// Builds the wire message for a classified button event.
///
/// `presses` is the value returned by
/// [`PressCounters::record_and_fetch`](crate::PressCounters::record_and_fetch)
/// for the same event.
pub fn button_message(evt: &ButtonEvent, presses: u32) -> ServerMessage {
    match *evt {
        ButtonEvent::Keyboard {
            button,
            raw,
            pressed,
            ..
        } => ServerMessage::Keyboard {
            button,
            pressed,
            presses,
            raw,
        },
        ButtonEvent::MouseClick { button, pressed } => ServerMessage::MouseButtons {
            button,
            pressed: Some(pressed),
            count: None,
            presses,
        },
        ButtonEvent::MouseWheel { button, count } => ServerMessage::MouseButtons {
            button,
            pressed: None,
            count: Some(count),
            presses,
        },
    }
}

/// Builds the wire message for a device attach/detach event.
pub fn device_message(evt: &DeviceEvent) -> ServerMessage {
    ServerMessage::Devices {
        h_device: evt.device.handle.as_str().to_string(),
        attached: evt.attached,
    }
}

/// Encodes a button event in one step.
pub fn encode_button_event(evt: &ButtonEvent, presses: u32) -> Result<String, ProtocolError> {
    encode_server_message(&button_message(evt, presses))
}

/// Encodes a device event in one step.
pub fn encode_device_event(evt: &DeviceEvent) -> Result<String, ProtocolError> {
    encode_server_message(&device_message(evt))
}

/// Encodes a heartbeat probe carrying `nonce`.
pub fn encode_ping(nonce: i64) -> Result<String, ProtocolError> {
    encode_server_message(&ServerMessage::Ping { ping: nonce })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
