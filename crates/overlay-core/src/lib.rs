//! # overlay-core
//!
//! Shared library for the input overlay relay containing the event model,
//! the category classifier, the press counters and the JSON wire codec.
//!
//! It has zero dependencies on OS APIs, async runtimes or network sockets.
//!
//! # Architecture overview
//!
//! The relay takes keyboard, mouse and device events from a single capture
//! source and fans them out to any number of WebSocket subscribers, each of
//! which only receives the categories it asked for.  This crate is the pure
//! foundation of that pipeline:
//!
//! - **`domain`** – What an event *is*: logical buttons, button and device
//!   events, category bit sets, the classifier, and the press counters that
//!   feed the `presses` field of every button message.
//!
//! - **`protocol`** – How events look on the wire: the outbound
//!   [`ServerMessage`] shapes and the strict decoder for inbound
//!   `listen` / `ping` control messages.
//!
//! - **`keymap`** – Helpers for capture layers that start from Windows
//!   virtual-key codes rather than logical buttons.

pub mod domain;
pub mod keymap;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `overlay_core::ButtonEvent` instead of `overlay_core::domain::event::ButtonEvent`.
pub use domain::buttons::{KeyboardButton, MouseButton, UnknownButton};
pub use domain::category::{
    classify_device, classify_event, classify_name, ClassifyError, EventCategory,
};
pub use domain::counters::PressCounters;
pub use domain::event::{
    ButtonEvent, Device, DeviceEvent, DeviceHandle, DeviceKind, InputEvent, RawKeyboard,
};
pub use protocol::codec::{decode_client_message, ProtocolError};
pub use protocol::messages::{ClientMessage, ServerMessage};
