//! Typed hardware-input events.
//!
//! These are the values the capture layer hands to the relay.  They carry no
//! behaviour of their own; classification, counting and encoding live in
//! [`crate::domain::category`], [`crate::domain::counters`] and
//! [`crate::protocol`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::buttons::{KeyboardButton, MouseButton};

/// Raw keyboard data exactly as the OS reported it.
///
/// Forwarded verbatim to subscribers in the `raw` object of a Keyboard message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawKeyboard {
    /// Hardware scan code.
    pub makecode: u16,
    /// Raw input flags (break / E0 / E1 bits).
    pub flags: u16,
    /// Windows virtual-key code.
    pub vkey: u16,
}

/// A button transition reported by the capture layer.
///
/// Exactly one logical button is populated per event.  Wheel events carry a
/// tick count and never a pressed flag; keyboard and click events carry a
/// pressed flag and never a tick count.  The enum shape makes the other
/// combinations unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonEvent {
    /// A keyboard key went down or up.
    Keyboard {
        button: KeyboardButton,
        raw: RawKeyboard,
        pressed: bool,
        /// `true` for an auto-repeat key-down while the key is held.
        held: bool,
    },
    /// A mouse button went down or up.
    MouseClick { button: MouseButton, pressed: bool },
    /// The mouse wheel moved by `count` ticks in the direction of `button`.
    MouseWheel { button: MouseButton, count: i32 },
}

impl ButtonEvent {
    /// Builds a keyboard event.
    pub fn key(button: KeyboardButton, raw: RawKeyboard, pressed: bool, held: bool) -> Self {
        ButtonEvent::Keyboard {
            button,
            raw,
            pressed,
            held,
        }
    }

    /// Builds a mouse click event.
    pub fn click(button: MouseButton, pressed: bool) -> Self {
        ButtonEvent::MouseClick { button, pressed }
    }

    /// Builds a mouse wheel event.
    pub fn wheel(button: MouseButton, count: i32) -> Self {
        ButtonEvent::MouseWheel { button, count }
    }

    /// Keyboard button of this event, or [`KeyboardButton::None`] for mouse events.
    pub fn keyboard_button(&self) -> KeyboardButton {
        match *self {
            ButtonEvent::Keyboard { button, .. } => button,
            _ => KeyboardButton::None,
        }
    }

    /// Mouse button of this event, or [`MouseButton::None`] for keyboard events.
    pub fn mouse_button(&self) -> MouseButton {
        match *self {
            ButtonEvent::MouseClick { button, .. } | ButtonEvent::MouseWheel { button, .. } => {
                button
            }
            ButtonEvent::Keyboard { .. } => MouseButton::None,
        }
    }
}

/// Opaque, stringified OS device handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHandle(String);

impl DeviceHandle {
    /// Wraps an already formatted handle string.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Formats a native pointer-sized handle as `0x` followed by 16 upper-case hex digits.
    pub fn from_raw(raw: u64) -> Self {
        Self(format!("0x{raw:016X}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of raw input device a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Keyboard,
    Mouse,
    Gamepad,
}

/// An attached raw input device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub handle: DeviceHandle,
    pub kind: DeviceKind,
}

/// A device was attached to or detached from the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub device: Device,
    pub attached: bool,
}

/// Anything the capture layer can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Button(ButtonEvent),
    Device(DeviceEvent),
}

impl From<ButtonEvent> for InputEvent {
    fn from(evt: ButtonEvent) -> Self {
        InputEvent::Button(evt)
    }
}

impl From<DeviceEvent> for InputEvent {
    fn from(evt: DeviceEvent) -> Self {
        InputEvent::Device(evt)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_event_has_no_mouse_button() {
        let evt = ButtonEvent::key(KeyboardButton::A, RawKeyboard::default(), true, false);
        assert_eq!(evt.keyboard_button(), KeyboardButton::A);
        assert_eq!(evt.mouse_button(), MouseButton::None);
    }

    #[test]
    fn test_mouse_events_have_no_keyboard_button() {
        let click = ButtonEvent::click(MouseButton::Mouse1, true);
        let wheel = ButtonEvent::wheel(MouseButton::MouseWheelDown, 2);
        assert_eq!(click.keyboard_button(), KeyboardButton::None);
        assert_eq!(click.mouse_button(), MouseButton::Mouse1);
        assert_eq!(wheel.keyboard_button(), KeyboardButton::None);
        assert_eq!(wheel.mouse_button(), MouseButton::MouseWheelDown);
    }

    #[test]
    fn test_device_handle_from_raw_is_zero_padded_hex() {
        assert_eq!(DeviceHandle::from_raw(0x1F4).as_str(), "0x00000000000001F4");
    }

    #[test]
    fn test_input_event_from_conversions() {
        let evt: InputEvent = ButtonEvent::click(MouseButton::Mouse2, false).into();
        assert!(matches!(evt, InputEvent::Button(ButtonEvent::MouseClick { .. })));

        let dev = DeviceEvent {
            device: Device {
                handle: DeviceHandle::new("0x1"),
                kind: DeviceKind::Gamepad,
            },
            attached: true,
        };
        let evt: InputEvent = dev.clone().into();
        assert_eq!(evt, InputEvent::Device(dev));
    }
}
