//! Event categories and the category classifier.
//!
//! A category is one bit in an [`EventCategory`] set.  Subscribers ask for
//! categories by name (`{"listen":"Keyboard"}`), the relay keeps the union of
//! everything a subscriber asked for, and every outgoing event is tagged with
//! exactly one category so the broadcaster can filter recipients with a single
//! bitwise test.
//!
//! This module is the only place where textual category names are parsed.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use thiserror::Error;

use super::buttons::MouseButton;
use super::event::{ButtonEvent, DeviceEvent};

/// Errors raised while mapping an event or a name to a category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// The event does not populate any logical button, or mixes a wheel
    /// button with a click (or vice versa).
    #[error("event has no classifiable button: {0:?}")]
    UnclassifiableEvent(ButtonEvent),

    /// A subscriber asked for a category name that does not exist.
    #[error("unknown event category: {0}")]
    UnknownCategory(String),
}

/// Bit set of event categories.
///
/// A subscriber's mask only ever grows: [`EventCategory::union`] is the only
/// combining operation offered, there is no removal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventCategory(u32);

impl EventCategory {
    pub const NONE: EventCategory = EventCategory(0);
    pub const KEYBOARD: EventCategory = EventCategory(0x0001);
    pub const MOUSE_BUTTONS: EventCategory = EventCategory(0x0002);
    /// Raw relative mouse data from the driver.
    pub const RAW_MOUSE_MOVEMENT: EventCategory = EventCategory(0x0004);
    /// Reserved; accepted as a subscription but never produced.
    pub const MOUSE_MOVEMENT: EventCategory = EventCategory(0x0008);
    pub const DEVICES: EventCategory = EventCategory(0x0010);
    pub const GAMEPAD_BUTTONS: EventCategory = EventCategory(0x0020);
    pub const GAMEPAD_AXES: EventCategory = EventCategory(0x0040);

    /// Every single-bit category with its wire name.
    pub const NAMED: [(&'static str, EventCategory); 7] = [
        ("Keyboard", Self::KEYBOARD),
        ("MouseButtons", Self::MOUSE_BUTTONS),
        ("RawMouseMovement", Self::RAW_MOUSE_MOVEMENT),
        ("MouseMovement", Self::MOUSE_MOVEMENT),
        ("Devices", Self::DEVICES),
        ("GamepadButtons", Self::GAMEPAD_BUTTONS),
        ("GamepadAxes", Self::GAMEPAD_AXES),
    ];

    /// Reconstructs a set from raw bits, dropping bits that name no category.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        EventCategory(bits & 0x007F)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every bit of `other` is also set in `self`.
    pub const fn contains(self, other: EventCategory) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: EventCategory) -> Self {
        EventCategory(self.0 | other.0)
    }

    /// Wire name of a single-bit category; `None` for empty or multi-bit sets.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(_, c)| *c == self)
            .map(|(name, _)| *name)
    }
}

impl BitOr for EventCategory {
    type Output = EventCategory;

    fn bitor(self, rhs: EventCategory) -> EventCategory {
        self.union(rhs)
    }
}

impl BitOrAssign for EventCategory {
    fn bitor_assign(&mut self, rhs: EventCategory) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("EventCategory(NONE)");
        }
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(_, c)| self.contains(*c))
            .map(|(name, _)| *name)
            .collect();
        write!(f, "EventCategory({})", names.join(" | "))
    }
}

/// Maps a button event to its category.
///
/// # Errors
///
/// Returns [`ClassifyError::UnclassifiableEvent`] when the event carries the
/// `None` sentinel, or when a wheel/click variant carries the wrong kind of
/// mouse button.  Well-formed capture output never triggers this.
pub fn classify_event(evt: &ButtonEvent) -> Result<EventCategory, ClassifyError> {
    let category = match *evt {
        ButtonEvent::Keyboard { button, .. } if !button.is_none() => EventCategory::KEYBOARD,
        ButtonEvent::MouseClick { button, .. } if is_click_button(button) => {
            EventCategory::MOUSE_BUTTONS
        }
        ButtonEvent::MouseWheel { button, .. } if button.is_wheel() => {
            EventCategory::MOUSE_BUTTONS
        }
        _ => return Err(ClassifyError::UnclassifiableEvent(*evt)),
    };
    Ok(category)
}

/// Device attach/detach events always belong to [`EventCategory::DEVICES`].
pub fn classify_device(_evt: &DeviceEvent) -> EventCategory {
    EventCategory::DEVICES
}

/// Maps a wire-level category name to its flag.
///
/// # Errors
///
/// Returns [`ClassifyError::UnknownCategory`] for any name outside
/// [`EventCategory::NAMED`].  Matching is case-sensitive.
pub fn classify_name(name: &str) -> Result<EventCategory, ClassifyError> {
    EventCategory::NAMED
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, c)| *c)
        .ok_or_else(|| ClassifyError::UnknownCategory(name.to_string()))
}

fn is_click_button(button: MouseButton) -> bool {
    !button.is_none() && !button.is_wheel()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
