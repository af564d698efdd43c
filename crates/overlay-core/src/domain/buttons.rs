//! Logical button identifiers.
//!
//! Every physical key or mouse button the capture layer can report is mapped
//! to one variant of [`KeyboardButton`] or [`MouseButton`] before it reaches
//! the relay.  The variant identifier doubles as the wire name: a press of the
//! "A" key is sent to subscribers as `"button":"A"`.
//!
//! # The `None` sentinel
//!
//! Both enums start with a `None` variant.  The capture layer uses it for keys
//! it could not map; the classifier rejects any event carrying it, so `None`
//! never appears on the wire.
//!
//! # Why a fixed, enumerable set?
//!
//! Press counters are pre-sized from [`KeyboardButton::COUNT`] and
//! [`MouseButton::COUNT`] at startup, so the hot broadcast path indexes a flat
//! array instead of hashing into a map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A button name that does not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown button name: {0}")]
pub struct UnknownButton(pub String);

/// Declares a closed button enum together with its name table.
///
/// Variants are numbered from zero in declaration order, which is what
/// [`index`](KeyboardButton::index) relies on.
macro_rules! button_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Number of variants, including the `None` sentinel.
            pub const COUNT: usize = Self::ALL.len();

            /// Wire name of this button.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            /// Dense zero-based index, suitable for array-backed tables.
            pub fn index(self) -> usize {
                self as usize
            }

            /// Returns `true` for the `None` sentinel.
            pub fn is_none(self) -> bool {
                self == $name::None
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownButton;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok($name::$variant),)+
                    other => Err(UnknownButton(other.to_string())),
                }
            }
        }
    };
}

button_enum! {
    /// Logical keyboard key.
    pub enum KeyboardButton {
        None,
        Esc,
        F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
        PrintScreen, ScrollLock, PauseBreak,
        Tilde,
        Num1, Num2, Num3, Num4, Num5, Num6, Num7, Num8, Num9, Num0,
        Minus, Equals, Backspace,
        Tab,
        Q, W, E, R, T, Y, U, I, O, P,
        OpenBracket, CloseBracket, Backslash,
        CapsLock,
        A, S, D, F, G, H, J, K, L,
        Semicolon, Quote, Enter,
        LeftShift,
        Z, X, C, V, B, N, M,
        Comma, Period, Slash,
        RightShift,
        LeftControl, LeftWindows, LeftAlt, Space, RightAlt, RightWindows, Application, RightControl,
        Insert, Home, PageUp, Delete, End, PageDown,
        UpArrow, LeftArrow, DownArrow, RightArrow,
        NumLock, NumpadDivide, NumpadMultiply, NumpadMinus, NumpadPlus, NumpadEnter, NumpadDot,
        Numpad0, Numpad1, Numpad2, Numpad3, Numpad4, Numpad5, Numpad6, Numpad7, Numpad8, Numpad9,
        Mute, VolumeDown, VolumeUp, Next, Previous, Stop, PlayPause,
    }
}

button_enum! {
    /// Logical mouse button, including the two wheel directions.
    pub enum MouseButton {
        None,
        Mouse1,
        Mouse2,
        Mouse3,
        Mouse4,
        Mouse5,
        MouseWheelUp,
        MouseWheelDown,
    }
}

impl MouseButton {
    /// Returns `true` for [`MouseButton::MouseWheelUp`] and [`MouseButton::MouseWheelDown`].
    ///
    /// Wheel "buttons" carry a tick count instead of a pressed flag.
    pub fn is_wheel(self) -> bool {
        matches!(self, MouseButton::MouseWheelUp | MouseButton::MouseWheelDown)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
