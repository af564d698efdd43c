//! Per-button press counters.
//!
//! Every outgoing Keyboard and MouseButtons message carries a `presses` field:
//! how many times that button has been freshly pressed since the process
//! started.  The counters are owned by the broadcaster and mutated only on its
//! single thread of control, so plain `&mut self` access is enough.

use tracing::trace;

use super::buttons::{KeyboardButton, MouseButton};
use super::category::{ClassifyError, EventCategory};
use super::event::ButtonEvent;

/// Monotonic press counts for every known keyboard and mouse button.
///
/// Both tables are sized from the button enums at construction and never
/// reallocate.  Counters are never reset.
#[derive(Debug, Clone)]
pub struct PressCounters {
    keyboard: [u32; KeyboardButton::COUNT],
    mouse: [u32; MouseButton::COUNT],
}

impl PressCounters {
    /// Creates counters with every known button at zero.
    pub fn new() -> Self {
        Self {
            keyboard: [0; KeyboardButton::COUNT],
            mouse: [0; MouseButton::COUNT],
        }
    }

    /// Applies `evt` to the counters and returns the value to report for it.
    ///
    /// - Keyboard: increments only on `pressed && !held`; auto-repeat and
    ///   releases report the current count unchanged.
    /// - Mouse click: increments only on `pressed`.
    /// - Mouse wheel: never increments; the current (untouched) count of the
    ///   wheel button is reported.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::UnclassifiableEvent`] if `category` is not the
    /// category of `evt`.
    pub fn record_and_fetch(
        &mut self,
        category: EventCategory,
        evt: &ButtonEvent,
    ) -> Result<u32, ClassifyError> {
        let presses = match *evt {
            ButtonEvent::Keyboard {
                button,
                pressed,
                held,
                ..
            } if category == EventCategory::KEYBOARD => {
                let slot = &mut self.keyboard[button.index()];
                if pressed && !held {
                    *slot = slot.wrapping_add(1);
                }
                *slot
            }
            ButtonEvent::MouseClick { button, pressed } if category == EventCategory::MOUSE_BUTTONS => {
                let slot = &mut self.mouse[button.index()];
                if pressed {
                    *slot = slot.wrapping_add(1);
                }
                *slot
            }
            ButtonEvent::MouseWheel { button, .. } if category == EventCategory::MOUSE_BUTTONS => {
                self.mouse[button.index()]
            }
            _ => return Err(ClassifyError::UnclassifiableEvent(*evt)),
        };
        trace!("presses for {evt:?}: {presses}");
        Ok(presses)
    }

    pub fn keyboard_presses(&self, button: KeyboardButton) -> u32 {
        self.keyboard[button.index()]
    }

    pub fn mouse_presses(&self, button: MouseButton) -> u32 {
        self.mouse[button.index()]
    }
}

impl Default for PressCounters {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::RawKeyboard;

    fn key(button: KeyboardButton, pressed: bool, held: bool) -> ButtonEvent {
        ButtonEvent::key(button, RawKeyboard::default(), pressed, held)
    }

    #[test]
    fn test_all_counters_start_at_zero() {
        let counters = PressCounters::new();
        assert!(KeyboardButton::ALL
            .iter()
            .all(|b| counters.keyboard_presses(*b) == 0));
        assert!(MouseButton::ALL.iter().all(|b| counters.mouse_presses(*b) == 0));
    }

    #[test]
    fn test_fresh_key_press_increments() {
        // Arrange
        let mut counters = PressCounters::new();

        // Act
        let presses = counters
            .record_and_fetch(EventCategory::KEYBOARD, &key(KeyboardButton::A, true, false))
            .unwrap();

        // Assert
        assert_eq!(presses, 1);
        assert_eq!(counters.keyboard_presses(KeyboardButton::A), 1);
    }

    #[test]
    fn test_auto_repeat_and_release_do_not_increment() {
        let mut counters = PressCounters::new();
        let kb = EventCategory::KEYBOARD;

        assert_eq!(counters.record_and_fetch(kb, &key(KeyboardButton::A, true, false)), Ok(1));
        assert_eq!(counters.record_and_fetch(kb, &key(KeyboardButton::A, true, true)), Ok(1));
        assert_eq!(counters.record_and_fetch(kb, &key(KeyboardButton::A, true, true)), Ok(1));
        assert_eq!(counters.record_and_fetch(kb, &key(KeyboardButton::A, false, false)), Ok(1));
        assert_eq!(counters.record_and_fetch(kb, &key(KeyboardButton::A, true, false)), Ok(2));
    }

    #[test]
    fn test_counters_are_per_button() {
        let mut counters = PressCounters::new();
        let kb = EventCategory::KEYBOARD;
        counters.record_and_fetch(kb, &key(KeyboardButton::A, true, false)).unwrap();
        counters.record_and_fetch(kb, &key(KeyboardButton::B, true, false)).unwrap();
        counters.record_and_fetch(kb, &key(KeyboardButton::B, true, false)).unwrap();

        assert_eq!(counters.keyboard_presses(KeyboardButton::A), 1);
        assert_eq!(counters.keyboard_presses(KeyboardButton::B), 2);
    }

    #[test]
    fn test_mouse_click_increments_on_press_only() {
        let mut counters = PressCounters::new();
        let mb = EventCategory::MOUSE_BUTTONS;

        let down = ButtonEvent::click(MouseButton::Mouse1, true);
        let up = ButtonEvent::click(MouseButton::Mouse1, false);
        assert_eq!(counters.record_and_fetch(mb, &down), Ok(1));
        assert_eq!(counters.record_and_fetch(mb, &up), Ok(1));
        assert_eq!(counters.record_and_fetch(mb, &down), Ok(2));
    }

    #[test]
    fn test_wheel_never_increments() {
        let mut counters = PressCounters::new();
        let mb = EventCategory::MOUSE_BUTTONS;

        for _ in 0..5 {
            let presses = counters
                .record_and_fetch(mb, &ButtonEvent::wheel(MouseButton::MouseWheelUp, 3))
                .unwrap();
            assert_eq!(presses, 0);
        }
        assert_eq!(counters.mouse_presses(MouseButton::MouseWheelUp), 0);
    }

    #[test]
    fn test_category_mismatch_is_rejected() {
        let mut counters = PressCounters::new();
        let result = counters.record_and_fetch(
            EventCategory::MOUSE_BUTTONS,
            &key(KeyboardButton::A, true, false),
        );
        assert!(matches!(result, Err(ClassifyError::UnclassifiableEvent(_))));
        assert_eq!(counters.keyboard_presses(KeyboardButton::A), 0);
    }
}
