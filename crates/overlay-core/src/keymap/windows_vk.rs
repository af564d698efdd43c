//! Windows virtual-key code to [`KeyboardButton`] translation.
//!
//! Capture layers that only know the raw `(makecode, flags, vkey)` triple use
//! [`button_from_raw`] to find the logical button.  Raw input reports the
//! generic `VK_SHIFT`, `VK_CONTROL` and `VK_MENU` codes rather than their
//! left/right variants, and reuses `VK_RETURN` for the numpad Enter key, so
//! those cases are resolved from the scan code and the `E0` prefix flag.
//!
//! Reference: Windows Virtual-Key Codes (winuser.h), `RAWKEYBOARD` flags.

use crate::domain::buttons::KeyboardButton;
use crate::domain::event::RawKeyboard;

/// `RI_KEY_E0`: the scan code carried the `E0` prefix.
pub const RI_KEY_E0: u16 = 0x02;

const VK_SHIFT: u16 = 0x10;
const VK_CONTROL: u16 = 0x11;
const VK_MENU: u16 = 0x12;
const VK_RETURN: u16 = 0x0D;

/// Scan code of the right Shift key (left Shift is 0x2A).
const MAKECODE_RIGHT_SHIFT: u16 = 0x36;

/// Translates a Windows virtual-key code to a [`KeyboardButton`].
///
/// Returns [`KeyboardButton::None`] for codes with no logical button.  Generic
/// modifier codes map to their left-hand variant; use [`button_from_raw`] when
/// the scan code and flags are available.
pub fn vk_to_button(vk: u8) -> KeyboardButton {
    VK_TO_BUTTON_TABLE[vk as usize]
}

/// Resolves the logical button for a raw keyboard report.
pub fn button_from_raw(raw: RawKeyboard) -> KeyboardButton {
    let extended = raw.flags & RI_KEY_E0 != 0;
    match raw.vkey {
        VK_SHIFT if raw.makecode == MAKECODE_RIGHT_SHIFT => KeyboardButton::RightShift,
        VK_SHIFT => KeyboardButton::LeftShift,
        VK_CONTROL if extended => KeyboardButton::RightControl,
        VK_CONTROL => KeyboardButton::LeftControl,
        VK_MENU if extended => KeyboardButton::RightAlt,
        VK_MENU => KeyboardButton::LeftAlt,
        VK_RETURN if extended => KeyboardButton::NumpadEnter,
        vk => u8::try_from(vk).map(vk_to_button).unwrap_or(KeyboardButton::None),
    }
}

/// VK → button table indexed by VK code (0x00–0xFF).
const VK_TO_BUTTON_TABLE: [KeyboardButton; 256] = {
    use KeyboardButton::*;
    let mut t = [None; 256];

    // ── Letters (VK_A=0x41 … VK_Z=0x5A) ──────────────────────────────────────
    t[0x41] = A;
    t[0x42] = B;
    t[0x43] = C;
    t[0x44] = D;
    t[0x45] = E;
    t[0x46] = F;
    t[0x47] = G;
    t[0x48] = H;
    t[0x49] = I;
    t[0x4A] = J;
    t[0x4B] = K;
    t[0x4C] = L;
    t[0x4D] = M;
    t[0x4E] = N;
    t[0x4F] = O;
    t[0x50] = P;
    t[0x51] = Q;
    t[0x52] = R;
    t[0x53] = S;
    t[0x54] = T;
    t[0x55] = U;
    t[0x56] = V;
    t[0x57] = W;
    t[0x58] = X;
    t[0x59] = Y;
    t[0x5A] = Z;

    // ── Digit row (VK_0=0x30 … VK_9=0x39) ────────────────────────────────────
    t[0x30] = Num0;
    t[0x31] = Num1;
    t[0x32] = Num2;
    t[0x33] = Num3;
    t[0x34] = Num4;
    t[0x35] = Num5;
    t[0x36] = Num6;
    t[0x37] = Num7;
    t[0x38] = Num8;
    t[0x39] = Num9;

    // ── Control keys ─────────────────────────────────────────────────────────
    t[0x0D] = Enter;        // VK_RETURN
    t[0x1B] = Esc;          // VK_ESCAPE
    t[0x08] = Backspace;    // VK_BACK
    t[0x09] = Tab;          // VK_TAB
    t[0x20] = Space;        // VK_SPACE
    t[0x14] = CapsLock;     // VK_CAPITAL
    t[0x91] = ScrollLock;   // VK_SCROLL
    t[0x13] = PauseBreak;   // VK_PAUSE
    t[0x2D] = Insert;       // VK_INSERT
    t[0x24] = Home;         // VK_HOME
    t[0x21] = PageUp;       // VK_PRIOR
    t[0x2E] = Delete;       // VK_DELETE
    t[0x23] = End;          // VK_END
    t[0x22] = PageDown;     // VK_NEXT
    t[0x2C] = PrintScreen;  // VK_SNAPSHOT
    t[0x5D] = Application;  // VK_APPS

    // ── Arrow keys ───────────────────────────────────────────────────────────
    t[0x25] = LeftArrow;
    t[0x26] = UpArrow;
    t[0x27] = RightArrow;
    t[0x28] = DownArrow;

    // ── Function keys (VK_F1=0x70 … VK_F12=0x7B) ─────────────────────────────
    t[0x70] = F1;
    t[0x71] = F2;
    t[0x72] = F3;
    t[0x73] = F4;
    t[0x74] = F5;
    t[0x75] = F6;
    t[0x76] = F7;
    t[0x77] = F8;
    t[0x78] = F9;
    t[0x79] = F10;
    t[0x7A] = F11;
    t[0x7B] = F12;

    // ── Numpad (VK_NUMPAD0=0x60 … VK_NUMPAD9=0x69) ───────────────────────────
    t[0x60] = Numpad0;
    t[0x61] = Numpad1;
    t[0x62] = Numpad2;
    t[0x63] = Numpad3;
    t[0x64] = Numpad4;
    t[0x65] = Numpad5;
    t[0x66] = Numpad6;
    t[0x67] = Numpad7;
    t[0x68] = Numpad8;
    t[0x69] = Numpad9;
    t[0x6A] = NumpadMultiply;   // VK_MULTIPLY
    t[0x6B] = NumpadPlus;       // VK_ADD
    t[0x6D] = NumpadMinus;      // VK_SUBTRACT
    t[0x6E] = NumpadDot;        // VK_DECIMAL
    t[0x6F] = NumpadDivide;     // VK_DIVIDE
    t[0x90] = NumLock;          // VK_NUMLOCK

    // ── Punctuation / symbols ────────────────────────────────────────────────
    t[0xBD] = Minus;        // VK_OEM_MINUS  (- _)
    t[0xBB] = Equals;       // VK_OEM_PLUS   (= +)
    t[0xDB] = OpenBracket;  // VK_OEM_4      ([ {)
    t[0xDD] = CloseBracket; // VK_OEM_6      (] })
    t[0xDC] = Backslash;    // VK_OEM_5      (\ |)
    t[0xBA] = Semicolon;    // VK_OEM_1      (; :)
    t[0xDE] = Quote;        // VK_OEM_7      (' ")
    t[0xC0] = Tilde;        // VK_OEM_3      (` ~)
    t[0xBC] = Comma;        // VK_OEM_COMMA  (, <)
    t[0xBE] = Period;       // VK_OEM_PERIOD (. >)
    t[0xBF] = Slash;        // VK_OEM_2      (/ ?)

    // ── Sided modifiers ──────────────────────────────────────────────────────
    t[0xA2] = LeftControl;  // VK_LCONTROL
    t[0xA3] = RightControl; // VK_RCONTROL
    t[0xA0] = LeftShift;    // VK_LSHIFT
    t[0xA1] = RightShift;   // VK_RSHIFT
    t[0xA4] = LeftAlt;      // VK_LMENU
    t[0xA5] = RightAlt;     // VK_RMENU
    t[0x5B] = LeftWindows;  // VK_LWIN
    t[0x5C] = RightWindows; // VK_RWIN

    // ── Media keys ───────────────────────────────────────────────────────────
    t[0xAD] = Mute;         // VK_VOLUME_MUTE
    t[0xAE] = VolumeDown;   // VK_VOLUME_DOWN
    t[0xAF] = VolumeUp;     // VK_VOLUME_UP
    t[0xB0] = Next;         // VK_MEDIA_NEXT_TRACK
    t[0xB1] = Previous;     // VK_MEDIA_PREV_TRACK
    t[0xB2] = Stop;         // VK_MEDIA_STOP
    t[0xB3] = PlayPause;    // VK_MEDIA_PLAY_PAUSE

    t
};
