//! Raw key events as delivered by the platform input method.

use serde::{Deserialize, Serialize};

/// Set on [`KeyEvent::unicode_char`] when the key is a dead key whose accent
/// combines with the next keystroke.
pub const COMBINING_ACCENT: u32 = 0x8000_0000;
/// Masks the accent code point out of a dead-key `unicode_char`.
pub const COMBINING_ACCENT_MASK: u32 = 0x7FFF_FFFF;

// Platform key codes the bridge and the reference editor care about.
pub mod keycode {
    pub const UNKNOWN: u32 = 0;
    pub const ENTER: u32 = 66;
    pub const DEL: u32 = 67;
    pub const FORWARD_DEL: u32 = 112;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub action: KeyAction,
    pub key_code: u32,
    /// Code point produced by the key, 0 for non-printing keys. Dead keys
    /// carry the combining accent with [`COMBINING_ACCENT`] set.
    #[serde(default)]
    pub unicode_char: u32,
}

impl KeyEvent {
    pub fn down(key_code: u32, unicode_char: u32) -> Self {
        Self {
            action: KeyAction::Down,
            key_code,
            unicode_char,
        }
    }

    pub fn up(key_code: u32, unicode_char: u32) -> Self {
        Self {
            action: KeyAction::Up,
            key_code,
            unicode_char,
        }
    }

    /// Key-down for a printable character.
    pub fn char_down(c: char) -> Self {
        Self::down(keycode::UNKNOWN, c as u32)
    }

    /// Key-down for a dead key carrying `accent` (a combining mark).
    pub fn dead_key(accent: char) -> Self {
        Self::down(keycode::UNKNOWN, accent as u32 | COMBINING_ACCENT)
    }

    pub fn is_down(&self) -> bool {
        self.action == KeyAction::Down
    }

    /// The accent code point when this is a dead key.
    pub fn combining_accent(&self) -> Option<u32> {
        (self.unicode_char & COMBINING_ACCENT != 0)
            .then_some(self.unicode_char & COMBINING_ACCENT_MASK)
    }

    /// The printable character produced by this key, if any.
    pub fn printable_char(&self) -> Option<char> {
        if self.combining_accent().is_some() || self.unicode_char == 0 {
            return None;
        }
        char::from_u32(self.unicode_char).filter(|c| !c.is_control())
    }
}
