//! Dead-key accent combination.
//!
//! Accents are tracked as combining marks (U+0300 block). The spacing form is
//! what the user sees while the accent is pending, and what gets committed
//! when the accent cannot combine with the following key.

use unicode_normalization::char::compose;

// (combining mark, spacing form)
const ACCENTS: &[(u32, char)] = &[
    (0x0300, '`'),
    (0x0301, '\u{00B4}'),
    (0x0302, '^'),
    (0x0303, '~'),
    (0x0304, '\u{00AF}'),
    (0x0306, '\u{02D8}'),
    (0x0307, '\u{02D9}'),
    (0x0308, '\u{00A8}'),
    (0x030A, '\u{02DA}'),
    (0x030B, '\u{02DD}'),
    (0x030C, '\u{02C7}'),
    (0x0327, '\u{00B8}'),
    (0x0328, '\u{02DB}'),
];

/// Normalize `accent` to its combining mark. Spacing accents are mapped back
/// to the mark they stand for; anything else is returned unchanged.
pub fn to_combining(accent: u32) -> u32 {
    ACCENTS
        .iter()
        .find(|(_, spacing)| *spacing as u32 == accent)
        .map(|(combining, _)| *combining)
        .unwrap_or(accent)
}

/// The visible stand-in for a pending accent.
pub fn spacing_form(accent: u32) -> Option<char> {
    let accent = to_combining(accent);
    ACCENTS
        .iter()
        .find(|(combining, _)| *combining == accent)
        .map(|(_, spacing)| *spacing)
        .or_else(|| char::from_u32(accent))
}

/// Combine a pending `accent` with the code point `c` of the next key.
///
/// Typing the accent twice, or following it with a space, yields the spacing
/// accent itself. Returns `None` when the pair has no precomposed form.
pub fn dead_char(accent: u32, c: u32) -> Option<char> {
    let accent = to_combining(accent);
    if to_combining(c) == accent || c == ' ' as u32 {
        return spacing_form(accent);
    }
    let mark = char::from_u32(accent)?;
    let base = char::from_u32(c)?;
    compose(base, mark)
}
