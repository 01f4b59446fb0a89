//! Auto-capitalization mode at a cursor position.

pub const CAP_MODE_CHARACTERS: u32 = 0x1000;
pub const CAP_MODE_WORDS: u32 = 0x2000;
pub const CAP_MODE_SENTENCES: u32 = 0x4000;

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'')
}

fn is_opening_punctuation(c: char) -> bool {
    is_quote(c) || matches!(c, '(' | '[' | '{' | '\u{00AB}' | '\u{2018}' | '\u{201C}' | '\u{300C}')
}

fn is_closing_punctuation(c: char) -> bool {
    is_quote(c) || matches!(c, ')' | ']' | '}' | '\u{00BB}' | '\u{2019}' | '\u{201D}' | '\u{300D}')
}

/// Capitalization modes in effect at character offset `offset` of `text`,
/// restricted to the modes requested in `req_modes`.
///
/// Characters mode applies everywhere. Words and sentences both apply at the
/// start of a paragraph. Otherwise words applies after whitespace, and
/// sentences after `.`, `?` or `!` followed by whitespace, unless the period
/// ends an abbreviation such as "e.g.".
pub fn cursor_caps_mode(text: &str, offset: usize, req_modes: u32) -> u32 {
    let chars: Vec<char> = text.chars().collect();
    let offset = offset.min(chars.len());

    let mut mode = 0;
    if req_modes & CAP_MODE_CHARACTERS != 0 {
        mode |= CAP_MODE_CHARACTERS;
    }
    if req_modes & (CAP_MODE_WORDS | CAP_MODE_SENTENCES) == 0 {
        return mode;
    }

    // Back over opening punctuation.
    let mut i = offset;
    while i > 0 && is_opening_punctuation(chars[i - 1]) {
        i -= 1;
    }

    // Start of paragraph, with optional whitespace.
    let mut j = i;
    while j > 0 && matches!(chars[j - 1], ' ' | '\t') {
        j -= 1;
    }
    if j == 0 || chars[j - 1] == '\n' {
        return (mode | CAP_MODE_WORDS | CAP_MODE_SENTENCES) & (req_modes | mode);
    }

    if req_modes & CAP_MODE_SENTENCES == 0 {
        if i != j {
            mode |= CAP_MODE_WORDS;
        }
        return mode;
    }

    // A sentence boundary needs whitespace before the cursor.
    if i == j {
        return mode;
    }

    // Back over closing punctuation.
    while j > 0 && is_closing_punctuation(chars[j - 1]) {
        j -= 1;
    }

    if j > 0 {
        let c = chars[j - 1];
        if matches!(c, '.' | '?' | '!') {
            if c == '.' {
                for k in (0..j.saturating_sub(1)).rev() {
                    let c = chars[k];
                    if c == '.' {
                        return mode;
                    }
                    if !c.is_alphabetic() {
                        break;
                    }
                }
            }
            return mode | CAP_MODE_SENTENCES;
        }
    }

    mode
}
