//! Immutable snapshots of the editable text as seen by the UI thread.
//!
//! All offsets are character (Unicode scalar) offsets into `text`.

use std::fmt;

use serde::Serialize;

/// Half-open range `[start, end)` of character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Collapsed range (a caret) at `offset`.
    pub const fn caret(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Number of characters covered; an inverted range covers none.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Build a range from raw platform offsets, ordering and clamping them
    /// into `[0, len]`. Negative offsets clamp to zero.
    pub fn clamped(start: i64, end: i64, len: usize) -> Self {
        let clamp = |v: i64| -> usize { v.clamp(0, len as i64) as usize };
        let (a, b) = (clamp(start), clamp(end));
        Self::new(a.min(b), a.max(b))
    }

    /// Composition region from raw offsets. A negative bound or an empty
    /// region means "no active composition".
    pub fn composition(start: i64, end: i64, len: usize) -> Option<Self> {
        if start < 0 || end < 0 || start == end {
            return None;
        }
        let range = Self::clamped(start, end, len);
        (!range.is_empty()).then_some(range)
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A snapshot of text, selection and composition pushed from the UI thread.
///
/// Never mutated after construction; every change produces a new snapshot.
/// The sentinel built by [`TextInputState::unblocker`] carries no editing
/// data and is only used to release a blocked reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextInputState {
    text: String,
    selection: TextRange,
    composition: Option<TextRange>,
    single_line: bool,
    reply_to_request: bool,
    #[serde(skip)]
    unblocker: bool,
}

impl TextInputState {
    /// Build a snapshot. Selection and composition are clamped into the text
    /// so the range invariants hold regardless of what the caller passes.
    pub fn new(
        text: impl Into<String>,
        selection: TextRange,
        composition: Option<TextRange>,
        single_line: bool,
        reply_to_request: bool,
    ) -> Self {
        let text = text.into();
        let len = text.chars().count();
        let selection = TextRange::clamped(selection.start as i64, selection.end as i64, len);
        let composition = composition
            .map(|c| TextRange::clamped(c.start as i64, c.end as i64, len))
            .filter(|c| !c.is_empty());
        Self {
            text,
            selection,
            composition,
            single_line,
            reply_to_request,
            unblocker: false,
        }
    }

    /// The in-band sentinel that aborts a pending synchronous read.
    pub fn unblocker() -> Self {
        Self {
            text: String::new(),
            selection: TextRange::caret(0),
            composition: None,
            single_line: false,
            reply_to_request: false,
            unblocker: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn selection(&self) -> TextRange {
        self.selection
    }

    pub fn composition(&self) -> Option<TextRange> {
        self.composition
    }

    pub fn single_line(&self) -> bool {
        self.single_line
    }

    pub fn reply_to_request(&self) -> bool {
        self.reply_to_request
    }

    pub fn should_unblock(&self) -> bool {
        self.unblocker
    }

    /// Length of `text` in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Up to `max_chars` characters immediately before the selection start.
    pub fn text_before_selection(&self, max_chars: usize) -> String {
        let end = self.selection.start;
        let start = end.saturating_sub(max_chars);
        self.slice(start, end)
    }

    /// Up to `max_chars` characters immediately after the selection end.
    pub fn text_after_selection(&self, max_chars: usize) -> String {
        let start = self.selection.end;
        let end = start.saturating_add(max_chars).min(self.char_len());
        self.slice(start, end)
    }

    /// The selected text, or `None` when the selection is a caret.
    pub fn selected_text(&self) -> Option<String> {
        if self.selection.is_empty() {
            return None;
        }
        Some(self.slice(self.selection.start, self.selection.end))
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.text.chars().skip(start).take(end - start).collect()
    }
}

impl fmt::Display for TextInputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unblocker {
            return write!(f, "TextInputState {{unblocker}}");
        }
        write!(f, "TextInputState {{[{}] sel{}", self.text, self.selection)?;
        match self.composition {
            Some(c) => write!(f, " comp{}", c)?,
            None => write!(f, " comp[none]")?,
        }
        write!(
            f,
            " {}{}}}",
            if self.single_line { "SIN" } else { "MUL" },
            if self.reply_to_request { " ReplyToRequest" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state(text: &str, sel: (usize, usize)) -> TextInputState {
        TextInputState::new(text, TextRange::new(sel.0, sel.1), None, false, false)
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let r = TextRange::new(3, 1);
        assert_eq!(r.len(), 0);
        assert!(r.is_empty());
        assert_eq!(TextRange::new(1, 3).len(), 2);
    }

    #[test]
    fn test_text_around_selection() {
        let s = state("hello world", (5, 6));
        assert_eq!(s.text_before_selection(3), "llo");
        assert_eq!(s.text_before_selection(100), "hello");
        assert_eq!(s.text_after_selection(3), "wor");
        assert_eq!(s.text_after_selection(100), "world");
        assert_eq!(s.selected_text().as_deref(), Some(" "));
    }

    #[test]
    fn test_collapsed_selection_has_no_selected_text() {
        let s = state("abc", (1, 1));
        assert_eq!(s.selected_text(), None);
        assert_eq!(s.text_before_selection(0), "");
    }

    #[test]
    fn test_offsets_are_characters_not_bytes() {
        let s = state("日本語テキスト", (3, 3));
        assert_eq!(s.text_before_selection(2), "本語");
        assert_eq!(s.text_after_selection(2), "テキ");
        assert_eq!(s.char_len(), 7);
    }

    #[test]
    fn test_out_of_range_selection_is_clamped() {
        let s = state("abc", (10, 2));
        assert_eq!(s.selection(), TextRange::new(2, 3));
    }

    #[test]
    fn test_composition_sentinel_range() {
        assert_eq!(TextRange::composition(-1, -1, 5), None);
        assert_eq!(TextRange::composition(2, 2, 5), None);
        assert_eq!(TextRange::composition(4, 1, 5), Some(TextRange::new(1, 4)));
        assert_eq!(TextRange::composition(4, 9, 5), Some(TextRange::new(4, 5)));
    }

    #[test]
    fn test_unblocker_is_distinguishable() {
        let u = TextInputState::unblocker();
        assert!(u.should_unblock());
        assert!(!u.reply_to_request());
        assert!(!state("", (0, 0)).should_unblock());
        assert_eq!(u.to_string(), "TextInputState {unblocker}");
    }

    #[test]
    fn test_display() {
        let s = TextInputState::new(
            "ab",
            TextRange::caret(2),
            Some(TextRange::new(0, 2)),
            true,
            true,
        );
        assert_eq!(
            s.to_string(),
            "TextInputState {[ab] sel[2, 2) comp[0, 2) SIN ReplyToRequest}"
        );
    }

    proptest! {
        #[test]
        fn prop_ranges_always_within_text(
            text in "[a-zé日 ]{0,12}",
            a in 0usize..20, b in 0usize..20, c in 0usize..20, d in 0usize..20,
        ) {
            let s = TextInputState::new(
                text.clone(),
                TextRange::new(a, b),
                Some(TextRange::new(c, d)),
                false,
                false,
            );
            let len = text.chars().count();
            prop_assert!(s.selection().start <= s.selection().end);
            prop_assert!(s.selection().end <= len);
            if let Some(comp) = s.composition() {
                prop_assert!(comp.start < comp.end);
                prop_assert!(comp.end <= len);
            }
            let before = s.text_before_selection(usize::MAX);
            let after = s.text_after_selection(usize::MAX);
            let selected = s.selected_text().unwrap_or_default();
            prop_assert_eq!(format!("{before}{selected}{after}"), text);
        }
    }
}
