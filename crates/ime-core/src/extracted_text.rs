use serde::Serialize;

use crate::text_input_state::TextInputState;

/// Set in [`ExtractedText::flags`] when the editor is single-line.
pub const FLAG_SINGLE_LINE: u32 = 0x0001;

/// Full-text extraction handed to the input method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedText {
    pub text: String,
    pub start_offset: usize,
    pub partial_start_offset: usize,
    pub partial_end_offset: usize,
    pub selection_start: usize,
    pub selection_end: usize,
    pub flags: u32,
}

impl From<&TextInputState> for ExtractedText {
    fn from(state: &TextInputState) -> Self {
        Self {
            text: state.text().to_string(),
            start_offset: 0,
            partial_start_offset: 0,
            partial_end_offset: state.char_len(),
            selection_start: state.selection().start,
            selection_end: state.selection().end,
            flags: if state.single_line() { FLAG_SINGLE_LINE } else { 0 },
        }
    }
}
