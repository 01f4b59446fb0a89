use ime_core::{ExtractedText, KeyEvent};

/// The editing-operation contract an input method drives.
///
/// Writes answer whether the request was accepted; they are applied later on
/// the UI thread. Reads block the IME thread until the UI thread answers and
/// return `None` when no answer will come.
pub trait InputConnection {
    fn set_composing_text(&self, text: Option<&str>, new_cursor_position: i32) -> bool;

    fn commit_text(&self, text: Option<&str>, new_cursor_position: i32) -> bool;

    fn finish_composing_text(&self) -> bool;

    fn delete_surrounding_text(&self, before_length: i32, after_length: i32) -> bool;

    fn delete_surrounding_text_in_code_points(&self, before_length: i32, after_length: i32)
        -> bool;

    fn set_selection(&self, start: i32, end: i32) -> bool;

    fn set_composing_region(&self, start: i32, end: i32) -> bool;

    fn send_key_event(&self, event: KeyEvent) -> bool;

    fn perform_editor_action(&self, action_code: i32) -> bool;

    fn perform_context_menu_action(&self, id: i32) -> bool;

    fn begin_batch_edit(&self) -> bool;

    /// Returns whether a batch edit is still open afterwards.
    fn end_batch_edit(&self) -> bool;

    fn get_text_before_cursor(&self, max_chars: usize, flags: u32) -> Option<String>;

    fn get_text_after_cursor(&self, max_chars: usize, flags: u32) -> Option<String>;

    fn get_selected_text(&self, flags: u32) -> Option<String>;

    fn get_cursor_caps_mode(&self, req_modes: u32) -> u32;

    fn get_extracted_text(&self, flags: u32) -> Option<ExtractedText>;

    fn request_cursor_updates(&self, cursor_update_mode: i32) -> bool;

    fn commit_completion(&self, text: &str) -> bool;

    fn commit_correction(&self, old_text: &str, new_text: &str, offset: i32) -> bool;

    fn clear_meta_key_states(&self, states: u32) -> bool;

    fn report_fullscreen_mode(&self, enabled: bool) -> bool;

    fn perform_private_command(&self, action: &str) -> bool;

    fn close_connection(&self);
}
