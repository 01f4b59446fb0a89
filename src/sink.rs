//! Collaborators the bridge talks to on either side of the thread boundary.

use ime_core::{KeyEvent, TextRange};

/// The editor side of the bridge: applies edits to the authoritative text
/// model. Every method is called on the UI thread.
///
/// Implementations report the resulting text state asynchronously through a
/// [`StatePublisher`](crate::StatePublisher); none of these calls return the
/// new state directly.
pub trait CompositionSink: Send {
    /// Replace the composition (or the selection when nothing is being
    /// composed) with `text`. A commit ends the composition; otherwise `text`
    /// becomes the new composing span. `pending_accent` carries the dead-key
    /// accent with the combining flag set, or 0.
    fn send_composition(
        &mut self,
        text: &str,
        new_cursor_position: i32,
        is_commit: bool,
        pending_accent: u32,
    );

    fn set_selection(&mut self, start: i32, end: i32);

    fn set_composing_region(&mut self, start: i32, end: i32);

    fn delete_surrounding_text(&mut self, before_length: i32, after_length: i32);

    fn perform_editor_action(&mut self, action_code: i32);

    fn perform_context_menu_action(&mut self, id: i32);

    fn send_key_event(&mut self, event: &KeyEvent);

    /// Ask for a fresh snapshot tagged as a reply. Returns `false` when no
    /// snapshot will follow, which releases the waiting reader.
    fn request_state_update(&mut self) -> bool;

    /// Activity heartbeat sent alongside every text-producing edit.
    fn notify_user_action(&mut self);

    fn finish_composing_text(&mut self);

    fn on_request_cursor_updates(&mut self, _cursor_update_mode: i32) -> bool {
        false
    }
}

/// Receives selection changes for the input method. Called on the IME
/// thread, never while a batch edit is open.
pub trait SelectionListener: Send {
    fn update_selection(&mut self, selection: TextRange, composition: Option<TextRange>);
}
