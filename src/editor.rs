//! In-memory reference editor.
//!
//! [`MemoryEditor`] implements [`CompositionSink`] over a plain character
//! buffer and reports a fresh state after every mutation, the way a native
//! text engine would. It records every call it receives, which makes it the
//! backing editor for tests and for the replay tool.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use ime_core::key_event::keycode;
use ime_core::{KeyEvent, TextRange};

use crate::bridge::StatePublisher;
use crate::sink::{CompositionSink, SelectionListener};

/// Platform id of the "select all" context menu item.
pub const CONTEXT_MENU_SELECT_ALL: i32 = 0x0102_001f;

/// How the editor answers [`CompositionSink::request_state_update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// Publish a reply immediately.
    #[default]
    Answer,
    /// Promise a reply but never send one; the host publishes it.
    Defer,
    /// Report that no reply will come.
    Refuse,
}

/// One call received by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SinkCall {
    SendComposition {
        text: String,
        new_cursor_position: i32,
        is_commit: bool,
        pending_accent: u32,
    },
    SetSelection {
        start: i32,
        end: i32,
    },
    SetComposingRegion {
        start: i32,
        end: i32,
    },
    DeleteSurroundingText {
        before_length: i32,
        after_length: i32,
    },
    PerformEditorAction {
        action_code: i32,
    },
    PerformContextMenuAction {
        id: i32,
    },
    SendKeyEvent {
        event: KeyEvent,
    },
    RequestStateUpdate {
        answered: bool,
    },
    NotifyUserAction,
    FinishComposingText,
    RequestCursorUpdates {
        cursor_update_mode: i32,
    },
}

/// Shared record of the calls an editor received, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct EditorLog {
    calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl EditorLog {
    fn lock(&self) -> MutexGuard<'_, Vec<SinkCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, call: SinkCall) {
        self.lock().push(call);
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().clone()
    }

    /// Return the calls recorded so far and start a fresh record.
    pub fn take(&self) -> Vec<SinkCall> {
        std::mem::take(&mut *self.lock())
    }

    pub fn contains(&self, call: &SinkCall) -> bool {
        self.lock().contains(call)
    }
}

/// A selection update delivered to the input method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectionUpdate {
    pub selection: TextRange,
    pub composition: Option<TextRange>,
}

/// [`SelectionListener`] that records every update.
#[derive(Debug, Clone, Default)]
pub struct SelectionLog {
    updates: Arc<Mutex<Vec<SelectionUpdate>>>,
}

impl SelectionLog {
    fn lock(&self) -> MutexGuard<'_, Vec<SelectionUpdate>> {
        self.updates.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn updates(&self) -> Vec<SelectionUpdate> {
        self.lock().clone()
    }

    pub fn take(&self) -> Vec<SelectionUpdate> {
        std::mem::take(&mut *self.lock())
    }
}

impl SelectionListener for SelectionLog {
    fn update_selection(&mut self, selection: TextRange, composition: Option<TextRange>) {
        self.lock().push(SelectionUpdate {
            selection,
            composition,
        });
    }
}

pub struct MemoryEditor {
    chars: Vec<char>,
    selection: TextRange,
    composition: Option<TextRange>,
    single_line: bool,
    request_mode: RequestMode,
    publisher: StatePublisher,
    log: EditorLog,
}

impl MemoryEditor {
    pub fn new(publisher: StatePublisher, log: EditorLog) -> Self {
        Self {
            chars: Vec::new(),
            selection: TextRange::caret(0),
            composition: None,
            single_line: false,
            request_mode: RequestMode::Answer,
            publisher,
            log,
        }
    }

    /// Start with `text`, caret at the end.
    pub fn with_text(mut self, text: &str) -> Self {
        self.chars = text.chars().collect();
        self.selection = TextRange::caret(self.chars.len());
        self.composition = None;
        self
    }

    pub fn with_single_line(mut self, single_line: bool) -> Self {
        self.single_line = single_line;
        self
    }

    pub fn with_request_mode(mut self, mode: RequestMode) -> Self {
        self.request_mode = mode;
        self
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// Report the current state through the publisher.
    pub fn publish(&self, reply_to_request: bool) {
        self.publisher.update_state_on_ui_thread(
            self.text(),
            self.selection,
            self.composition,
            self.single_line,
            reply_to_request,
        );
    }

    fn len(&self) -> usize {
        self.chars.len()
    }

    /// Replace `range` with `text` and return the inserted length.
    fn replace(&mut self, range: TextRange, text: &str) -> usize {
        let inserted: Vec<char> = text.chars().collect();
        let n = inserted.len();
        self.chars.splice(range.start..range.end, inserted);
        n
    }

    /// Place the caret relative to freshly inserted text: a positive
    /// position counts from the end of the insertion, otherwise from its
    /// start.
    fn place_cursor(&mut self, start: usize, inserted: usize, new_cursor_position: i32) {
        let base = if new_cursor_position > 0 {
            (start + inserted) as i64 + i64::from(new_cursor_position) - 1
        } else {
            start as i64 + i64::from(new_cursor_position)
        };
        let caret = base.clamp(0, self.len() as i64) as usize;
        self.selection = TextRange::caret(caret);
    }

    fn insert_committed(&mut self, text: &str, new_cursor_position: i32) {
        let range = self.composition.unwrap_or(self.selection);
        let inserted = self.replace(range, text);
        self.composition = None;
        self.place_cursor(range.start, inserted, new_cursor_position);
    }

    fn delete_range(&mut self, range: TextRange) {
        if range.is_empty() {
            return;
        }
        self.chars.drain(range.start..range.end);
        self.composition = None;
        self.selection = TextRange::caret(range.start);
    }
}

impl CompositionSink for MemoryEditor {
    fn send_composition(
        &mut self,
        text: &str,
        new_cursor_position: i32,
        is_commit: bool,
        pending_accent: u32,
    ) {
        self.log.push(SinkCall::SendComposition {
            text: text.to_string(),
            new_cursor_position,
            is_commit,
            pending_accent,
        });
        if is_commit {
            self.insert_committed(text, new_cursor_position);
        } else {
            let range = self.composition.unwrap_or(self.selection);
            let inserted = self.replace(range, text);
            self.composition =
                (inserted > 0).then(|| TextRange::new(range.start, range.start + inserted));
            self.place_cursor(range.start, inserted, new_cursor_position);
        }
        self.publish(false);
    }

    fn set_selection(&mut self, start: i32, end: i32) {
        self.log.push(SinkCall::SetSelection { start, end });
        self.selection = TextRange::clamped(start.into(), end.into(), self.len());
        self.publish(false);
    }

    fn set_composing_region(&mut self, start: i32, end: i32) {
        self.log.push(SinkCall::SetComposingRegion { start, end });
        self.composition = TextRange::composition(start.into(), end.into(), self.len());
        self.publish(false);
    }

    fn delete_surrounding_text(&mut self, before_length: i32, after_length: i32) {
        self.log.push(SinkCall::DeleteSurroundingText {
            before_length,
            after_length,
        });
        let before = before_length.max(0) as usize;
        let after = after_length.max(0) as usize;
        let selection = self.selection;
        let tail_end = selection.end.saturating_add(after).min(self.len());
        self.chars.drain(selection.end..tail_end);
        let head_start = selection.start.saturating_sub(before);
        self.chars.drain(head_start..selection.start);
        self.selection = TextRange::new(head_start, head_start + selection.len());
        // Deleting around a composition ends it.
        self.composition = None;
        self.publish(false);
    }

    fn perform_editor_action(&mut self, action_code: i32) {
        self.log.push(SinkCall::PerformEditorAction { action_code });
    }

    fn perform_context_menu_action(&mut self, id: i32) {
        self.log.push(SinkCall::PerformContextMenuAction { id });
        if id == CONTEXT_MENU_SELECT_ALL {
            self.selection = TextRange::new(0, self.len());
            self.publish(false);
        }
    }

    fn send_key_event(&mut self, event: &KeyEvent) {
        self.log.push(SinkCall::SendKeyEvent { event: *event });
        if !event.is_down() {
            return;
        }
        if let Some(c) = event.printable_char() {
            self.insert_committed(&c.to_string(), 1);
        } else {
            match event.key_code {
                keycode::DEL => {
                    let target = if self.selection.is_empty() {
                        TextRange::new(self.selection.start.saturating_sub(1), self.selection.start)
                    } else {
                        self.selection
                    };
                    self.delete_range(target);
                }
                keycode::FORWARD_DEL => {
                    let target = if self.selection.is_empty() {
                        let end = (self.selection.end + 1).min(self.len());
                        TextRange::new(self.selection.end, end)
                    } else {
                        self.selection
                    };
                    self.delete_range(target);
                }
                keycode::ENTER if !self.single_line => self.insert_committed("\n", 1),
                _ => {
                    debug!(key_code = event.key_code, "key ignored by editor");
                    return;
                }
            }
        }
        self.publish(false);
    }

    fn request_state_update(&mut self) -> bool {
        let answered = self.request_mode != RequestMode::Refuse;
        self.log.push(SinkCall::RequestStateUpdate { answered });
        if self.request_mode == RequestMode::Answer {
            self.publish(true);
        }
        answered
    }

    fn notify_user_action(&mut self) {
        self.log.push(SinkCall::NotifyUserAction);
    }

    fn finish_composing_text(&mut self) {
        self.log.push(SinkCall::FinishComposingText);
        self.composition = None;
        self.publish(false);
    }

    fn on_request_cursor_updates(&mut self, cursor_update_mode: i32) -> bool {
        self.log
            .push(SinkCall::RequestCursorUpdates { cursor_update_mode });
        true
    }
}
