//! Replay scripts: a starting editor state plus a list of input-connection
//! calls, executed against a live bridge and a [`MemoryEditor`].

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use ime_bridge::editor::{
    EditorLog, MemoryEditor, RequestMode, SelectionLog, SelectionUpdate, SinkCall,
};
use ime_bridge::{InputBridge, InputConnection};
use ime_core::settings::Settings;
use ime_core::{DispatchError, DispatchLayer, ExtractedText, KeyEvent, TextInputState};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("step {index} ({op}) would block forever with request_mode \"defer\"")]
    BlocksWhenDeferred { index: usize, op: &'static str },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

fn default_cursor() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub single_line: bool,
    #[serde(default)]
    pub request_mode: RequestMode,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    SetComposingText {
        text: Option<String>,
        #[serde(default = "default_cursor")]
        new_cursor_position: i32,
    },
    CommitText {
        text: Option<String>,
        #[serde(default = "default_cursor")]
        new_cursor_position: i32,
    },
    FinishComposingText,
    DeleteSurroundingText {
        before_length: i32,
        after_length: i32,
    },
    SetSelection {
        start: i32,
        end: i32,
    },
    SetComposingRegion {
        start: i32,
        end: i32,
    },
    SendKeyEvent {
        event: KeyEvent,
    },
    PerformEditorAction {
        action_code: i32,
    },
    PerformContextMenuAction {
        id: i32,
    },
    BeginBatchEdit,
    EndBatchEdit,
    GetTextBeforeCursor {
        max_chars: usize,
    },
    GetTextAfterCursor {
        max_chars: usize,
    },
    GetSelectedText,
    GetCursorCapsMode {
        req_modes: u32,
    },
    GetExtractedText,
    RequestCursorUpdates {
        cursor_update_mode: i32,
    },
    SendKeyEventOnUiThread {
        event: KeyEvent,
    },
    MoveCursorToSelectionEndOnUiThread,
    ResetOnUiThread,
    UnblockOnUiThread,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::SetComposingText { .. } => "set_composing_text",
            Step::CommitText { .. } => "commit_text",
            Step::FinishComposingText => "finish_composing_text",
            Step::DeleteSurroundingText { .. } => "delete_surrounding_text",
            Step::SetSelection { .. } => "set_selection",
            Step::SetComposingRegion { .. } => "set_composing_region",
            Step::SendKeyEvent { .. } => "send_key_event",
            Step::PerformEditorAction { .. } => "perform_editor_action",
            Step::PerformContextMenuAction { .. } => "perform_context_menu_action",
            Step::BeginBatchEdit => "begin_batch_edit",
            Step::EndBatchEdit => "end_batch_edit",
            Step::GetTextBeforeCursor { .. } => "get_text_before_cursor",
            Step::GetTextAfterCursor { .. } => "get_text_after_cursor",
            Step::GetSelectedText => "get_selected_text",
            Step::GetCursorCapsMode { .. } => "get_cursor_caps_mode",
            Step::GetExtractedText => "get_extracted_text",
            Step::RequestCursorUpdates { .. } => "request_cursor_updates",
            Step::SendKeyEventOnUiThread { .. } => "send_key_event_on_ui_thread",
            Step::MoveCursorToSelectionEndOnUiThread => {
                "move_cursor_to_selection_end_on_ui_thread"
            }
            Step::ResetOnUiThread => "reset_on_ui_thread",
            Step::UnblockOnUiThread => "unblock_on_ui_thread",
        }
    }

    fn on_ui_thread(&self) -> bool {
        matches!(
            self,
            Step::SendKeyEventOnUiThread { .. }
                | Step::MoveCursorToSelectionEndOnUiThread
                | Step::ResetOnUiThread
                | Step::UnblockOnUiThread
        )
    }

    /// Whether the step waits for the editor to report its state. An ended
    /// batch only waits when it was the outermost one, which is not known
    /// up front.
    fn waits_for_state(&self) -> bool {
        matches!(
            self,
            Step::EndBatchEdit
                | Step::GetTextBeforeCursor { .. }
                | Step::GetTextAfterCursor { .. }
                | Step::GetSelectedText
                | Step::GetCursorCapsMode { .. }
                | Step::GetExtractedText
                | Step::MoveCursorToSelectionEndOnUiThread
        )
    }

    fn apply(self, bridge: &InputBridge) -> Outcome {
        match self {
            Step::SetComposingText {
                text,
                new_cursor_position,
            } => {
                Outcome::Accepted(bridge.set_composing_text(text.as_deref(), new_cursor_position))
            }
            Step::CommitText {
                text,
                new_cursor_position,
            } => Outcome::Accepted(bridge.commit_text(text.as_deref(), new_cursor_position)),
            Step::FinishComposingText => Outcome::Accepted(bridge.finish_composing_text()),
            Step::DeleteSurroundingText {
                before_length,
                after_length,
            } => Outcome::Accepted(bridge.delete_surrounding_text(before_length, after_length)),
            Step::SetSelection { start, end } => Outcome::Accepted(bridge.set_selection(start, end)),
            Step::SetComposingRegion { start, end } => {
                Outcome::Accepted(bridge.set_composing_region(start, end))
            }
            Step::SendKeyEvent { event } => Outcome::Accepted(bridge.send_key_event(event)),
            Step::PerformEditorAction { action_code } => {
                Outcome::Accepted(bridge.perform_editor_action(action_code))
            }
            Step::PerformContextMenuAction { id } => {
                Outcome::Accepted(bridge.perform_context_menu_action(id))
            }
            Step::BeginBatchEdit => Outcome::Accepted(bridge.begin_batch_edit()),
            Step::EndBatchEdit => Outcome::Accepted(bridge.end_batch_edit()),
            Step::GetTextBeforeCursor { max_chars } => {
                Outcome::Text(bridge.get_text_before_cursor(max_chars, 0))
            }
            Step::GetTextAfterCursor { max_chars } => {
                Outcome::Text(bridge.get_text_after_cursor(max_chars, 0))
            }
            Step::GetSelectedText => Outcome::Text(bridge.get_selected_text(0)),
            Step::GetCursorCapsMode { req_modes } => {
                Outcome::CapsMode(bridge.get_cursor_caps_mode(req_modes))
            }
            Step::GetExtractedText => Outcome::Extracted(bridge.get_extracted_text(0)),
            Step::RequestCursorUpdates { cursor_update_mode } => {
                Outcome::Accepted(bridge.request_cursor_updates(cursor_update_mode))
            }
            Step::SendKeyEventOnUiThread { event } => {
                Outcome::Accepted(bridge.send_key_event_on_ui_thread(event))
            }
            Step::MoveCursorToSelectionEndOnUiThread => {
                bridge.move_cursor_to_selection_end_on_ui_thread();
                Outcome::Done
            }
            Step::ResetOnUiThread => {
                bridge.reset_on_ui_thread();
                Outcome::Done
            }
            Step::UnblockOnUiThread => {
                bridge.unblock_on_ui_thread();
                Outcome::Done
            }
        }
    }
}

/// What a step returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Accepted(bool),
    Text(Option<String>),
    CapsMode(u32),
    Extracted(Option<ExtractedText>),
    Done,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Accepted(ok) => write!(f, "{ok}"),
            Outcome::Text(Some(text)) => write!(f, "{text:?}"),
            Outcome::Text(None) | Outcome::Extracted(None) => f.write_str("unavailable"),
            Outcome::CapsMode(mode) => write!(f, "{mode:#06x}"),
            Outcome::Extracted(Some(e)) => write!(
                f,
                "{:?} sel[{}, {}) flags={}",
                e.text, e.selection_start, e.selection_end, e.flags
            ),
            Outcome::Done => f.write_str("-"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub op: &'static str,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub steps: Vec<StepReport>,
    pub calls: Vec<SinkCall>,
    pub selections: Vec<SelectionUpdate>,
    pub final_state: Option<TextInputState>,
}

pub fn parse_script(json: &str) -> Result<Script, ScriptError> {
    let script: Script = serde_json::from_str(json)?;
    if script.request_mode == RequestMode::Defer {
        if let Some((index, step)) = script
            .steps
            .iter()
            .enumerate()
            .find(|(_, s)| s.waits_for_state())
        {
            return Err(ScriptError::BlocksWhenDeferred {
                index,
                op: step.name(),
            });
        }
    }
    Ok(script)
}

pub fn load_script(path: &Path) -> Result<Script, ScriptError> {
    let json = fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_script(&json)
}

/// Drain both runners until no task is left bouncing between them.
fn settle(dispatch: &DispatchLayer) -> Result<(), DispatchError> {
    for _ in 0..3 {
        dispatch.call_on_ui(|| ())?;
        dispatch.call_on_ime(|| ())?;
    }
    Ok(())
}

/// Run `script` on freshly spawned threads and collect what happened.
pub fn run_script(script: Script, settings: &Settings) -> Result<Report, ScriptError> {
    let _span = info_span!("run_script", steps = script.steps.len()).entered();
    let dispatch = DispatchLayer::spawn(&settings.dispatch)?;
    let bridge = InputBridge::with_settings(dispatch.clone(), settings);
    let log = EditorLog::default();
    let selections = SelectionLog::default();

    let editor = MemoryEditor::new(bridge.publisher(), log.clone())
        .with_text(&script.text)
        .with_single_line(script.single_line)
        .with_request_mode(script.request_mode);
    let b = bridge.clone();
    let listener = selections.clone();
    dispatch.call_on_ui(move || {
        editor.publish(false);
        b.attach(Box::new(editor), Box::new(listener));
    })?;
    settle(&dispatch)?;
    log.take();
    selections.take();

    let mut steps = Vec::with_capacity(script.steps.len());
    for step in script.steps {
        let op = step.name();
        debug!(op, "replay step");
        let b = bridge.clone();
        let outcome = if step.on_ui_thread() {
            dispatch.call_on_ui(move || step.apply(&b))?
        } else {
            dispatch.call_on_ime(move || step.apply(&b))?
        };
        settle(&dispatch)?;
        steps.push(StepReport { op, outcome });
    }

    let b = bridge.clone();
    dispatch.call_on_ui(move || b.detach())?;
    settle(&dispatch)?;

    Ok(Report {
        steps,
        calls: log.take(),
        selections: selections.take(),
        final_state: bridge.last_reported_state(),
    })
}
