use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, debug_span, warn};

use ime_core::accent;
use ime_core::caps_mode::cursor_caps_mode;
use ime_core::key_event::COMBINING_ACCENT;
use ime_core::settings::{self, AccentSettings, ReadSettings, Settings};
use ime_core::{DispatchLayer, ExtractedText, KeyEvent, StateQueue, TextInputState, TextRange};

use crate::input_connection::InputConnection;
use crate::sink::{CompositionSink, SelectionListener};

/// Holds a collaborator that is lent out while it runs, so no lock is held
/// across foreign code. Replacing the occupant bumps the generation; a
/// borrowed occupant from an older generation is dropped instead of being
/// put back.
struct Slot<T: ?Sized> {
    item: Option<Box<T>>,
    generation: u64,
}

impl<T: ?Sized> Slot<T> {
    fn empty() -> Mutex<Self> {
        Mutex::new(Self {
            item: None,
            generation: 0,
        })
    }
}

fn lock_slot<T: ?Sized>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Swap the occupant of `slot`. The previous one is returned so the caller
/// drops it after the lock is released.
fn replace_in_slot<T: ?Sized>(slot: &Mutex<Slot<T>>, item: Option<Box<T>>) -> Option<Box<T>> {
    let mut guard = lock_slot(slot);
    guard.generation += 1;
    std::mem::replace(&mut guard.item, item)
}

/// Run `f` on the occupant of `slot` without holding the lock. `None` when
/// the slot is empty or its occupant is already lent out further up the
/// stack.
fn borrow_slot<T: ?Sized, R>(slot: &Mutex<Slot<T>>, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    let (mut item, generation) = {
        let mut guard = lock_slot(slot);
        let item = guard.item.take()?;
        (item, guard.generation)
    };
    let result = f(&mut *item);
    let stale = {
        let mut guard = lock_slot(slot);
        if guard.generation == generation && guard.item.is_none() {
            guard.item = Some(item);
            None
        } else {
            Some(item)
        }
    };
    drop(stale);
    Some(result)
}

struct Inner {
    dispatch: DispatchLayer,
    queue: StateQueue,
    cached: Mutex<Option<TextInputState>>,
    sink: Mutex<Slot<dyn CompositionSink>>,
    listener: Mutex<Slot<dyn SelectionListener>>,
    // UI thread only.
    pending_accent: AtomicU32,
    // IME thread only.
    batch_edits: AtomicUsize,
    selection_dirty: AtomicBool,
    reads: ReadSettings,
    accent: AccentSettings,
}

/// Connects an input method running on the IME thread to an editor owned by
/// the UI thread.
///
/// Edits are posted to the UI thread and never wait. Reads post a state
/// request to the UI thread and block the IME thread on the state queue
/// until the reply (or the unblock sentinel) arrives. Cloning yields another
/// handle to the same bridge.
#[derive(Clone)]
pub struct InputBridge {
    inner: Arc<Inner>,
}

/// UI-side handle for reporting text state to a bridge.
///
/// Held by the editor or native engine. It does not keep the bridge alive;
/// once the bridge is gone every call is a no-op.
#[derive(Clone)]
pub struct StatePublisher {
    inner: Weak<Inner>,
}

impl StatePublisher {
    fn bridge(&self) -> Option<InputBridge> {
        self.inner.upgrade().map(|inner| InputBridge { inner })
    }

    /// See [`InputBridge::update_state_on_ui_thread`].
    pub fn update_state_on_ui_thread(
        &self,
        text: impl Into<String>,
        selection: TextRange,
        composition: Option<TextRange>,
        single_line: bool,
        reply_to_request: bool,
    ) {
        if let Some(bridge) = self.bridge() {
            bridge.update_state_on_ui_thread(
                text,
                selection,
                composition,
                single_line,
                reply_to_request,
            );
        }
    }

    /// See [`InputBridge::unblock_on_ui_thread`].
    pub fn unblock_on_ui_thread(&self) {
        if let Some(bridge) = self.bridge() {
            bridge.unblock_on_ui_thread();
        }
    }
}

impl InputBridge {
    /// Bridge configured from the process-wide settings.
    pub fn new(dispatch: DispatchLayer) -> Self {
        Self::with_settings(dispatch, settings::settings())
    }

    pub fn with_settings(dispatch: DispatchLayer, settings: &Settings) -> Self {
        Self {
            inner: Arc::new(Inner {
                dispatch,
                queue: StateQueue::new(),
                cached: Mutex::new(None),
                sink: Slot::empty(),
                listener: Slot::empty(),
                pending_accent: AtomicU32::new(0),
                batch_edits: AtomicUsize::new(0),
                selection_dirty: AtomicBool::new(false),
                reads: settings.reads,
                accent: settings.accent,
            }),
        }
    }

    /// Install the editor and the selection listener. Until this is called
    /// edits are dropped and state requests are answered with the sentinel.
    pub fn attach(&self, sink: Box<dyn CompositionSink>, listener: Box<dyn SelectionListener>) {
        let old_sink = replace_in_slot(&self.inner.sink, Some(sink));
        let old_listener = replace_in_slot(&self.inner.listener, Some(listener));
        drop((old_sink, old_listener));
    }

    /// Drop the collaborators and release any reader still waiting.
    pub fn detach(&self) {
        let old_sink = replace_in_slot(&self.inner.sink, None);
        self.cancel_combining_accent();
        let old_listener = replace_in_slot(&self.inner.listener, None);
        drop((old_sink, old_listener));
        self.unblock_on_ui_thread();
    }

    /// The most recent state the editor reported, reply or not.
    pub fn last_reported_state(&self) -> Option<TextInputState> {
        self.cached().clone()
    }

    pub fn publisher(&self) -> StatePublisher {
        StatePublisher {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn cached(&self) -> MutexGuard<'_, Option<TextInputState>> {
        self.inner.cached.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Call into the editor. Dropped with a warning when no editor is
    /// attached.
    fn with_sink<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut (dyn CompositionSink + 'static)) -> R,
    ) -> Option<R> {
        let result = borrow_slot(&self.inner.sink, f);
        if result.is_none() {
            warn!(op, "no composition sink available, dropping call");
        }
        result
    }

    fn post_to_ui(&self, op: &'static str, f: impl FnOnce(&InputBridge) + Send + 'static) -> bool {
        let this = self.clone();
        match self.inner.dispatch.post_to_ui(move || f(&this)) {
            Ok(()) => true,
            Err(e) => {
                warn!(op, "dropping UI task: {e}");
                false
            }
        }
    }

    fn post_to_ime(&self, op: &'static str, f: impl FnOnce(&InputBridge) + Send + 'static) -> bool {
        let this = self.clone();
        match self.inner.dispatch.post_to_ime(move || f(&this)) {
            Ok(()) => true,
            Err(e) => {
                warn!(op, "dropping IME task: {e}");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accent handling, UI thread
    // -----------------------------------------------------------------------

    fn pending(&self) -> u32 {
        self.inner.pending_accent.load(Ordering::SeqCst)
    }

    fn cancel_combining_accent(&self) {
        self.inner.pending_accent.store(0, Ordering::SeqCst);
    }

    fn compose_on_ui_thread(&self, text: &str, new_cursor_position: i32, is_pending_accent: bool) {
        let accent_to_send = if is_pending_accent {
            self.pending() | COMBINING_ACCENT
        } else {
            0
        };
        self.cancel_combining_accent();
        self.with_sink("update_composing_text", |sink| {
            sink.send_composition(text, new_cursor_position, false, accent_to_send)
        });
    }

    fn commit_on_ui_thread(&self, text: &str, new_cursor_position: i32) {
        self.cancel_combining_accent();
        self.with_sink("commit_text", |sink| {
            sink.send_composition(text, new_cursor_position, true, 0)
        });
    }

    fn finish_composing_on_ui_thread(&self) {
        self.cancel_combining_accent();
        self.with_sink("finish_composing_text", |sink| sink.finish_composing_text());
    }

    /// Run a key-down through the dead-key machine. Returns `true` when the
    /// key was consumed and must not reach the sink as a raw key event.
    fn handle_combining_accent(&self, event: &KeyEvent) -> bool {
        if !event.is_down() {
            return false;
        }

        if let Some(accent) = event.combining_accent() {
            let accent = accent::to_combining(accent);
            let Some(placeholder) = accent::spacing_form(accent) else {
                return false;
            };
            debug!(accent, "dead key pending");
            let flagged = accent | COMBINING_ACCENT;
            self.with_sink("send_key_event", |sink| {
                sink.send_composition(&placeholder.to_string(), 1, false, flagged)
            });
            self.inner.pending_accent.store(accent, Ordering::SeqCst);
            return true;
        }

        let pending = self.pending();
        if pending != 0 && event.unicode_char != 0 {
            match accent::dead_char(pending, event.unicode_char) {
                Some(combined) => {
                    self.commit_on_ui_thread(&combined.to_string(), 1);
                    return true;
                }
                None => {
                    // Commit the accent on its own, then let the key through.
                    self.finish_composing_on_ui_thread();
                }
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // UI thread entry points
    // -----------------------------------------------------------------------

    pub fn reset_on_ui_thread(&self) {
        self.inner.batch_edits.store(0, Ordering::SeqCst);
        self.inner.selection_dirty.store(false, Ordering::SeqCst);
        self.cancel_combining_accent();
    }

    /// Record a new text state reported by the editor and queue it for the
    /// IME thread. Unsolicited states also schedule a drain of the queue on
    /// the IME thread; replies are picked up by the blocked reader.
    pub fn update_state_on_ui_thread(
        &self,
        text: impl Into<String>,
        selection: TextRange,
        composition: Option<TextRange>,
        single_line: bool,
        reply_to_request: bool,
    ) {
        let state =
            TextInputState::new(text, selection, composition, single_line, reply_to_request);
        debug!(%state, "update state");
        *self.cached() = Some(state.clone());
        self.inner.queue.put(state);
        if !reply_to_request {
            self.post_to_ime("process_pending_input_states", |b| {
                b.process_pending_input_states()
            });
        }
    }

    /// Push the sentinel: a reader blocked now, or the next one to block,
    /// returns "unavailable". If nobody is waiting the sentinel is discarded
    /// by the next drain.
    pub fn unblock_on_ui_thread(&self) {
        debug!("unblock");
        self.inner.queue.put(TextInputState::unblocker());
        self.post_to_ime("process_pending_input_states", |b| {
            b.process_pending_input_states()
        });
    }

    pub fn on_restart_input_on_ui_thread(&self) {}

    pub fn send_key_event_on_ui_thread(&self, event: KeyEvent) -> bool {
        self.post_to_ime("send_key_event", move |b| {
            b.send_key_event(event);
        });
        true
    }

    pub fn move_cursor_to_selection_end_on_ui_thread(&self) {
        self.post_to_ime("move_cursor_to_selection_end", |b| {
            let Some(state) = b.request_and_wait_for_text_input_state() else {
                return;
            };
            let end = offset_to_i32(state.selection().end);
            b.set_selection(end, end);
        });
    }

    /// Send a composing update. With `is_pending_accent` the current dead-key
    /// accent travels along with the text.
    pub fn update_composing_text(
        &self,
        text: &str,
        new_cursor_position: i32,
        is_pending_accent: bool,
    ) -> bool {
        let text = text.to_string();
        self.post_to_ui("update_composing_text", move |b| {
            b.compose_on_ui_thread(&text, new_cursor_position, is_pending_accent);
        });
        self.notify_user_action();
        true
    }

    #[cfg(test)]
    pub(crate) fn set_combining_accent_on_ui_thread(&self, pending_accent: u32) {
        self.inner
            .pending_accent
            .store(pending_accent, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn pending_accent(&self) -> u32 {
        self.pending()
    }

    #[cfg(test)]
    pub(crate) fn batch_edit_depth(&self) -> usize {
        self.inner.batch_edits.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn queue(&self) -> &StateQueue {
        &self.inner.queue
    }

    fn notify_user_action(&self) {
        self.post_to_ui("notify_user_action", |b| {
            b.with_sink("notify_user_action", |sink| sink.notify_user_action());
        });
    }

    fn request_state_update_on_ui_thread(&self) {
        let expected = self
            .with_sink("request_state_update", |sink| sink.request_state_update())
            .unwrap_or(false);
        if !expected {
            self.unblock_on_ui_thread();
        }
    }

    // -----------------------------------------------------------------------
    // IME thread internals
    // -----------------------------------------------------------------------

    fn assert_on_ime_thread(&self) {
        assert!(
            self.inner.dispatch.on_ime_thread(),
            "input connection state accessed off the IME thread"
        );
    }

    fn process_pending_input_states(&self) {
        self.assert_on_ime_thread();
        while let Some(state) = self.inner.queue.poll() {
            if state.should_unblock() {
                debug!("ignoring unused unblocker");
                continue;
            }
            self.update_selection(&state);
        }
    }

    fn update_selection(&self, state: &TextInputState) {
        self.assert_on_ime_thread();
        if self.inner.batch_edits.load(Ordering::SeqCst) != 0 {
            self.inner.selection_dirty.store(true, Ordering::SeqCst);
            return;
        }
        self.inner.selection_dirty.store(false, Ordering::SeqCst);
        let (selection, composition) = (state.selection(), state.composition());
        borrow_slot(&self.inner.listener, |listener| {
            listener.update_selection(selection, composition)
        });
    }

    fn request_and_wait_for_text_input_state(&self) -> Option<TextInputState> {
        let _span = debug_span!("request_and_wait_for_text_input_state").entered();
        if self.inner.dispatch.on_ui_thread() {
            if !self.inner.reads.cached_fallback_on_ui_thread {
                warn!("InputConnection read called on UI thread, no fallback configured");
                return None;
            }
            warn!("InputConnection read called on UI thread, returning cached state");
            return self.cached().clone();
        }
        self.assert_on_ime_thread();
        let requested = self.post_to_ui("request_state_update", |b| {
            b.request_state_update_on_ui_thread()
        });
        if !requested {
            return None;
        }
        self.block_and_get_state_update()
    }

    /// Block until the requested reply or the sentinel arrives. Unsolicited
    /// states seen meanwhile are superseded by the reply but mark the
    /// selection as needing delivery.
    fn block_and_get_state_update(&self) -> Option<TextInputState> {
        self.assert_on_ime_thread();
        loop {
            let state = self.inner.queue.take();
            if state.should_unblock() {
                debug!("blocking read unblocked");
                return None;
            }
            if state.reply_to_request() {
                if self.inner.selection_dirty.load(Ordering::SeqCst) {
                    self.update_selection(&state);
                }
                debug!(remaining = self.inner.queue.len(), "blocking read answered");
                return Some(state);
            }
            self.inner.selection_dirty.store(true, Ordering::SeqCst);
        }
    }
}

fn offset_to_i32(offset: usize) -> i32 {
    i32::try_from(offset).unwrap_or(i32::MAX)
}

impl InputConnection for InputBridge {
    fn set_composing_text(&self, text: Option<&str>, new_cursor_position: i32) -> bool {
        debug!(?text, new_cursor_position, "set_composing_text");
        let Some(text) = text else { return false };
        self.update_composing_text(text, new_cursor_position, false)
    }

    fn commit_text(&self, text: Option<&str>, new_cursor_position: i32) -> bool {
        debug!(?text, new_cursor_position, "commit_text");
        let Some(text) = text else { return false };
        let text = text.to_string();
        self.post_to_ui("commit_text", move |b| {
            b.commit_on_ui_thread(&text, new_cursor_position);
        });
        self.notify_user_action();
        true
    }

    fn finish_composing_text(&self) -> bool {
        debug!("finish_composing_text");
        // May be called on the UI thread as well; it always goes through the queue.
        self.post_to_ui("finish_composing_text", |b| b.finish_composing_on_ui_thread());
        true
    }

    fn delete_surrounding_text(&self, before_length: i32, after_length: i32) -> bool {
        debug!(before_length, after_length, "delete_surrounding_text");
        self.post_to_ui("delete_surrounding_text", move |b| {
            if b.pending() != 0 {
                b.finish_composing_on_ui_thread();
            }
            b.with_sink("delete_surrounding_text", |sink| {
                sink.delete_surrounding_text(before_length, after_length)
            });
        });
        true
    }

    fn delete_surrounding_text_in_code_points(
        &self,
        _before_length: i32,
        _after_length: i32,
    ) -> bool {
        false
    }

    fn set_selection(&self, start: i32, end: i32) -> bool {
        debug!(start, end, "set_selection");
        self.post_to_ui("set_selection", move |b| {
            b.cancel_combining_accent();
            b.with_sink("set_selection", |sink| sink.set_selection(start, end));
        });
        true
    }

    fn set_composing_region(&self, start: i32, end: i32) -> bool {
        debug!(start, end, "set_composing_region");
        self.post_to_ui("set_composing_region", move |b| {
            b.cancel_combining_accent();
            b.with_sink("set_composing_region", |sink| {
                sink.set_composing_region(start, end)
            });
        });
        true
    }

    fn send_key_event(&self, event: KeyEvent) -> bool {
        debug!(?event, "send_key_event");
        let combine = self.inner.accent.combine_dead_keys;
        self.post_to_ui("send_key_event", move |b| {
            if combine && b.handle_combining_accent(&event) {
                return;
            }
            // A raw key-down is an edit of its own; the accent no longer applies.
            if event.is_down() {
                b.cancel_combining_accent();
            }
            b.with_sink("send_key_event", |sink| sink.send_key_event(&event));
        });
        self.notify_user_action();
        true
    }

    fn perform_editor_action(&self, action_code: i32) -> bool {
        debug!(action_code, "perform_editor_action");
        self.post_to_ui("perform_editor_action", move |b| {
            b.cancel_combining_accent();
            b.with_sink("perform_editor_action", |sink| {
                sink.perform_editor_action(action_code)
            });
        });
        true
    }

    fn perform_context_menu_action(&self, id: i32) -> bool {
        debug!(id, "perform_context_menu_action");
        self.post_to_ui("perform_context_menu_action", move |b| {
            b.cancel_combining_accent();
            b.with_sink("perform_context_menu_action", |sink| {
                sink.perform_context_menu_action(id)
            });
        });
        true
    }

    fn begin_batch_edit(&self) -> bool {
        self.assert_on_ime_thread();
        let depth = self.inner.batch_edits.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(depth, "begin_batch_edit");
        true
    }

    fn end_batch_edit(&self) -> bool {
        self.assert_on_ime_thread();
        let depth = self.inner.batch_edits.load(Ordering::SeqCst);
        if depth == 0 {
            return false;
        }
        let depth = depth - 1;
        self.inner.batch_edits.store(depth, Ordering::SeqCst);
        debug!(depth, "end_batch_edit");
        if depth == 0 {
            // The reply delivers the selection if anything was held back.
            self.request_and_wait_for_text_input_state();
        }
        depth != 0
    }

    fn get_text_before_cursor(&self, max_chars: usize, flags: u32) -> Option<String> {
        debug!(max_chars, flags, "get_text_before_cursor");
        let state = self.request_and_wait_for_text_input_state()?;
        Some(state.text_before_selection(max_chars))
    }

    fn get_text_after_cursor(&self, max_chars: usize, flags: u32) -> Option<String> {
        debug!(max_chars, flags, "get_text_after_cursor");
        let state = self.request_and_wait_for_text_input_state()?;
        Some(state.text_after_selection(max_chars))
    }

    fn get_selected_text(&self, flags: u32) -> Option<String> {
        debug!(flags, "get_selected_text");
        self.request_and_wait_for_text_input_state()?.selected_text()
    }

    fn get_cursor_caps_mode(&self, req_modes: u32) -> u32 {
        let result = self
            .request_and_wait_for_text_input_state()
            .map(|state| cursor_caps_mode(state.text(), state.selection().start, req_modes))
            .unwrap_or(0);
        debug!(req_modes, result, "get_cursor_caps_mode");
        result
    }

    fn get_extracted_text(&self, flags: u32) -> Option<ExtractedText> {
        debug!(flags, "get_extracted_text");
        let state = self.request_and_wait_for_text_input_state()?;
        Some(ExtractedText::from(&state))
    }

    fn request_cursor_updates(&self, cursor_update_mode: i32) -> bool {
        debug!(cursor_update_mode, "request_cursor_updates");
        self.post_to_ui("request_cursor_updates", move |b| {
            b.with_sink("request_cursor_updates", |sink| {
                sink.on_request_cursor_updates(cursor_update_mode)
            });
        });
        true
    }

    fn commit_completion(&self, text: &str) -> bool {
        debug!(text, "commit_completion");
        false
    }

    fn commit_correction(&self, old_text: &str, new_text: &str, offset: i32) -> bool {
        debug!(old_text, new_text, offset, "commit_correction");
        false
    }

    fn clear_meta_key_states(&self, states: u32) -> bool {
        debug!(states, "clear_meta_key_states");
        false
    }

    fn report_fullscreen_mode(&self, enabled: bool) -> bool {
        // Fullscreen extraction is not supported; may be called on the UI thread.
        debug!(enabled, "report_fullscreen_mode");
        false
    }

    fn perform_private_command(&self, action: &str) -> bool {
        debug!(action, "perform_private_command");
        false
    }

    fn close_connection(&self) {
        debug!("close_connection");
    }
}
