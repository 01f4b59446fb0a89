mod batch_edit;
mod reads;

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use ime_core::settings::{parse_settings_toml, Settings, DEFAULT_SETTINGS_TOML};
use ime_core::{DispatchLayer, TextRange};

use crate::editor::{EditorLog, MemoryEditor, RequestMode, SelectionLog, SinkCall};
use crate::{InputBridge, StatePublisher};

pub(super) fn default_settings() -> Settings {
    parse_settings_toml(DEFAULT_SETTINGS_TOML).unwrap()
}

/// A bridge wired to a [`MemoryEditor`] on freshly spawned UI and IME threads.
pub(super) struct Harness {
    pub bridge: InputBridge,
    pub dispatch: DispatchLayer,
    pub log: EditorLog,
    pub selections: SelectionLog,
}

impl Harness {
    pub fn new(text: &str) -> Self {
        Self::with(RequestMode::Answer, text)
    }

    pub fn with(mode: RequestMode, text: &str) -> Self {
        Self::with_settings(mode, text, &default_settings())
    }

    pub fn with_settings(mode: RequestMode, text: &str, settings: &Settings) -> Self {
        let dispatch = DispatchLayer::spawn(&settings.dispatch).unwrap();
        let bridge = InputBridge::with_settings(dispatch.clone(), settings);
        let log = EditorLog::default();
        let selections = SelectionLog::default();
        let editor = MemoryEditor::new(bridge.publisher(), log.clone())
            .with_text(text)
            .with_request_mode(mode);

        let h = Self {
            bridge,
            dispatch,
            log,
            selections,
        };
        let b = h.bridge.clone();
        let listener = h.selections.clone();
        h.ui(move |_| {
            editor.publish(false);
            b.attach(Box::new(editor), Box::new(listener));
        });
        h.settle();
        h.log.take();
        h.selections.take();
        h
    }

    /// Run `f` on the IME thread and wait for it.
    pub fn ime<R, F>(&self, f: F) -> R
    where
        R: Send + 'static,
        F: FnOnce(&InputBridge) -> R + Send + 'static,
    {
        let b = self.bridge.clone();
        self.dispatch.call_on_ime(move || f(&b)).unwrap()
    }

    /// Start `f` on the IME thread without waiting; the result arrives on the
    /// returned channel.
    pub fn ime_async<R, F>(&self, f: F) -> mpsc::Receiver<R>
    where
        R: Send + 'static,
        F: FnOnce(&InputBridge) -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let b = self.bridge.clone();
        self.dispatch
            .post_to_ime(move || {
                let _ = tx.send(f(&b));
            })
            .unwrap();
        rx
    }

    /// Run `f` on the UI thread and wait for it.
    pub fn ui<R, F>(&self, f: F) -> R
    where
        R: Send + 'static,
        F: FnOnce(&InputBridge) -> R + Send + 'static,
    {
        let b = self.bridge.clone();
        self.dispatch.call_on_ui(move || f(&b)).unwrap()
    }

    /// Publish a state from the UI thread as the host editor would.
    pub fn publish(&self, text: &str, selection: TextRange, reply_to_request: bool) {
        let publisher: StatePublisher = self.bridge.publisher();
        let text = text.to_string();
        self.ui(move |_| {
            publisher.update_state_on_ui_thread(text, selection, None, false, reply_to_request)
        });
    }

    /// Wait until the editor has been asked for a state update.
    pub fn wait_for_request(&self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self
            .log
            .calls()
            .iter()
            .any(|c| matches!(c, SinkCall::RequestStateUpdate { .. }))
        {
            assert!(Instant::now() < deadline, "no state request reached the editor");
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Let every task bouncing between the two threads run to completion.
    pub fn settle(&self) {
        for _ in 0..3 {
            self.ui(|_| ());
            self.ime(|_| ());
        }
    }

    /// Text of the last state the editor reported.
    pub fn text(&self) -> String {
        self.settle();
        self.bridge
            .last_reported_state()
            .map(|s| s.text().to_string())
            .unwrap_or_default()
    }

    pub fn compositions(&self) -> Vec<SinkCall> {
        self.log
            .calls()
            .into_iter()
            .filter(|c| matches!(c, SinkCall::SendComposition { .. }))
            .collect()
    }
}
