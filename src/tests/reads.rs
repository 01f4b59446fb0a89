use std::time::Duration;

use ime_core::caps_mode::{CAP_MODE_CHARACTERS, CAP_MODE_SENTENCES, CAP_MODE_WORDS};
use ime_core::extracted_text::FLAG_SINGLE_LINE;
use ime_core::TextRange;

use super::{default_settings, Harness};
use crate::editor::{RequestMode, SelectionUpdate, SinkCall};
use crate::InputConnection;

// --- Round trips ---

#[test]
fn test_text_before_and_after_cursor() {
    let h = Harness::new("hello world");
    h.ime(|b| b.set_selection(5, 5));
    h.settle();

    assert_eq!(h.ime(|b| b.get_text_before_cursor(3, 0)), Some("llo".into()));
    assert_eq!(h.ime(|b| b.get_text_after_cursor(100, 0)), Some(" world".into()));
    assert_eq!(h.ime(|b| b.get_selected_text(0)), None);
    assert!(h
        .log
        .contains(&SinkCall::RequestStateUpdate { answered: true }));
}

#[test]
fn test_selected_text() {
    let h = Harness::new("hello world");
    h.ime(|b| b.set_selection(6, 11));
    h.settle();
    assert_eq!(h.ime(|b| b.get_selected_text(0)), Some("world".into()));
}

#[test]
fn test_read_sees_preceding_writes() {
    let h = Harness::new("");
    let before = h.ime(|b| {
        b.commit_text(Some("abc"), 1);
        b.get_text_before_cursor(10, 0)
    });
    assert_eq!(before, Some("abc".into()));
}

#[test]
fn test_extracted_text() {
    let h = Harness::new("one two");
    let extracted = h.ime(|b| b.get_extracted_text(0)).unwrap();
    assert_eq!(extracted.text, "one two");
    assert_eq!(extracted.selection_start, 7);
    assert_eq!(extracted.selection_end, 7);
    assert_eq!(extracted.partial_end_offset, 7);
    assert_eq!(extracted.flags & FLAG_SINGLE_LINE, 0);
}

#[test]
fn test_cursor_caps_mode() {
    let all = CAP_MODE_CHARACTERS | CAP_MODE_WORDS | CAP_MODE_SENTENCES;

    let h = Harness::new("");
    assert_eq!(h.ime(move |b| b.get_cursor_caps_mode(all)), all);

    let h = Harness::new("Done. ");
    assert_eq!(
        h.ime(move |b| b.get_cursor_caps_mode(all)),
        CAP_MODE_CHARACTERS | CAP_MODE_SENTENCES
    );

    let h = Harness::new("in the middle of a");
    assert_eq!(
        h.ime(move |b| b.get_cursor_caps_mode(all)),
        CAP_MODE_CHARACTERS
    );
}

// --- Deferred replies ---

#[test]
fn test_deferred_reply_supersedes_incidental_state() {
    let h = Harness::with(RequestMode::Defer, "abc");
    let pending = h.ime_async(|b| b.get_text_before_cursor(10, 0));
    h.wait_for_request();
    assert!(pending.try_recv().is_err());

    // An unrelated edit lands while the reader is blocked.
    h.publish("abcd", TextRange::caret(4), false);
    assert!(pending.recv_timeout(Duration::from_millis(50)).is_err());

    h.publish("abcde", TextRange::caret(5), true);
    let text = pending.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(text, Some("abcde".into()));

    h.settle();
    // The incidental state was only flushed once, as the reply's selection.
    assert_eq!(
        h.selections.take(),
        vec![SelectionUpdate {
            selection: TextRange::caret(5),
            composition: None,
        }]
    );
}

#[test]
fn test_reply_without_incidental_state_skips_selection_flush() {
    let h = Harness::with(RequestMode::Defer, "abc");
    let pending = h.ime_async(|b| b.get_text_before_cursor(10, 0));
    h.wait_for_request();
    h.publish("abc", TextRange::caret(1), true);
    assert_eq!(
        pending.recv_timeout(Duration::from_secs(5)).unwrap(),
        Some("a".into())
    );
    h.settle();
    assert!(h.selections.updates().is_empty());
}

// --- Unblocking ---

#[test]
fn test_refused_request_reads_unavailable() {
    let h = Harness::with(RequestMode::Refuse, "abc");
    assert_eq!(h.ime(|b| b.get_text_before_cursor(10, 0)), None);
    assert_eq!(h.ime(|b| b.get_extracted_text(0)), None);
    assert_eq!(h.ime(|b| b.get_cursor_caps_mode(CAP_MODE_CHARACTERS)), 0);
    assert!(h
        .log
        .contains(&SinkCall::RequestStateUpdate { answered: false }));
    h.settle();
    assert!(h.bridge.queue().is_empty());
}

#[test]
fn test_unblock_releases_waiting_reader() {
    let h = Harness::with(RequestMode::Defer, "abc");
    let pending = h.ime_async(|b| b.get_text_after_cursor(10, 0));
    h.wait_for_request();
    h.ui(|b| b.unblock_on_ui_thread());
    assert_eq!(pending.recv_timeout(Duration::from_secs(5)).unwrap(), None);
}

#[test]
fn test_unblock_without_reader_is_drained() {
    let h = Harness::new("abc");
    h.ui(|b| b.unblock_on_ui_thread());
    h.settle();
    assert!(h.bridge.queue().is_empty());

    // The stale sentinel must not answer the next read.
    assert_eq!(h.ime(|b| b.get_text_before_cursor(10, 0)), Some("abc".into()));
}

#[test]
fn test_detach_releases_waiting_reader() {
    let h = Harness::with(RequestMode::Defer, "abc");
    let pending = h.ime_async(|b| b.get_text_before_cursor(10, 0));
    h.wait_for_request();
    h.ui(|b| b.detach());
    assert_eq!(pending.recv_timeout(Duration::from_secs(5)).unwrap(), None);
}

#[test]
fn test_read_without_sink_is_unavailable() {
    let h = Harness::new("abc");
    h.ui(|b| b.detach());
    h.settle();
    assert_eq!(h.ime(|b| b.get_text_before_cursor(10, 0)), None);
}

// --- Reads on the UI thread ---

#[test]
fn test_ui_thread_read_returns_last_reported_state() {
    let h = Harness::new("cached");
    h.ime(|b| b.commit_text(Some("!"), 1));
    h.settle();
    h.log.take();

    let text = h.ui(|b| b.get_text_before_cursor(100, 0));
    assert_eq!(text, Some("cached!".into()));
    // Answered locally, the editor was never asked.
    assert!(h.log.calls().is_empty());
}

#[test]
fn test_ui_thread_read_without_fallback() {
    let mut settings = default_settings();
    settings.reads.cached_fallback_on_ui_thread = false;
    let h = Harness::with_settings(RequestMode::Answer, "cached", &settings);
    assert_eq!(h.ui(|b| b.get_text_before_cursor(100, 0)), None);
    assert_eq!(h.ui(|b| b.get_cursor_caps_mode(CAP_MODE_CHARACTERS)), 0);
    // The IME thread still reads normally.
    assert_eq!(h.ime(|b| b.get_text_before_cursor(100, 0)), Some("cached".into()));
}

#[test]
#[should_panic(expected = "off the IME thread")]
fn test_read_off_both_threads_panics() {
    let h = Harness::new("abc");
    let _ = h.bridge.get_text_before_cursor(1, 0);
}
