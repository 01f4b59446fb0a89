use proptest::prelude::*;

use ime_core::TextRange;

use super::Harness;
use crate::editor::{SelectionUpdate, SinkCall};
use crate::InputConnection;

#[test]
fn test_nested_batch_edits() {
    let h = Harness::new("");
    let (first, second, third) = h.ime(|b| {
        b.begin_batch_edit();
        b.begin_batch_edit();
        let first = b.end_batch_edit();
        let second = b.end_batch_edit();
        let third = b.end_batch_edit();
        (first, second, third)
    });
    assert!(first, "outer batch is still open");
    assert!(!second);
    assert!(!third, "ending without an open batch");
    assert_eq!(h.bridge.batch_edit_depth(), 0);
}

#[test]
fn test_selection_held_back_during_batch() {
    let h = Harness::new("");
    h.ime(|b| {
        b.begin_batch_edit();
        b.commit_text(Some("a"), 1);
        b.commit_text(Some("b"), 1);
    });
    h.settle();
    assert!(h.selections.updates().is_empty());

    assert!(!h.ime(|b| b.end_batch_edit()));
    assert_eq!(
        h.selections.take(),
        vec![SelectionUpdate {
            selection: TextRange::caret(2),
            composition: None,
        }]
    );
    h.settle();
    assert!(h.selections.updates().is_empty());
}

#[test]
fn test_clean_batch_requests_state_without_flush() {
    let h = Harness::new("abc");
    let open = h.ime(|b| {
        b.begin_batch_edit();
        b.end_batch_edit()
    });
    assert!(!open);
    assert!(h
        .log
        .contains(&SinkCall::RequestStateUpdate { answered: true }));
    h.settle();
    assert!(h.selections.updates().is_empty());
}

#[test]
fn test_selection_delivered_outside_batch() {
    let h = Harness::new("abc");
    h.ime(|b| b.set_selection(0, 3));
    h.settle();
    assert_eq!(
        h.selections.take(),
        vec![SelectionUpdate {
            selection: TextRange::new(0, 3),
            composition: None,
        }]
    );
}

#[test]
fn test_reset_clears_batch_depth() {
    let h = Harness::new("");
    h.ime(|b| {
        b.begin_batch_edit();
        b.begin_batch_edit();
    });
    h.ui(|b| b.reset_on_ui_thread());
    assert_eq!(h.bridge.batch_edit_depth(), 0);
    assert!(!h.ime(|b| b.end_batch_edit()));
}

#[test]
#[should_panic(expected = "off the IME thread")]
fn test_batch_edit_off_ime_thread_panics() {
    let h = Harness::new("");
    h.bridge.begin_batch_edit();
}

#[derive(Debug, Clone)]
enum Op {
    Begin,
    End,
    Commit(char),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Begin),
        3 => Just(Op::End),
        2 => prop::sample::select(vec!['a', 'b', 'c']).prop_map(Op::Commit),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_batch_depth_tracks_model(ops in prop::collection::vec(arb_op(), 1..12)) {
        let h = Harness::new("");
        let mut depth = 0usize;
        for op in ops {
            match op {
                Op::Begin => {
                    if depth == 0 {
                        h.settle();
                        h.selections.take();
                    }
                    prop_assert!(h.ime(|b| b.begin_batch_edit()));
                    depth += 1;
                }
                Op::End => {
                    let open = h.ime(|b| b.end_batch_edit());
                    depth = depth.saturating_sub(1);
                    prop_assert_eq!(open, depth != 0);
                }
                Op::Commit(c) => {
                    h.ime(move |b| b.commit_text(Some(&c.to_string()), 1));
                }
            }
            prop_assert_eq!(h.bridge.batch_edit_depth(), depth);
        }
        h.settle();
        if depth > 0 {
            prop_assert!(h.selections.updates().is_empty());
        }
    }
}
