//! Unbounded FIFO blocking queue carrying [`TextInputState`] from the UI
//! thread to the IME thread.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::text_input_state::TextInputState;

/// Producers never block; `take` blocks until an entry is available.
///
/// The lock only ever guards `VecDeque` operations, so a poisoned lock still
/// holds a consistent queue and is recovered rather than propagated.
#[derive(Debug, Default)]
pub struct StateQueue {
    entries: Mutex<VecDeque<TextInputState>>,
    available: Condvar,
}

impl StateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `state` at the tail and wake one waiter.
    pub fn put(&self, state: TextInputState) {
        let mut entries = self.lock();
        entries.push_back(state);
        self.available.notify_one();
    }

    /// Remove and return the head, blocking while the queue is empty.
    pub fn take(&self) -> TextInputState {
        let mut entries = self.lock();
        loop {
            if let Some(state) = entries.pop_front() {
                return state;
            }
            entries = self
                .available
                .wait(entries)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Remove and return the head without blocking.
    pub fn poll(&self) -> Option<TextInputState> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<TextInputState>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
