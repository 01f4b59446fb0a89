//! Threaded input bridge.
//!
//! An input method running on its own thread drives an [`InputConnection`];
//! [`InputBridge`] forwards edits to the editor on the UI thread and answers
//! reads by blocking until the editor reports its state.

mod bridge;
pub mod editor;
mod input_connection;
mod sink;
mod trace_init;

#[cfg(test)]
mod tests;

pub use bridge::{InputBridge, StatePublisher};
pub use input_connection::InputConnection;
pub use sink::{CompositionSink, SelectionListener};
pub use trace_init::init_tracing;

pub use ime_core::{ExtractedText, KeyAction, KeyEvent, TextInputState, TextRange};
