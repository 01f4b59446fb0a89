//! Building blocks for the threaded input bridge: text snapshots, the state
//! queue, the two-thread dispatch layer, key events and accent handling.

pub mod accent;
pub mod caps_mode;
pub mod dispatch;
pub mod extracted_text;
pub mod key_event;
pub mod settings;
pub mod state_queue;
pub mod text_input_state;

pub use dispatch::{DispatchError, DispatchLayer, Task, TaskRunner, ThreadTaskRunner};
pub use extracted_text::ExtractedText;
pub use key_event::{KeyAction, KeyEvent};
pub use state_queue::StateQueue;
pub use text_input_state::{TextInputState, TextRange};
