//! WebSocket streaming of commit progress.

mod progress;

pub use progress::{progress_message, progress_ws_handler};
