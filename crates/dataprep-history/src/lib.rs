/// Undo/redo history for preparation editing sessions.
///
/// Provides a `HistoryManager` that keeps two stacks of reversible actions
/// (done and undone) and runs caller-supplied, possibly asynchronous undo and
/// redo operations one at a time. A failed operation puts its action back
/// where it came from so it can be retried.
pub mod action;
pub mod config;
pub mod error;
pub mod manager;

pub use action::{FnAction, Reversible};
pub use config::HistoryConfig;
pub use error::{Direction, HistoryError};
pub use manager::{HistoryManager, Outcome};
