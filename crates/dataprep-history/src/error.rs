/// Failures reported when an undo or redo operation does not complete.
use std::fmt;
use std::time::Duration;

/// Which side of an action was being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Undo,
    Redo,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Undo => f.write_str("undo"),
            Direction::Redo => f.write_str("redo"),
        }
    }
}

/// Why an in-flight action did not complete.
///
/// These never escape `HistoryManager::undo`/`redo`. They are logged and
/// handed to the failure listener, if one is registered.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// The action's future resolved to an error.
    #[error("{direction} of action #{seq} failed: {source}")]
    ActionFailed {
        direction: Direction,
        seq: u64,
        #[source]
        source: anyhow::Error,
    },

    /// The action did not complete within the configured timeout.
    #[error("{direction} of action #{seq} timed out after {}ms", .after.as_millis())]
    TimedOut {
        direction: Direction,
        seq: u64,
        after: Duration,
    },

    /// The operation was dropped or the action panicked before it completed.
    #[error("{direction} of action #{seq} was interrupted")]
    Interrupted { direction: Direction, seq: u64 },
}

impl HistoryError {
    pub fn direction(&self) -> Direction {
        match self {
            HistoryError::ActionFailed { direction, .. }
            | HistoryError::TimedOut { direction, .. }
            | HistoryError::Interrupted { direction, .. } => *direction,
        }
    }

    /// Sequence number of the action that failed.
    pub fn seq(&self) -> u64 {
        match self {
            HistoryError::ActionFailed { seq, .. }
            | HistoryError::TimedOut { seq, .. }
            | HistoryError::Interrupted { seq, .. } => *seq,
        }
    }
}
