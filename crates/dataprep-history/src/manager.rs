/// Undo/redo manager over two stacks of reversible actions.
///
/// Actions that have been performed live in the done stack (most recent at
/// the back). Actions taken back by `undo` live in the undone stack (next
/// redo candidate at the front). At most one undo or redo runs at a time;
/// while one is in flight both `can_undo` and `can_redo` report false.
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::action::{FnAction, Reversible};
use crate::config::HistoryConfig;
use crate::error::{Direction, HistoryError};

type FailureListener = Arc<dyn Fn(&HistoryError) + Send + Sync>;

/// How an `undo` or `redo` call ended.
///
/// Callers that only care about the history state can ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do, or another operation was already in flight.
    Skipped,
    /// The action completed and moved to the other stack.
    Applied,
    /// The action failed and went back to the stack it came from.
    Restored,
}

/// A recorded action plus the sequence number used in logs.
#[derive(Clone)]
struct Entry {
    seq: u64,
    action: Arc<dyn Reversible>,
}

struct State {
    /// Performed actions, oldest first.
    done: VecDeque<Entry>,
    /// Undone actions, most recently undone first.
    undone: VecDeque<Entry>,
    undoing: bool,
    redoing: bool,
    /// Next sequence number to assign.
    next_seq: u64,
    max_depth: Option<usize>,
    listener: Option<FailureListener>,
}

impl State {
    fn is_performing(&self) -> bool {
        self.undoing || self.redoing
    }

    fn can_undo(&self) -> bool {
        !self.done.is_empty() && !self.is_performing()
    }

    fn can_redo(&self) -> bool {
        !self.undone.is_empty() && !self.is_performing()
    }

    fn enforce_depth(&mut self) {
        let Some(max) = self.max_depth else {
            return;
        };
        while self.done.len() > max {
            if let Some(evicted) = self.done.pop_front() {
                tracing::debug!("Evicted action #{} from history", evicted.seq);
            }
        }
    }

    /// Takes the next action off its stack and marks the manager busy.
    fn begin(&mut self, direction: Direction) -> Option<Entry> {
        match direction {
            Direction::Undo => {
                if !self.can_undo() {
                    return None;
                }
                let entry = self.done.pop_back()?;
                self.undoing = true;
                Some(entry)
            }
            Direction::Redo => {
                if !self.can_redo() {
                    return None;
                }
                let entry = self.undone.pop_front()?;
                self.redoing = true;
                Some(entry)
            }
        }
    }

    /// Moves `entry` to its destination (or back to its origin) and clears
    /// the busy flag.
    ///
    /// Always settles into the current stacks, including after a `clear`
    /// that ran while the action was in flight.
    fn settle(&mut self, direction: Direction, entry: Entry, succeeded: bool) -> Outcome {
        match direction {
            Direction::Undo => self.undoing = false,
            Direction::Redo => self.redoing = false,
        }

        match (direction, succeeded) {
            (Direction::Undo, true) => {
                self.undone.push_front(entry);
                Outcome::Applied
            }
            (Direction::Undo, false) => {
                self.done.push_back(entry);
                Outcome::Restored
            }
            (Direction::Redo, true) => {
                self.done.push_back(entry);
                self.enforce_depth();
                Outcome::Applied
            }
            (Direction::Redo, false) => {
                self.undone.push_front(entry);
                Outcome::Restored
            }
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    // The state is consistent between statements, so a poisoned lock is still usable.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An undo or redo between taking the action off its stack and settling it.
///
/// Settling happens on drop if the operation never reports a result, so the
/// busy flag is cleared and the action restored even when the future is
/// dropped early or the action panics.
struct InFlight {
    state: Arc<Mutex<State>>,
    direction: Direction,
    entry: Option<Entry>,
}

impl InFlight {
    fn settle(&mut self, result: Result<(), HistoryError>) -> Outcome {
        let Some(entry) = self.entry.take() else {
            return Outcome::Skipped;
        };
        let seq = entry.seq;

        let (outcome, listener) = {
            let mut state = lock(&self.state);
            let outcome = state.settle(self.direction, entry, result.is_ok());
            (outcome, state.listener.clone())
        };

        match result {
            Ok(()) => tracing::debug!("{} of action #{seq} completed: {outcome:?}", self.direction),
            Err(err) => {
                tracing::warn!("{err} ({outcome:?})");
                if let Some(listener) = listener {
                    listener(&err);
                }
            }
        }
        outcome
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(seq) = self.entry.as_ref().map(|e| e.seq) {
            self.settle(Err(HistoryError::Interrupted {
                direction: self.direction,
                seq,
            }));
        }
    }
}

/// Runs one side of `action`, bounded by `timeout` if given.
async fn execute(
    action: Arc<dyn Reversible>,
    direction: Direction,
    seq: u64,
    timeout: Option<Duration>,
) -> Result<(), HistoryError> {
    let run = async {
        match direction {
            Direction::Undo => action.undo().await,
            Direction::Redo => action.redo().await,
        }
    };

    let result = match timeout {
        Some(after) => match tokio::time::timeout(after, run).await {
            Ok(result) => result,
            Err(_) => {
                return Err(HistoryError::TimedOut {
                    direction,
                    seq,
                    after,
                })
            }
        },
        None => run.await,
    };

    result.map_err(|source| HistoryError::ActionFailed {
        direction,
        seq,
        source,
    })
}

/// Undo/redo history for one editing session.
///
/// Cloning yields another handle to the same history, so the state can be
/// queried while an operation is being awaited elsewhere. Separately
/// constructed managers never share state.
#[derive(Clone)]
pub struct HistoryManager {
    state: Arc<Mutex<State>>,
    action_timeout: Option<Duration>,
}

impl std::fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("HistoryManager")
            .field("done_len", &state.done.len())
            .field("undone_len", &state.undone.len())
            .field("undoing", &state.undoing)
            .field("redoing", &state.redoing)
            .field("next_seq", &state.next_seq)
            .field("action_timeout", &self.action_timeout)
            .finish()
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryManager {
    /// Creates an empty manager with default config (no timeout, no depth cap).
    pub fn new() -> Self {
        Self::with_config(HistoryConfig::default())
    }

    /// Creates an empty manager with the given config.
    pub fn with_config(mut config: HistoryConfig) -> Self {
        config.sanitize();
        Self {
            state: Arc::new(Mutex::new(State {
                done: VecDeque::new(),
                undone: VecDeque::new(),
                undoing: false,
                redoing: false,
                next_seq: 0,
                max_depth: config.max_depth,
                listener: None,
            })),
            action_timeout: config.action_timeout(),
        }
    }

    /// Records an action built from an undo closure and a redo closure.
    ///
    /// Discards everything in the undone stack.
    pub fn add_action<U, UF, R, RF>(&self, undo: U, redo: R)
    where
        U: Fn() -> UF + Send + Sync + 'static,
        UF: Future<Output = anyhow::Result<()>> + Send + 'static,
        R: Fn() -> RF + Send + Sync + 'static,
        RF: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push(FnAction::new(undo, redo));
    }

    /// Records a performed action.
    ///
    /// Discards everything in the undone stack.
    pub fn push<A: Reversible + 'static>(&self, action: A) {
        let mut state = lock(&self.state);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.done.push_back(Entry {
            seq,
            action: Arc::new(action),
        });
        let discarded = state.undone.len();
        state.undone.clear();
        state.enforce_depth();
        tracing::debug!("Recorded action #{seq} ({discarded} undone actions discarded)");
    }

    /// Empties both stacks.
    ///
    /// The busy flags are left alone. An operation still in flight clears
    /// its own flag when it completes and settles its action into the
    /// emptied stacks.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.done.clear();
        state.undone.clear();
        tracing::debug!("History cleared");
    }

    /// Registers a listener called whenever an undo or redo fails.
    ///
    /// Replaces any previous listener. Failures never surface through
    /// `undo`/`redo` themselves.
    pub fn on_failure<F>(&self, listener: F)
    where
        F: Fn(&HistoryError) + Send + Sync + 'static,
    {
        lock(&self.state).listener = Some(Arc::new(listener));
    }

    /// Whether an undo can start now.
    pub fn can_undo(&self) -> bool {
        lock(&self.state).can_undo()
    }

    /// Whether a redo can start now.
    pub fn can_redo(&self) -> bool {
        lock(&self.state).can_redo()
    }

    pub fn is_undoing(&self) -> bool {
        lock(&self.state).undoing
    }

    pub fn is_redoing(&self) -> bool {
        lock(&self.state).redoing
    }

    /// Whether an undo or redo is in flight.
    pub fn is_busy(&self) -> bool {
        lock(&self.state).is_performing()
    }

    /// Number of actions that can be undone.
    pub fn done_len(&self) -> usize {
        lock(&self.state).done.len()
    }

    /// Number of actions that can be redone.
    pub fn undone_len(&self) -> usize {
        lock(&self.state).undone.len()
    }

    /// Undoes the most recent action.
    ///
    /// The action is taken off the done stack and the manager marked busy
    /// when this is called, before the returned future is first polled. The
    /// future resolves once the action's undo completes: on success the
    /// action becomes the next redo candidate, on failure it goes back on
    /// the done stack. Returns `Outcome::Skipped` without running anything if
    /// `can_undo` is false.
    pub fn undo(&self) -> impl Future<Output = Outcome> + Send + 'static {
        self.perform(Direction::Undo)
    }

    /// Redoes the most recently undone action.
    ///
    /// Mirrors `undo`: on success the action goes back on the done stack, on
    /// failure it stays the next redo candidate.
    pub fn redo(&self) -> impl Future<Output = Outcome> + Send + 'static {
        self.perform(Direction::Redo)
    }

    fn perform(&self, direction: Direction) -> impl Future<Output = Outcome> + Send + 'static {
        let flight = {
            let mut state = lock(&self.state);
            state.begin(direction).map(|entry| InFlight {
                state: Arc::clone(&self.state),
                direction,
                entry: Some(entry),
            })
        };
        let timeout = self.action_timeout;

        async move {
            let Some(mut flight) = flight else {
                tracing::debug!("Nothing to {direction}, or an operation is in flight");
                return Outcome::Skipped;
            };
            let (seq, action) = match flight.entry.as_ref() {
                Some(entry) => (entry.seq, Arc::clone(&entry.action)),
                None => return Outcome::Skipped,
            };

            tracing::debug!("Running {direction} of action #{seq}");
            let result = execute(action, direction, seq, timeout).await;
            flight.settle(result)
        }
    }
}
