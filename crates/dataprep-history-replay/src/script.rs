/// Replay scripts: parsing and execution against an in-memory recipe.
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{bail, Result};
use dataprep_history::{HistoryConfig, HistoryManager, Outcome};
use serde::Deserialize;

/// A sequence of history operations.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One operation of a replay script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Appends `label` to the recipe and records it in the history.
    Add {
        label: String,
        #[serde(default)]
        fail_undo: bool,
        #[serde(default)]
        fail_redo: bool,
        /// Time the undo/redo takes to complete.
        #[serde(default)]
        delay_ms: u64,
    },
    Undo,
    Redo,
    Clear,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Add { label, .. } => write!(f, "add {label}"),
            Step::Undo => f.write_str("undo"),
            Step::Redo => f.write_str("redo"),
            Step::Clear => f.write_str("clear"),
        }
    }
}

type Recipe = Arc<Mutex<Vec<String>>>;

fn lock(recipe: &Recipe) -> MutexGuard<'_, Vec<String>> {
    recipe.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated backend call for one side of a recorded step.
async fn apply_side(
    recipe: Recipe,
    label: String,
    delay_ms: u64,
    fail: bool,
    remove: bool,
) -> Result<()> {
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    if fail {
        bail!("backend rejected step {label}");
    }
    let mut steps = lock(&recipe);
    if remove {
        match steps.iter().rposition(|s| *s == label) {
            Some(idx) => {
                steps.remove(idx);
            }
            None => bail!("step {label} not in recipe"),
        }
    } else {
        steps.push(label);
    }
    Ok(())
}

/// Replays steps against a recipe and its history.
pub struct Replay {
    history: HistoryManager,
    recipe: Recipe,
}

impl Replay {
    pub fn new(config: HistoryConfig) -> Self {
        let history = HistoryManager::with_config(config);
        history.on_failure(|err| tracing::info!("Replay step failed: {err}"));
        Self {
            history,
            recipe: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn recipe(&self) -> Vec<String> {
        lock(&self.recipe).clone()
    }

    /// Runs one step and returns a report line.
    pub async fn apply(&self, step: &Step) -> String {
        let outcome = match step {
            Step::Add {
                label,
                fail_undo,
                fail_redo,
                delay_ms,
            } => {
                self.record(label, *fail_undo, *fail_redo, *delay_ms);
                None
            }
            Step::Undo => Some(self.history.undo().await),
            Step::Redo => Some(self.history.redo().await),
            Step::Clear => {
                self.history.clear();
                None
            }
        };

        match outcome {
            Some(outcome) => format!("{step}: {} {:?}", describe(outcome), self.recipe()),
            None => format!("{step}: ok {:?}", self.recipe()),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "done={} undone={} recipe={:?}",
            self.history.done_len(),
            self.history.undone_len(),
            self.recipe()
        )
    }

    fn record(&self, label: &str, fail_undo: bool, fail_redo: bool, delay_ms: u64) {
        lock(&self.recipe).push(label.to_string());

        let (undo_recipe, redo_recipe) = (Arc::clone(&self.recipe), Arc::clone(&self.recipe));
        let (undo_label, redo_label) = (label.to_string(), label.to_string());
        self.history.add_action(
            move || apply_side(Arc::clone(&undo_recipe), undo_label.clone(), delay_ms, fail_undo, true),
            move || apply_side(Arc::clone(&redo_recipe), redo_label.clone(), delay_ms, fail_redo, false),
        );
    }
}

fn describe(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Skipped => "skipped",
        Outcome::Applied => "applied",
        Outcome::Restored => "failed, restored",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(label: &str) -> Step {
        Step::Add {
            label: label.to_string(),
            fail_undo: false,
            fail_redo: false,
            delay_ms: 0,
        }
    }

    #[test]
    fn test_parse_script() {
        let script = Script::parse(
            r#"{ "steps": [
                { "op": "add", "label": "trim" },
                { "op": "add", "label": "split", "fail_undo": true, "delay_ms": 20 },
                { "op": "undo" },
                { "op": "redo" },
                { "op": "clear" }
            ] }"#,
        )
        .expect("parse");

        assert_eq!(script.steps.len(), 5);
        assert_eq!(script.steps[0], add("trim"));
        assert_eq!(
            script.steps[1],
            Step::Add {
                label: "split".to_string(),
                fail_undo: true,
                fail_redo: false,
                delay_ms: 20,
            }
        );
        assert_eq!(script.steps[2], Step::Undo);
        assert_eq!(script.steps[4], Step::Clear);
    }

    #[test]
    fn test_parse_rejects_unknown_op() {
        assert!(Script::parse(r#"{ "steps": [ { "op": "rewind" } ] }"#).is_err());
    }

    #[test]
    fn test_step_display() {
        assert_eq!(add("trim").to_string(), "add trim");
        assert_eq!(Step::Redo.to_string(), "redo");
    }

    #[tokio::test]
    async fn test_replay_undo_redo() {
        let replay = Replay::new(HistoryConfig::default());
        replay.apply(&add("trim")).await;
        replay.apply(&add("upper")).await;

        let line = replay.apply(&Step::Undo).await;
        assert_eq!(line, r#"undo: applied ["trim"]"#);
        assert_eq!(replay.history.undone_len(), 1);

        let line = replay.apply(&Step::Redo).await;
        assert_eq!(line, r#"redo: applied ["trim", "upper"]"#);
        assert_eq!(replay.summary(), r#"done=2 undone=0 recipe=["trim", "upper"]"#);
    }

    #[tokio::test]
    async fn test_replay_failed_undo_keeps_recipe() {
        let replay = Replay::new(HistoryConfig::default());
        replay
            .apply(&Step::Add {
                label: "split".to_string(),
                fail_undo: true,
                fail_redo: false,
                delay_ms: 0,
            })
            .await;

        let line = replay.apply(&Step::Undo).await;
        assert_eq!(line, r#"undo: failed, restored ["split"]"#);
        assert_eq!(replay.history.done_len(), 1);
    }

    #[tokio::test]
    async fn test_replay_undo_on_empty_is_skipped() {
        let replay = Replay::new(HistoryConfig::default());
        let line = replay.apply(&Step::Undo).await;
        assert_eq!(line, "undo: skipped []");
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_slow_step_times_out() {
        let replay = Replay::new(HistoryConfig {
            action_timeout_ms: Some(50),
            max_depth: None,
        });
        replay
            .apply(&Step::Add {
                label: "lookup".to_string(),
                fail_undo: false,
                fail_redo: false,
                delay_ms: 1_000,
            })
            .await;

        let line = replay.apply(&Step::Undo).await;
        assert_eq!(line, r#"undo: failed, restored ["lookup"]"#);
    }

    #[tokio::test]
    async fn test_replay_clear() {
        let replay = Replay::new(HistoryConfig::default());
        replay.apply(&add("trim")).await;
        let line = replay.apply(&Step::Clear).await;
        assert_eq!(line, r#"clear: ok ["trim"]"#);
        assert!(!replay.history.can_undo());
    }
}
