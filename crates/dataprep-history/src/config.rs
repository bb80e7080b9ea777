/// Configuration for the history manager: load, sanitize, and resolve.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "DATAPREP_HISTORY_CONFIG";

/// File name looked up next to the executable.
const CONFIG_FILE_NAME: &str = "dataprep-history.json";

/// Configuration for a `HistoryManager`.
///
/// Both limits are off by default, which keeps the plain two-stack behaviour:
/// actions may run as long as they like and history grows without bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum time an undo or redo may take before it is abandoned and
    /// handled as a failure. `None` waits forever.
    pub action_timeout_ms: Option<u64>,
    /// Maximum number of actions kept in the done stack. The oldest are
    /// evicted first. `None` = unbounded.
    pub max_depth: Option<usize>,
}

impl HistoryConfig {
    /// Returns the config file path.
    ///
    /// Resolution order:
    /// 1. `DATAPREP_HISTORY_CONFIG` environment variable
    /// 2. `dataprep-history.json` next to the executable
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return PathBuf::from(path);
        }
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join(CONFIG_FILE_NAME)))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Loads config from `path`.
    /// Returns defaults on any error (missing file, parse error, etc.).
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::warn!("No history config at {}, using defaults", path.display());
            return Self::default();
        }

        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<HistoryConfig>(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse history config at {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read history config at {}: {e}", path.display());
                Self::default()
            }
        };
        config.sanitize();
        config
    }

    /// Saves config to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Treats zero limits as "no limit".
    pub fn sanitize(&mut self) {
        if self.action_timeout_ms == Some(0) {
            self.action_timeout_ms = None;
        }
        if self.max_depth == Some(0) {
            self.max_depth = None;
        }
    }

    /// The action timeout as a `Duration`, if one is set.
    pub fn action_timeout(&self) -> Option<Duration> {
        self.action_timeout_ms.map(Duration::from_millis)
    }
}
