use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dataprep_history::HistoryConfig;

mod script;

use script::{Replay, Script};

/// Replays a scripted undo/redo session against an in-memory recipe.
#[derive(Parser, Debug)]
#[command(name = "dataprep-history-replay", version, about)]
struct Cli {
    /// JSON script of history operations to replay.
    script: PathBuf,

    /// History config file. Defaults to `DATAPREP_HISTORY_CONFIG` or
    /// `dataprep-history.json` next to the executable.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = cli.config.unwrap_or_else(HistoryConfig::config_path);
    let config = HistoryConfig::load_or_default(&config_path);
    tracing::info!("Replaying {} with {config:?}", cli.script.display());

    let contents = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("Failed to read script {}", cli.script.display()))?;
    let script = Script::parse(&contents)
        .with_context(|| format!("Failed to parse script {}", cli.script.display()))?;

    let mut replay = Replay::new(config);
    for step in &script.steps {
        let line = replay.apply(step).await;
        println!("{line}");
    }
    println!("{}", replay.summary());

    Ok(())
}
