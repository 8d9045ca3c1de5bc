mod output;

use std::{io, path::PathBuf, process::ExitCode};

use clap::Parser;
use mtga_data::{CardDatabase, CardDbError, DeckTracker};
use mtga_events::{
    ConfigError, Dispatcher, Pipeline, PipelineConfig, PipelineError, TailConfig,
};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::output::JsonLines;

#[derive(Debug, Parser)]
#[command(name = "mtga-watch")]
#[command(about = "Print the events of an MTG Arena client log as JSON lines")]
struct Cli {
    /// Client log to read, e.g. `output_log.txt`.
    #[arg(required_unless_present = "config")]
    path: Option<PathBuf>,

    /// Pipeline settings in TOML; flags given on the command line take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read the log from the beginning instead of from its current end.
    #[arg(long)]
    from_start: bool,

    /// Keep waiting for new lines once the end of the log is reached.
    #[arg(long)]
    follow: bool,

    /// SQLite card database used to resolve card ids in deck lists.
    #[arg(long)]
    cards: Option<PathBuf>,

    #[arg(long)]
    queue_capacity: Option<usize>,

    #[arg(long)]
    max_line_bytes: Option<usize>,

    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Error)]
enum WatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cards(#[from] CardDbError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        // clap guarantees a path whenever no config file is given.
        let mut config = match &self.config {
            Some(file) => PipelineConfig::load(file)?,
            None => PipelineConfig::new(TailConfig::new(self.path.clone().unwrap_or_default())),
        };

        if let Some(path) = &self.path {
            config.tail.path = path.clone();
        }
        config.tail.from_start |= self.from_start;
        config.tail.follow |= self.follow;
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(max_line_bytes) = self.max_line_bytes {
            config.tail.limits.max_line_bytes = max_line_bytes;
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            config.tail.poll_interval_ms = poll_interval_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), WatchError> {
    let config = cli.pipeline_config()?;

    let mut tracker = DeckTracker::new();
    if let Some(path) = &cli.cards {
        tracker = tracker.with_cards(CardDatabase::open(path)?);
    }
    let dispatcher = Dispatcher::new()
        .with_handler(tracker)
        .with_handler(JsonLines::new(io::stdout()));

    let report = Pipeline::new(config, dispatcher).run().await?;
    info!(
        dispatched = report.session.dispatched(),
        duplicates = report.session.duplicates(),
        player_id = report.session.player_id().unwrap_or("unknown"),
        "log drained"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "mtga-watch failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mtga-watch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_build_the_pipeline_config() {
        let config = parse(&[
            "output_log.txt",
            "--from-start",
            "--queue-capacity",
            "8",
            "--max-line-bytes",
            "2048",
            "--poll-interval-ms",
            "20",
        ])
        .pipeline_config()
        .unwrap();

        assert_eq!(config.tail.path, PathBuf::from("output_log.txt"));
        assert!(config.tail.from_start);
        assert!(!config.tail.follow);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.tail.limits.max_line_bytes, 2048);
        assert_eq!(config.tail.poll_interval_ms, 20);
    }

    #[test]
    fn path_or_config_is_required() {
        assert!(Cli::try_parse_from(["mtga-watch"]).is_err());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = parse(&["log.txt", "--queue-capacity", "0"])
            .pipeline_config()
            .err()
            .unwrap();

        assert!(matches!(err, ConfigError::ZeroQueueCapacity));
    }
}
