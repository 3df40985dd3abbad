//! Pair simulation runner
//!
//! Runs the phone/watch scenario once and prints both memo listings.
//!
//! ```text
//! pair_sim --mode hardened --partition
//! pair_sim --memos 5 --json
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use memolink_logging::{FileConfig, LogConfig, MemolinkSubscriberBuilder};
use memolink_simulation::{PairSimulation, ScenarioConfig};
use memolink_sync::SyncMode;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    BestEffort,
    Hardened,
}

impl From<Mode> for SyncMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::BestEffort => SyncMode::BestEffort,
            Mode::Hardened => SyncMode::Hardened,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "pair_sim",
    about = "Simulate voice memo sync between a phone and a watch",
    version
)]
struct Cli {
    /// How metadata is sent to the peer
    #[arg(short, long, value_enum, default_value = "best-effort")]
    mode: Mode,

    /// Memos recorded on the phone before the watch acts
    #[arg(short = 'n', long, default_value = "3")]
    memos: usize,

    /// Drop the link for part of the run
    #[arg(short, long)]
    partition: bool,

    /// Seed for generated audio
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Milliseconds to wait between steps
    #[arg(long, default_value = "100")]
    settle_ms: u64,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Also write JSONL logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::development()
    } else {
        LogConfig::testing()
    };
    let mut logging = MemolinkSubscriberBuilder::new().with_config(log_config);
    if let Some(directory) = cli.log_dir {
        logging = logging.with_file_output(FileConfig {
            directory,
            ..FileConfig::default()
        });
    }
    let _guard = logging.try_init()?;

    let config = ScenarioConfig {
        mode: cli.mode.into(),
        memos: cli.memos,
        partition: cli.partition,
        seed: cli.seed,
        settle: Duration::from_millis(cli.settle_ms),
    };

    let report = PairSimulation::start(config).await?.run().await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }

    Ok(())
}
