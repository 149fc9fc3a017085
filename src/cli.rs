//! CLI argument parsing for goodput

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV format for spreadsheet analysis (per-step rows)
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "goodput")]
#[command(version)]
#[command(
    about = "Checkpoint write-duration and training goodput metrics",
    long_about = None
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log progress at info level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug tracing output to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze checkpoint write durations from per-rank logs
    Checkpoint(CheckpointArgs),
    /// Calculate goodput from recorded lifecycle events
    Calculate(CalculateArgs),
    /// Record one lifecycle event
    Record(RecordArgs),
}

#[derive(Args, Debug)]
pub struct CheckpointArgs {
    /// Directory of `*globalrank-N_localrank-M*` log files
    #[arg(value_name = "DIR", required_unless_present = "records")]
    pub log_dir: Option<PathBuf>,

    /// Re-aggregate an exported JSON list of write-time records instead
    #[arg(long, value_name = "FILE", conflicts_with = "log_dir")]
    pub records: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Warn about duplicate write-start and write-end markers
    #[arg(long = "warn-duplicates")]
    pub warn_duplicates: bool,

    /// Number of parser worker threads (default: available parallelism)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

#[derive(Args, Debug)]
pub struct CalculateArgs {
    /// Job whose events are measured
    #[arg(long = "job-name", value_name = "NAME")]
    pub job_name: String,

    /// Local event log; Cloud Logging is queried when omitted
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Seconds per training step, for effective computation time
    #[arg(long = "reference-step-time", value_name = "SECONDS")]
    pub reference_step_time: Option<f64>,

    /// Cloud Logging lookback window in days (default: 7)
    #[arg(long = "lookback-days", value_name = "DAYS")]
    pub lookback_days: Option<f64>,

    /// Also write the metrics as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Event type (user_scheduled, job_started, checkpoint_loaded, ...)
    #[arg(long = "event-type", value_name = "TYPE")]
    pub event_type: String,

    /// Job name (default: $JOB_IDENTIFIER or "training-job")
    #[arg(long = "job-name", value_name = "NAME")]
    pub job_name: Option<String>,

    /// Training step, for checkpoint events
    #[arg(long, value_name = "N")]
    pub step: Option<i64>,

    /// Directory holding `<job>-goodput.log`
    #[arg(long = "log-dir", value_name = "DIR", default_value = ".")]
    pub log_dir: PathBuf,
}
