use anyhow::{Context, Result};
use clap::Parser;
use goodput::checkpoint::{
    analyze_store, compute_write_duration_per_step, entries_from_json, CheckpointReport,
    LocalLogStore, StepDurations,
};
use goodput::cli::{CalculateArgs, CheckpointArgs, Cli, Command, OutputFormat, RecordArgs};
use goodput::config::AnalyzerConfig;
use goodput::csv_output::CsvStepOutput;
use goodput::goodput::{
    job_name_from_env, CloudLoggingEventSource, EventRecorder, EventSource, EventType,
    FileEventSource, GoodputCalculator, GoodputMetrics, HttpLogEntriesClient,
};
use goodput::json_output::{CheckpointJsonOutput, GoodputJsonOutput};
use goodput::stats::SummaryStats;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing to stderr; `RUST_LOG` overrides the flag-derived level
fn init_tracing(verbose: bool, debug: bool) {
    let level = if debug {
        "trace"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AnalyzerConfig> {
    match path {
        Some(path) => AnalyzerConfig::from_file(path),
        None => Ok(AnalyzerConfig::default()),
    }
}

fn print_summary(summary: Option<&SummaryStats>) {
    let Some(s) = summary else {
        println!("No checkpoint write durations found.");
        return;
    };

    println!("Checkpoint write duration summary ({} steps):", s.count);
    println!("  min:    {:>10.3} s", s.min);
    println!("  max:    {:>10.3} s", s.max);
    println!("  mean:   {:>10.3} s", s.mean);
    println!("  median: {:>10.3} s", s.median);
    println!("  p90:    {:>10.3} s", s.p90);
    match s.stdev {
        Some(stdev) => println!("  stdev:  {:>10.3} s", stdev),
        None => println!("  stdev:  {:>10}", "n/a"),
    }
}

fn print_durations(durations: &StepDurations) {
    if !durations.is_empty() {
        println!("{:>12} {:>12} {:>6}", "step", "duration_s", "ranks");
        println!("────────────────────────────────");
        for step in &durations.steps {
            println!(
                "{:>12} {:>12.3} {:>6}",
                step.checkpoint_step, step.duration, step.ranks
            );
        }
        println!();
    }
    if durations.skipped_entries > 0 {
        println!("Skipped {} incomplete entries", durations.skipped_entries);
    }
    print_summary(durations.summary.as_ref());
}

fn print_checkpoint_report(report: &CheckpointReport) {
    println!(
        "Analyzed {} rank logs ({} records)",
        report.files_analyzed,
        report.records.len()
    );
    if !report.failures.is_empty() {
        println!("Skipped {} files:", report.failures.len());
        for failure in &report.failures {
            println!("  {}: {}", failure.file, failure.reason);
        }
    }
    println!();
    print_durations(&report.durations);
}

fn emit_durations(durations: &StepDurations, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print_durations(durations),
        OutputFormat::Json => println!("{}", CheckpointJsonOutput::from_durations(durations).to_json()?),
        OutputFormat::Csv => {
            let csv: CsvStepOutput = durations.steps.iter().cloned().collect();
            print!("{}", csv.to_csv());
        }
    }
    Ok(())
}

fn run_checkpoint(args: CheckpointArgs, mut config: AnalyzerConfig) -> Result<()> {
    config.checkpoint.warn_on_duplicates |= args.warn_duplicates;
    if args.workers.is_some() {
        config.checkpoint.workers = args.workers;
    }
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    if let Some(records_path) = &args.records {
        let contents = std::fs::read_to_string(records_path)
            .with_context(|| format!("Failed to read {}", records_path.display()))?;
        let entries =
            entries_from_json(&contents).context("Invalid write-time records JSON")?;
        return emit_durations(&compute_write_duration_per_step(&entries), args.format);
    }

    let Some(log_dir) = &args.log_dir else {
        anyhow::bail!("Must specify a log directory or --records FILE");
    };
    let store = LocalLogStore::new(log_dir);
    let report = analyze_store(&store, &config.checkpoint)
        .with_context(|| format!("Failed to analyze {}", log_dir.display()))?;

    match args.format {
        OutputFormat::Text => print_checkpoint_report(&report),
        OutputFormat::Json => println!("{}", CheckpointJsonOutput::from_report(&report).to_json()?),
        OutputFormat::Csv => emit_durations(&report.durations, OutputFormat::Csv)?,
    }
    Ok(())
}

fn print_goodput(job_name: &str, metrics: &GoodputMetrics) {
    if let Some(error) = &metrics.error {
        println!("Goodput for job {}: {}", job_name, error);
        return;
    }

    let step = |v: Option<i64>| v.map_or_else(|| "n/a".to_string(), |s| s.to_string());

    println!("Goodput metrics for job {}:", job_name);
    println!("  Total events:           {}", metrics.total_events);
    println!("  Job starts:             {}", metrics.job_started_count);
    println!("  Checkpoints loaded:     {}", metrics.checkpoints_loaded);
    println!("  Checkpoints saved:      {}", metrics.checkpoints_saved);
    println!("  Min loaded step:        {}", step(metrics.min_loaded_step));
    println!("  Max saved step:         {}", step(metrics.max_saved_step));
    println!("  Step diff:              {}", step(metrics.step_diff));
    println!("  Total runtime:          {:.2} s", metrics.total_runtime_seconds);
    println!("  Effective computation:  {:.2} s", metrics.effective_computation_time);
    println!("  Goodput:                {:.2} %", metrics.goodput_percentage);
}

fn event_source(args: &CalculateArgs, config: &AnalyzerConfig) -> Result<Box<dyn EventSource>> {
    match &args.log_file {
        Some(path) => Ok(Box::new(FileEventSource::new(path))),
        None => {
            let source = CloudLoggingEventSource::<HttpLogEntriesClient>::from_env(
                &args.job_name,
                config.goodput.lookback_days,
                config.goodput.page_size,
            )?;
            Ok(Box::new(source))
        }
    }
}

fn run_calculate(args: CalculateArgs, mut config: AnalyzerConfig) -> Result<()> {
    if args.format == OutputFormat::Csv {
        anyhow::bail!("CSV output is only available for checkpoint reports");
    }
    if args.reference_step_time.is_some() {
        config.goodput.reference_step_time = args.reference_step_time;
    }
    if let Some(days) = args.lookback_days {
        config.goodput.lookback_days = days;
    }
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let source = event_source(&args, &config)?;
    tracing::info!(source = %source.describe(), job_name = %args.job_name, "Calculating goodput");

    let calculator = GoodputCalculator::new(&args.job_name, source);
    let reference_step_time = config.goodput.reference_step_time;
    let metrics = calculator.calculate(reference_step_time)?;
    let output = GoodputJsonOutput::new(calculator.job_name(), reference_step_time, metrics);

    if let Some(path) = &args.export {
        std::fs::write(path, output.to_json()?)
            .with_context(|| format!("Failed to export metrics to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Exported goodput metrics");
    }

    match args.format {
        OutputFormat::Json => println!("{}", output.to_json()?),
        _ => print_goodput(&output.job_name, &output.metrics),
    }
    Ok(())
}

fn run_record(args: RecordArgs) -> Result<()> {
    let event_type = EventType::from(args.event_type);
    if let EventType::Other(kind) = &event_type {
        tracing::warn!(event_type = %kind, "Recording an unrecognized event type");
    }

    let job_name = args.job_name.unwrap_or_else(job_name_from_env);
    let recorder = EventRecorder::new(job_name, &args.log_dir);
    let event = recorder.record(event_type, args.step)?;

    println!(
        "Recorded {} for job {} at {} in {}",
        event.event_type,
        recorder.job_name(),
        event.timestamp,
        recorder.path().display()
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose, args.debug);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Checkpoint(checkpoint) => run_checkpoint(checkpoint, config),
        Command::Calculate(calculate) => run_calculate(calculate, config),
        Command::Record(record) => run_record(record),
    }
}
