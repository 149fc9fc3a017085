// Unit tests for checkpoint write-duration analysis

use super::*;
use crate::config::CheckpointConfig;
use std::collections::HashMap;
use std::io::BufRead;

const SAMPLE_LOG: &str = "\
[NeMo I 2026-02-17 17:58:40 nemo_logging:393] Global Checkpoint Save : Rank: 0 : Iteration: 24 : Start time: 1771351120.135s : Save duration: 25.537s
[NeMo I 2026-02-17 17:58:41 nemo_logging:393] Scheduled async checkpoint save for /ckpt/step=24.ckpt
[NeMo I 2026-02-17 17:58:41 nemo_logging:393] Async finalization time took 0.018 s
[NeMo I 2026-02-17 17:58:50 nemo_logging:393] Successfully saved checkpoint from iteration 24 to /ckpt/step=24.ckpt
[NeMo I 2026-02-17 17:58:50 nemo_logging:393] Async checkpoint save for step 25 (/ckpt/step=24.ckpt) finalized successfully.
[NeMo I 2026-02-17 17:59:05 nemo_logging:393] Global Checkpoint Save : Rank: 0 : Iteration: 49 : Start time: 1771351145.879s : Save duration: 5.330s
[NeMo I 2026-02-17 17:59:06 nemo_logging:393] Scheduled async checkpoint save for /ckpt/step=49.ckpt
[NeMo I 2026-02-17 17:59:15 nemo_logging:393] Successfully saved checkpoint from iteration 49 to /ckpt/step=49.ckpt
[NeMo I 2026-02-17 17:59:15 nemo_logging:393] Async checkpoint save for step 50 (/ckpt/step=49.ckpt) finalized successfully.
";

const RANK0: &str = "logs/nemo_log_globalrank-0_localrank-0.txt";

fn start_line(time: &str, step: u64, start: f64) -> String {
    format!(
        "[NeMo I 2026-02-17 {time} nemo_logging:393] Global Checkpoint Save : Rank: 0 : Iteration: {step} : Start time: {start}s : Save duration: 1.000s\n"
    )
}

fn end_line(time: &str, step: u64) -> String {
    format!(
        "[NeMo I 2026-02-17 {time} nemo_logging:393] Async checkpoint save for step {} (/ckpt/step={step}.ckpt) finalized successfully.\n",
        step + 1
    )
}

fn entry(step: &str, start: f64, end: f64) -> WriteTimeEntry {
    WriteTimeEntry {
        global_rank: Some(0),
        local_rank: Some(0),
        checkpoint_step: Some(step.to_string()),
        start_time: Some(start),
        end_time: Some(end),
    }
}

// =============================================================================
// Per-file parser
// =============================================================================

#[test]
fn test_parse_sample_log_extracts_checkpoints() {
    let patterns = LogPatterns::new().unwrap();
    let parser = CheckpointLogParser::new(&patterns, false);
    let records = parser.parse_str(RANK0, SAMPLE_LOG).unwrap();

    assert_eq!(records.len(), 2);

    assert_eq!(records[0].global_rank, 0);
    assert_eq!(records[0].local_rank, 0);
    assert_eq!(records[0].checkpoint_step, "24");
    assert_eq!(records[0].start_time, 1771351120.135);
    // 2026-02-17 17:58:50 UTC
    assert_eq!(records[0].end_time, 1771351130.0);
    assert!(records[0].checkpoint_write_duration > 0.0);

    assert_eq!(records[1].checkpoint_step, "49");
    assert_eq!(records[1].start_time, 1771351145.879);
    assert!(records[1].end_time > records[1].start_time);
}

#[test]
fn test_duplicate_start_keeps_first() {
    let log = format!(
        "{}{}{}",
        start_line("17:58:40", 24, 1771351120.0),
        start_line("17:58:45", 24, 1771351125.0),
        end_line("17:58:50", 24)
    );

    let patterns = LogPatterns::new().unwrap();
    let records = CheckpointLogParser::new(&patterns, true)
        .parse_str(RANK0, &log)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].checkpoint_step, "24");
    assert_eq!(records[0].start_time, 1771351120.0);
    assert_eq!(records[0].checkpoint_write_duration, 10.0);
}

#[test]
fn test_duplicate_end_keeps_first() {
    let log = format!(
        "{}{}{}",
        start_line("17:58:40", 24, 1771351120.0),
        end_line("17:58:50", 24),
        end_line("17:59:30", 24)
    );

    let patterns = LogPatterns::new().unwrap();
    let records = CheckpointLogParser::new(&patterns, false)
        .parse_str(RANK0, &log)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].end_time, 1771351130.0);
}

#[test]
fn test_end_before_start_is_out_of_order() {
    let log = format!(
        "{}{}",
        end_line("17:58:50", 30),
        start_line("17:59:00", 30, 1771351140.0)
    );

    let patterns = LogPatterns::new().unwrap();
    let parser = CheckpointLogParser::new(&patterns, false);

    let err = parser.parse_str(RANK0, &log).unwrap_err();
    match err {
        CheckpointError::OutOfOrder { step, file } => {
            assert_eq!(step, "30");
            assert_eq!(file, RANK0);
        }
        other => panic!("expected OutOfOrder, got {other:?}"),
    }

    let failure = parser
        .parse_isolated(RANK0, Ok(log.as_bytes()))
        .unwrap_err();
    assert_eq!(failure.file, RANK0);
    assert!(failure.reason.contains("step 30"));
}

#[test]
fn test_out_of_order_discards_earlier_records_of_file() {
    let log = format!(
        "{}{}{}",
        start_line("17:58:40", 24, 1771351120.0),
        end_line("17:58:50", 24),
        end_line("17:59:50", 30)
    );

    let patterns = LogPatterns::new().unwrap();
    let parser = CheckpointLogParser::new(&patterns, false);
    assert!(parser.parse_isolated(RANK0, Ok(log.as_bytes())).is_err());
}

#[test]
fn test_zero_duration_is_kept() {
    // start and end inside the same second
    let log = format!(
        "{}{}",
        start_line("17:58:50", 24, 1771351130.0),
        end_line("17:58:50", 24)
    );

    let patterns = LogPatterns::new().unwrap();
    let records = CheckpointLogParser::new(&patterns, false)
        .parse_str(RANK0, &log)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].checkpoint_write_duration, 0.0);
}

#[test]
fn test_invalid_file_name_yields_no_records() {
    let patterns = LogPatterns::new().unwrap();
    let parser = CheckpointLogParser::new(&patterns, false);

    let err = parser
        .parse_str("logs/invalid_file_name.txt", SAMPLE_LOG)
        .unwrap_err();
    assert!(matches!(err, CheckpointError::InvalidFileName { .. }));
    assert!(parser
        .parse_isolated("logs/invalid_file_name.txt", Ok(SAMPLE_LOG.as_bytes()))
        .is_err());
}

#[test]
fn test_open_failure_is_isolated() {
    let patterns = LogPatterns::new().unwrap();
    let parser = CheckpointLogParser::new(&patterns, false);

    let opened: Result<&[u8]> = Err(CheckpointError::Io {
        path: RANK0.to_string(),
        source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
    });
    let failure = parser.parse_isolated(RANK0, opened).unwrap_err();
    assert_eq!(failure.file, RANK0);
    assert!(failure.reason.starts_with("I/O error"));
}

#[test]
fn test_start_without_embedded_time_uses_line_clock() {
    let log = format!(
        "[NeMo I 2026-02-17 17:58:40 nemo_logging:393] Global Checkpoint Save : Rank: 0 : Iteration: 24\n{}",
        end_line("17:58:52", 24)
    );

    let patterns = LogPatterns::new().unwrap();
    let records = CheckpointLogParser::new(&patterns, false)
        .parse_str(RANK0, &log)
        .unwrap();
    assert_eq!(records.len(), 1);
    // 2026-02-17 17:58:40 UTC
    assert_eq!(records[0].start_time, 1771351120.0);
    assert_eq!(records[0].checkpoint_write_duration, 12.0);
}

#[test]
fn test_end_line_without_timestamp_is_skipped() {
    let log = format!(
        "{}Async checkpoint save for step 25 (/ckpt/step=24.ckpt) finalized successfully.\n{}",
        start_line("17:58:40", 24, 1771351120.0),
        end_line("17:58:55", 24)
    );

    let patterns = LogPatterns::new().unwrap();
    let records = CheckpointLogParser::new(&patterns, false)
        .parse_str(RANK0, &log)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].end_time, 1771351135.0);
}

#[test]
fn test_records_labelled_with_file_ranks() {
    let patterns = LogPatterns::new().unwrap();
    let records = CheckpointLogParser::new(&patterns, false)
        .parse_str("run/nemo_log_globalrank-9_localrank-1.txt", SAMPLE_LOG)
        .unwrap();
    assert!(records
        .iter()
        .all(|r| r.global_rank == 9 && r.local_rank == 1));
}

// =============================================================================
// Cross-process aggregation
// =============================================================================

#[test]
fn test_cross_process_duration_uses_extremes() {
    let entries = vec![entry("24", 100.0, 110.0), entry("24", 99.0, 111.0)];
    let result = compute_write_duration_per_step(&entries);

    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].checkpoint_step, "24");
    assert_eq!(result.steps[0].duration, 12.0);
    assert_eq!(result.steps[0].ranks, 2);
}

#[test]
fn test_multi_rank_multiple_steps() {
    let entries = vec![
        entry("24", 100.0, 110.0),
        entry("24", 99.0, 111.0),
        entry("49", 200.0, 208.0),
        entry("49", 199.0, 208.0),
    ];
    let result = compute_write_duration_per_step(&entries);

    assert_eq!(result.durations(), vec![12.0, 9.0]);
    let summary = result.summary.unwrap();
    assert!((summary.min - 9.0).abs() < 1e-3);
    assert!((summary.max - 12.0).abs() < 1e-3);
    assert!((summary.mean - 10.5).abs() < 1e-3);
    assert!((summary.stdev.unwrap() - 4.5_f64.sqrt()).abs() < 1e-3);
}

#[test]
fn test_single_step_has_no_stdev() {
    let entries = vec![entry("24", 100.0, 110.0)];
    let result = compute_write_duration_per_step(&entries);

    let summary = result.summary.unwrap();
    assert_eq!(summary.count, 1);
    assert!((summary.mean - 10.0).abs() < 1e-3);
    assert_eq!(summary.stdev, None);
}

#[test]
fn test_empty_write_times() {
    let result = compute_write_duration_per_step(&[]);
    assert!(result.is_empty());
    assert!(result.summary.is_none());
    assert_eq!(result.skipped_entries, 0);
}

#[test]
fn test_missing_fields_are_skipped() {
    let incomplete = WriteTimeEntry {
        global_rank: Some(0),
        checkpoint_step: Some("24".to_string()),
        end_time: Some(500.0),
        ..Default::default()
    };
    let entries = vec![incomplete, entry("24", 100.0, 110.0)];
    let result = compute_write_duration_per_step(&entries);

    assert_eq!(result.skipped_entries, 1);
    assert_eq!(result.steps.len(), 1);
    // the incomplete entry's end time never reaches the step
    assert_eq!(result.steps[0].duration, 10.0);
}

#[test]
fn test_only_missing_fields_yields_no_summary() {
    let entries = vec![WriteTimeEntry {
        global_rank: Some(0),
        ..Default::default()
    }];
    let result = compute_write_duration_per_step(&entries);
    assert!(result.is_empty());
    assert!(result.summary.is_none());
    assert_eq!(result.skipped_entries, 1);
}

#[test]
fn test_entry_deserializes_with_missing_fields() {
    let entry: WriteTimeEntry = serde_json::from_str(r#"{"global_rank": 0}"#).unwrap();
    assert_eq!(entry.global_rank, Some(0));
    assert!(entry.start_time.is_none());
}

#[test]
fn test_entries_from_json_skips_malformed_entries() {
    let json = r#"[
        {"global_rank": 0, "checkpoint_step": "24", "start_time": 100.0, "end_time": 110.0},
        {"global_rank": "one", "checkpoint_step": "24", "start_time": 90.0, "end_time": 200.0},
        42,
        {"global_rank": 1, "checkpoint_step": "24", "start_time": 99.0, "end_time": 111.0}
    ]"#;

    let entries = entries_from_json(json).unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[1], WriteTimeEntry::default());

    let result = compute_write_duration_per_step(&entries);
    assert_eq!(result.skipped_entries, 2);
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].duration, 12.0);
}

#[test]
fn test_entries_from_json_requires_a_list() {
    assert!(entries_from_json(r#"{"global_rank": 0}"#).is_err());
    assert!(entries_from_json("not json").is_err());
}

// =============================================================================
// Store analysis
// =============================================================================

struct MemoryStore {
    files: HashMap<String, String>,
}

impl LogStore for MemoryStore {
    fn list_files(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn open(&self, name: &str) -> Result<Box<dyn BufRead + '_>> {
        let content = self.files.get(name).ok_or_else(|| CheckpointError::Io {
            path: name.to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        Ok(Box::new(content.as_bytes()))
    }
}

#[test]
fn test_analyze_store_isolates_failing_files() {
    let rank1 = format!(
        "{}{}",
        start_line("17:58:39", 24, 1771351119.0),
        end_line("17:58:52", 24)
    );
    let bad = end_line("17:58:50", 30);

    let store = MemoryStore {
        files: HashMap::from([
            (RANK0.to_string(), SAMPLE_LOG.to_string()),
            ("logs/nemo_log_globalrank-1_localrank-1.txt".to_string(), rank1),
            ("logs/nemo_log_globalrank-2_localrank-0.txt".to_string(), bad),
            ("logs/README.txt".to_string(), String::new()),
        ]),
    };

    let config = CheckpointConfig {
        warn_on_duplicates: false,
        workers: Some(2),
    };
    let report = analyze_store(&store, &config).unwrap();

    assert_eq!(report.files_analyzed, 2);
    assert_eq!(report.failures.len(), 2);
    assert!(report
        .failures
        .iter()
        .any(|f| f.file == "logs/README.txt"));
    assert!(report
        .failures
        .iter()
        .any(|f| f.file.contains("globalrank-2")));
    assert_eq!(report.records.len(), 3);

    // step 24: min start 1771351119.0 (rank 1), max end 17:58:52 (rank 1)
    let step24 = &report.durations.steps[0];
    assert_eq!(step24.checkpoint_step, "24");
    assert_eq!(step24.duration, 13.0);
    assert_eq!(step24.ranks, 2);
}

#[test]
fn test_local_store_walks_directories() {
    let dir = tempfile::TempDir::new().unwrap();
    let nested = dir.path().join("node-0");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(
        nested.join("nemo_log_globalrank-0_localrank-0.txt"),
        SAMPLE_LOG,
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a rank log").unwrap();

    let store = LocalLogStore::new(dir.path());
    let files = store.list_files().unwrap();
    assert_eq!(files.len(), 2);

    let config = CheckpointConfig {
        warn_on_duplicates: false,
        workers: None,
    };
    let report = analyze_store(&store, &config).unwrap();
    assert_eq!(report.files_analyzed, 1);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.durations.steps.len(), 2);
}

#[cfg(unix)]
#[test]
fn test_local_store_does_not_follow_symlinked_directories() {
    let dir = tempfile::TempDir::new().unwrap();
    let nested = dir.path().join("node-0");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(
        nested.join("nemo_log_globalrank-0_localrank-0.txt"),
        SAMPLE_LOG,
    )
    .unwrap();
    // cycle back to the root
    std::os::unix::fs::symlink(dir.path(), nested.join("loop")).unwrap();

    let store = LocalLogStore::new(dir.path());
    let files = store.list_files().unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("nemo_log_globalrank-0_localrank-0.txt"));
}

#[test]
fn test_local_store_missing_root_is_error() {
    let store = LocalLogStore::new("/nonexistent/goodput/logs");
    assert!(matches!(
        store.list_files(),
        Err(CheckpointError::Io { .. })
    ));
}
