// Integration test utilities
//
// Builders for per-rank checkpoint logs and goodput event logs on disk

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Write-start marker line for one rank
pub fn start_line(clock: &str, rank: u32, iteration: u64, start: f64) -> String {
    format!(
        "[NeMo I 2026-02-17 {clock} nemo_logging:393] Global Checkpoint Save : Rank: {rank} : Iteration: {iteration} : Start time: {start:.3}s : Save duration: 2.000s\n"
    )
}

/// Finalization marker line; the reported step is one past the iteration
pub fn end_line(clock: &str, iteration: u64) -> String {
    format!(
        "[NeMo I 2026-02-17 {clock} nemo_logging:393] Async checkpoint save for step {} (/ckpt/step={iteration}.ckpt) finalized successfully.\n",
        iteration + 1
    )
}

/// Create `nemo_log_globalrank-<g>_localrank-<l>.txt` under `dir`
pub fn write_rank_log(dir: &Path, global: u32, local: u32, content: &str) -> PathBuf {
    let path = dir.join(format!("nemo_log_globalrank-{global}_localrank-{local}.txt"));
    fs::write(&path, content).unwrap();
    path
}

/// One goodput event as an NDJSON line
pub fn event_line(timestamp: &str, job: &str, event_type: &str, step: Option<i64>) -> String {
    let mut value = serde_json::json!({
        "timestamp": timestamp,
        "job_name": job,
        "event_type": event_type,
    });
    if let Some(step) = step {
        value["step"] = serde_json::json!(step);
    }
    format!("{}\n", value)
}
