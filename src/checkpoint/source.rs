//! Log file discovery and parallel per-file parsing

use super::aggregate::{compute_write_duration_per_step, StepDurations, WriteTimeEntry};
use super::parser::{CheckpointLogParser, CheckpointWriteRecord};
use super::patterns::LogPatterns;
use super::{CheckpointError, Result};
use crate::config::CheckpointConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Source of per-process checkpoint logs
pub trait LogStore: Sync {
    /// Names of every file in the store
    fn list_files(&self) -> Result<Vec<String>>;

    /// Open one file by the name returned from [`LogStore::list_files`]
    fn open(&self, name: &str) -> Result<Box<dyn BufRead + '_>>;
}

/// Logs stored under a local directory tree
#[derive(Debug, Clone)]
pub struct LocalLogStore {
    root: PathBuf,
}

impl LocalLogStore {
    /// Create a store rooted at `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Collect regular files below `dir`; symlinked directories are not followed
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|source| CheckpointError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| CheckpointError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| CheckpointError::Io {
                path: path.display().to_string(),
                source,
            })?;

            if file_type.is_dir() {
                Self::walk(&path, out)?;
            } else if file_type.is_symlink() && path.is_dir() {
                tracing::debug!(path = %path.display(), "Not following symlinked directory");
            } else {
                out.push(path);
            }
        }
        Ok(())
    }
}

impl LogStore for LocalLogStore {
    fn list_files(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        Self::walk(&self.root, &mut paths)?;
        paths.sort();
        Ok(paths
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect())
    }

    fn open(&self, name: &str) -> Result<Box<dyn BufRead + '_>> {
        let file = File::open(name).map_err(|source| CheckpointError::Io {
            path: name.to_string(),
            source,
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// A file that contributed no records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFailure {
    pub file: String,
    pub reason: String,
}

impl FileFailure {
    /// Record why `file` was skipped
    pub fn new(file: impl Into<String>, error: &CheckpointError) -> Self {
        Self {
            file: file.into(),
            reason: error.to_string(),
        }
    }
}

/// Result of analyzing a whole log store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointReport {
    /// Rank log files that were parsed successfully
    pub files_analyzed: usize,
    pub failures: Vec<FileFailure>,
    /// Per-rank records, in file order
    pub records: Vec<CheckpointWriteRecord>,
    pub durations: StepDurations,
}

/// Parse every rank log in `store` and aggregate write durations per step
///
/// Files are parsed in parallel; aggregation starts only after every file
/// finished. A failing file is logged and recorded in
/// [`CheckpointReport::failures`], never aborting the batch.
pub fn analyze_store<S: LogStore + ?Sized>(
    store: &S,
    config: &CheckpointConfig,
) -> Result<CheckpointReport> {
    let patterns = LogPatterns::new()?;
    let parser = CheckpointLogParser::new(&patterns, config.warn_on_duplicates);

    let mut failures = Vec::new();
    let mut rank_files = Vec::new();
    for file in store.list_files()? {
        if patterns.is_rank_file(&file) {
            rank_files.push(file);
        } else {
            let error = CheckpointError::InvalidFileName { file: file.clone() };
            tracing::warn!(file = %file, "Skipping file outside the rank naming convention");
            failures.push(FileFailure::new(file, &error));
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.unwrap_or(0))
        .build()
        .map_err(|e| CheckpointError::WorkerPool(e.to_string()))?;

    tracing::info!(
        files = rank_files.len(),
        workers = pool.current_num_threads(),
        "Parsing checkpoint logs"
    );

    let parsed: Vec<std::result::Result<Vec<CheckpointWriteRecord>, FileFailure>> =
        pool.install(|| {
            rank_files
                .par_iter()
                .map(|file| parser.parse_isolated(file, store.open(file)))
                .collect()
        });

    let mut records = Vec::new();
    let mut files_analyzed = 0;
    for result in parsed {
        match result {
            Ok(file_records) => {
                files_analyzed += 1;
                records.extend(file_records);
            }
            Err(failure) => failures.push(failure),
        }
    }

    let entries: Vec<WriteTimeEntry> = records.iter().map(WriteTimeEntry::from).collect();
    let durations = compute_write_duration_per_step(&entries);

    Ok(CheckpointReport {
        files_analyzed,
        failures,
        records,
        durations,
    })
}
