//! Analyzer configuration
//!
//! Every knob the two engines consume lives here and is passed explicitly
//! into the parser, aggregator and loaders. Values come from defaults, an
//! optional TOML file, and finally CLI flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable that turns on duplicate-marker warnings
pub const WARNINGS_ENV: &str = "GENERATE_LOG_WARNINGS";

/// Default lookback window for remote event queries
pub const DEFAULT_LOOKBACK_DAYS: f64 = 7.0;

/// Largest accepted lookback window (about a century)
pub const MAX_LOOKBACK_DAYS: f64 = 36_500.0;

/// Default page size for remote event queries
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Checkpoint write-duration analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Warn about duplicate write-start / write-end markers
    pub warn_on_duplicates: bool,

    /// Parser worker count (`None` = available parallelism)
    pub workers: Option<usize>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            warn_on_duplicates: warnings_from_env(),
            workers: None,
        }
    }
}

/// Goodput calculator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoodputConfig {
    /// Seconds per training step, used for effective computation time
    pub reference_step_time: Option<f64>,

    /// How far back remote event queries look
    pub lookback_days: f64,

    /// Entries requested per remote query page
    pub page_size: u32,
}

impl Default for GoodputConfig {
    fn default() -> Self {
        Self {
            reference_step_time: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Top-level configuration
///
/// # Example
/// ```
/// use goodput::config::AnalyzerConfig;
///
/// let config: AnalyzerConfig = toml::from_str("[goodput]\nreference_step_time = 2.0\n").unwrap();
/// assert_eq!(config.goodput.reference_step_time, Some(2.0));
/// assert_eq!(config.goodput.lookback_days, 7.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub checkpoint: CheckpointConfig,
    pub goodput: GoodputConfig,
}

impl AnalyzerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AnalyzerConfig =
            toml::from_str(&contents).context("Invalid config TOML")?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Some(step_time) = self.goodput.reference_step_time {
            if !(step_time.is_finite() && step_time > 0.0) {
                return Err(format!(
                    "reference_step_time must be positive, got {}",
                    step_time
                ));
            }
        }

        let lookback = self.goodput.lookback_days;
        if !(lookback.is_finite() && lookback > 0.0 && lookback <= MAX_LOOKBACK_DAYS) {
            return Err(format!(
                "lookback_days must be in (0, {}], got {}",
                MAX_LOOKBACK_DAYS, lookback
            ));
        }

        if self.goodput.page_size == 0 {
            return Err("page_size must be >= 1".to_string());
        }

        if self.checkpoint.workers == Some(0) {
            return Err("workers must be >= 1".to_string());
        }

        Ok(())
    }
}

fn warnings_from_env() -> bool {
    std::env::var(WARNINGS_ENV)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
