//! Summary statistics for checkpoint write durations
//!
//! Order statistics and the mean are computed in f64 so the reported
//! min / median / p90 / max stay mutually consistent. Sample standard
//! deviation goes through trueno's SIMD variance over mean-centered values
//! with Bessel's correction, and is only defined for two or more samples.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for summary statistics
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Statistics computation failed: {0}")]
    Compute(String),
}

pub type Result<T> = std::result::Result<T, StatsError>;

/// Summary of a set of durations (seconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p90: f64,
    /// Sample standard deviation; `None` with fewer than two samples
    pub stdev: Option<f64>,
}

impl SummaryStats {
    /// Summarize `values`
    ///
    /// Fails with [`StatsError::InsufficientData`] on an empty slice. A single
    /// sample yields a summary whose `stdev` is `None`.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(StatsError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let stdev = match sample_stdev(values) {
            Ok(s) => Some(s),
            Err(StatsError::InsufficientData { .. }) => None,
            Err(e) => return Err(e),
        };

        Ok(Self {
            count: values.len(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean: mean_of(values),
            median: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            stdev,
        })
    }
}

/// Sample standard deviation (n - 1 denominator)
pub fn sample_stdev(values: &[f64]) -> Result<f64> {
    let n = values.len();
    if n < 2 {
        return Err(StatsError::InsufficientData {
            required: 2,
            actual: n,
        });
    }

    // variance is shift-invariant; centering keeps the f32 lanes small
    let mean = mean_of(values);
    let data: Vec<f32> = values.iter().map(|&v| (v - mean) as f32).collect();
    // trueno's variance divides by n
    let population = trueno::Vector::from_slice(&data)
        .variance()
        .map_err(|e| StatsError::Compute(e.to_string()))?;

    let sample = f64::from(population) * n as f64 / (n - 1) as f64;
    Ok(sample.max(0.0).sqrt())
}

fn mean_of(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear-interpolated percentile over already sorted data
pub fn percentile(sorted_data: &[f64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    if sorted_data.len() == 1 {
        return sorted_data[0];
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_data[lower]
    } else {
        let weight = index - lower as f64;
        sorted_data[lower] * (1.0 - weight) + sorted_data[upper] * weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_summary_multiple_values() {
        let stats = SummaryStats::from_values(&[12.0, 9.0]).unwrap();
        assert_eq!(stats.count, 2);
        assert!(approx(stats.min, 9.0));
        assert!(approx(stats.max, 12.0));
        assert!(approx(stats.mean, 10.5));
        // sample stdev of [12, 9] = sqrt(4.5)
        assert!(approx(stats.stdev.unwrap(), 4.5_f64.sqrt()));
    }

    #[test]
    fn test_summary_single_value_has_no_stdev() {
        let stats = SummaryStats::from_values(&[7.0]).unwrap();
        assert_eq!(stats.count, 1);
        assert!(approx(stats.min, 7.0));
        assert!(approx(stats.max, 7.0));
        assert!(approx(stats.mean, 7.0));
        assert_eq!(stats.stdev, None);
    }

    #[test]
    fn test_single_inexact_duration_is_reported_exactly() {
        // 10.865 has no exact f32 representation
        let stats = SummaryStats::from_values(&[10.865]).unwrap();
        assert_eq!(stats.min, 10.865);
        assert_eq!(stats.max, 10.865);
        assert_eq!(stats.mean, 10.865);
        assert_eq!(stats.median, 10.865);
        assert_eq!(stats.p90, 10.865);
    }

    #[test]
    fn test_summary_order_is_consistent() {
        let stats = SummaryStats::from_values(&[10.865, 3.141_592_653, 25.537, 5.33]).unwrap();
        assert!(stats.min <= stats.median);
        assert!(stats.median <= stats.p90);
        assert!(stats.p90 <= stats.max);
        assert!(stats.min <= stats.mean && stats.mean <= stats.max);
        assert_eq!(stats.min, 3.141_592_653);
        assert_eq!(stats.max, 25.537);
    }

    #[test]
    fn test_sample_stdev_large_offset() {
        // unix-second scale values would lose all precision in raw f32
        let s = sample_stdev(&[1771351120.0, 1771351122.0]).unwrap();
        assert!(approx(s, 2.0_f64.sqrt()));
    }

    #[test]
    fn test_summary_empty_is_error() {
        let err = SummaryStats::from_values(&[]).unwrap_err();
        assert_eq!(
            err,
            StatsError::InsufficientData {
                required: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn test_sample_stdev_single_value() {
        assert!(matches!(
            sample_stdev(&[3.0]),
            Err(StatsError::InsufficientData {
                required: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_sample_stdev_known_value() {
        // mean 5, squared deviations sum to 32, sample variance 32/7
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let s = sample_stdev(&values).unwrap();
        assert!(approx(s, (32.0_f64 / 7.0).sqrt()));
    }

    #[test]
    fn test_sample_stdev_constant() {
        assert!(approx(sample_stdev(&[5.0, 5.0, 5.0]).unwrap(), 0.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!(approx(percentile(&sorted, 50.0), 2.5));
        assert!(approx(percentile(&sorted, 0.0), 1.0));
        assert!(approx(percentile(&sorted, 100.0), 4.0));
    }

    #[test]
    fn test_percentile_edge_cases() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[42.0], 90.0), 42.0);
    }
}
