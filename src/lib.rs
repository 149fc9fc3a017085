//! goodput - checkpoint resiliency and training goodput metrics
//!
//! Two analyses over training-job telemetry:
//!
//! - [`checkpoint`]: pairs asynchronous checkpoint write markers in
//!   per-rank logs and aggregates cross-rank write durations per step
//! - [`goodput`]: normalizes lifecycle events into a canonical timeline
//!   and derives runtime, effective computation time and goodput

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod csv_output;
pub mod goodput;
pub mod json_output;
pub mod stats;
