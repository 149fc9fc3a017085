//! CSV output for checkpoint write durations
//!
//! One row per step (`--format csv`), for spreadsheet analysis and machine
//! parsing.

use crate::checkpoint::StepDuration;

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Per-step duration rows
#[derive(Debug, Default)]
pub struct CsvStepOutput {
    steps: Vec<StepDuration>,
}

impl CsvStepOutput {
    /// Create an empty output (header only)
    pub fn new() -> Self {
        Self::default()
    }

    fn header() -> &'static str {
        "checkpoint_step,start_time,end_time,duration,ranks"
    }

    fn format_step(step: &StepDuration) -> String {
        format!(
            "{},{:.3},{:.3},{:.3},{}",
            escape_field(&step.checkpoint_step),
            step.start_time,
            step.end_time,
            step.duration,
            step.ranks
        )
    }

    /// Render the header and one row per step
    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str(Self::header());
        output.push('\n');

        for step in &self.steps {
            output.push_str(&Self::format_step(step));
            output.push('\n');
        }

        output
    }
}

impl FromIterator<StepDuration> for CsvStepOutput {
    fn from_iter<T: IntoIterator<Item = StepDuration>>(iter: T) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}
