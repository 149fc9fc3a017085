#![no_main]

use goodput::checkpoint::{compute_write_duration_per_step, CheckpointLogParser, LogPatterns, WriteTimeEntry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let Ok(patterns) = LogPatterns::new() else {
            return;
        };
        let parser = CheckpointLogParser::new(&patterns, true);

        // Arbitrary log content must never panic; errors are fine
        if let Ok(records) = parser.parse_str("nemo_log_globalrank-0_localrank-0.txt", input) {
            let entries: Vec<WriteTimeEntry> = records.iter().map(WriteTimeEntry::from).collect();
            let _ = compute_write_duration_per_step(&entries);
        }
    }
});
