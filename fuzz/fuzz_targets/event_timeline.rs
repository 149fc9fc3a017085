#![no_main]

use goodput::goodput::{calculate_goodput, normalize, parse_event_lines};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Malformed lines are skipped, never fatal
    let Ok(events) = parse_event_lines(data) else {
        return;
    };

    let timeline = normalize(&events, None);
    assert_eq!(normalize(&timeline, None), timeline);
    let _ = calculate_goodput(&events, Some(1.0));
});
