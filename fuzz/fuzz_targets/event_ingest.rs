#![no_main]

use libfuzzer_sys::fuzz_target;
use tracelines::config::TimelineConfig;
use tracelines::ingest::{parse_events, InputFormat};
use tracelines::pipeline::compute_timeline;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed input must surface as an error, never a panic
        if let Ok(events) = parse_events(input, InputFormat::Auto) {
            let _ = compute_timeline(&events, &TimelineConfig::default());
        }
    }
});
