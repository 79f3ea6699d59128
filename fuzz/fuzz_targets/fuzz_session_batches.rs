// fuzz/fuzz_targets/fuzz_session_batches.rs
#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use tapmeter::diagnostics::analyze_durations;
use tapmeter::event::RawEvent;
use tapmeter::{Session, Settings};

const CODES: [&str; 10] = [
    "BTN_SOUTH", "BTN_EAST", "BTN_TL", "BTN_START", "ABS_X", "ABS_Z", "ABS_RZ", "ABS_HAT0X",
    "ABS_HAT0Y", "KEY_A",
];

#[derive(Debug, Arbitrary)]
struct FuzzEvent {
    code_index: u8,
    state: i32,
}

#[derive(Debug, Arbitrary)]
struct FuzzBatch {
    // Milliseconds since the previous batch; may be negative to exercise clock skew.
    delta_ms: i16,
    events: Vec<FuzzEvent>,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    threshold_ms: f64,
    trigger_threshold: i32,
    monitored: Option<u8>,
    batches: Vec<FuzzBatch>,
}

fuzz_target!(|input: FuzzInput| {
    let monitored = input
        .monitored
        .and_then(|i| tapmeter::available_buttons().get(usize::from(i)).copied())
        .map(str::to_string);
    let settings = Arc::new(Settings::new(input.threshold_ms, monitored));
    assert!(settings.threshold_ms() >= 1.0);

    let mut session = Session::new(settings, input.trigger_threshold);
    session.begin("fuzz", 0.0);

    let mut t = 0.0;
    for batch in input.batches.iter().take(1000) {
        t += f64::from(batch.delta_ms) / 1000.0;
        let events: Vec<RawEvent> = batch
            .events
            .iter()
            .map(|e| RawEvent {
                code: CODES[usize::from(e.code_index) % CODES.len()],
                state: e.state,
            })
            .collect();
        session.process_batch(t, &events);
    }

    let stats = session.stats();
    assert!(stats.threshold_successes <= stats.total_presses);
    let durations = stats.durations();
    if let Ok(report) = analyze_durations(&durations) {
        assert_eq!(report.samples, durations.len());
    }
    let _ = session.snapshot();
});
