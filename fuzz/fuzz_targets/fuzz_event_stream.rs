// fuzz/fuzz_targets/fuzz_event_stream.rs
#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use std::sync::Arc;
use tapmeter::event::{EvdevSource, InputSource};
use tapmeter::{Session, Settings};

// Bounds the work done per case so a long input cannot stall the run.
const MAX_BATCHES_PER_FUZZ_CASE: usize = 1000;

fuzz_target!(|data: &[u8]| {
    // Raw bytes are read as a stream of input_event structs, exactly as from a device.
    let mut source = EvdevSource::new(Cursor::new(data), "fuzz");
    let settings = Arc::new(Settings::default());
    let mut session = Session::new(settings, tapmeter::classify::DEFAULT_TRIGGER_THRESHOLD);
    session.begin(source.device_name(), 0.0);

    for _ in 0..MAX_BATCHES_PER_FUZZ_CASE {
        let Ok(batch) = source.next_batch() else {
            break;
        };
        for press in session.process_batch(batch.timestamp, &batch.events) {
            assert!(!press.button.is_empty());
        }
    }

    let stats = session.stats();
    let counted: u64 = stats.presses_per_button.values().sum();
    assert_eq!(counted, stats.total_presses);
    let _ = session.status();
    let _ = session.summary();
});
