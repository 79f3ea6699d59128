//! Common helper functions for tests and benchmarks.
use input_linux_sys::{input_event, timeval, EV_ABS, EV_KEY, EV_SYN};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tapmeter::event::{Batch, DeviceProvider, InputSource, RawEvent, SourceError};

// --- Constants (linux/input-event-codes.h) ---
pub const BTN_SOUTH: u16 = 304;
pub const BTN_EAST: u16 = 305;
pub const BTN_NORTH: u16 = 307;
pub const BTN_WEST: u16 = 308;
pub const BTN_TL: u16 = 310;
pub const BTN_MODE: u16 = 316;
pub const ABS_X: u16 = 0;
pub const ABS_Z: u16 = 2;
pub const ABS_RZ: u16 = 5;
pub const ABS_HAT0X: u16 = 16;

// --- Raw Event Creation Helpers ---

fn ev(ts_us: u64, type_: i32, code: u16, value: i32) -> input_event {
    input_event {
        time: timeval {
            tv_sec: (ts_us / 1_000_000) as _,
            tv_usec: (ts_us % 1_000_000) as _,
        },
        type_: type_ as u16,
        code,
        value,
    }
}

/// Creates an EV_KEY input_event with a specific microsecond timestamp.
pub fn key_ev(ts_us: u64, code: u16, value: i32) -> input_event {
    ev(ts_us, EV_KEY, code, value)
}

/// Creates an EV_ABS input_event with a specific microsecond timestamp.
pub fn abs_ev(ts_us: u64, code: u16, value: i32) -> input_event {
    ev(ts_us, EV_ABS, code, value)
}

/// Creates an EV_SYN/SYN_REPORT event, closing a report.
pub fn syn_ev(ts_us: u64) -> input_event {
    ev(ts_us, EV_SYN, 0, 0)
}

/// A full report: the given key/abs events followed by SYN_REPORT, all at `ts_us`.
pub fn report(ts_us: u64, events: &[(i32, u16, i32)]) -> Vec<input_event> {
    let mut out: Vec<input_event> = events
        .iter()
        .map(|&(type_, code, value)| ev(ts_us, type_, code, value))
        .collect();
    out.push(syn_ev(ts_us));
    out
}

/// A press report at `press_us` and a release report at `release_us` for a digital button.
pub fn tap(code: u16, press_us: u64, release_us: u64) -> Vec<input_event> {
    let mut out = report(press_us, &[(EV_KEY, code, 1)]);
    out.extend(report(release_us, &[(EV_KEY, code, 0)]));
    out
}

/// Serializes events into the byte stream the binary reads on stdin.
pub fn events_to_bytes(events: &[input_event]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(events));
    for event in events {
        tapmeter::event::write_event(&mut bytes, event).expect("Failed to write event to byte vector");
    }
    bytes
}

// --- Batch Helpers ---

/// Builds a batch from `(code, state)` pairs.
pub fn batch(timestamp: f64, events: &[(&'static str, i32)]) -> Batch {
    Batch {
        timestamp,
        events: events.iter().map(|&(code, state)| RawEvent { code, state }).collect(),
    }
}

/// Batches for one press of `code` (digital) lasting `hold_s` seconds.
pub fn tap_batches(code: &'static str, press_time: f64, hold_s: f64) -> [Batch; 2] {
    [
        batch(press_time, &[(code, 1)]),
        batch(press_time + hold_s, &[(code, 0)]),
    ]
}

// --- Scripted Input ---

/// What a `ScriptedSource` does once its script runs out.
#[derive(Debug, Clone, Copy)]
pub enum Tail {
    /// Report a disconnect immediately.
    Disconnect,
    /// Sleep this long (a read that never completes) and then disconnect.
    Block(Duration),
}

/// An `InputSource` that replays a fixed script of results.
pub struct ScriptedSource {
    name: String,
    script: VecDeque<Result<Batch, SourceError>>,
    tail: Tail,
    // Optional pause before each scripted result, to let tests observe a running monitor.
    pace: Duration,
}

impl ScriptedSource {
    pub fn new(name: &str, batches: impl IntoIterator<Item = Batch>) -> Self {
        ScriptedSource {
            name: name.to_string(),
            script: batches.into_iter().map(Ok).collect(),
            tail: Tail::Disconnect,
            pace: Duration::ZERO,
        }
    }

    pub fn with_tail(mut self, tail: Tail) -> Self {
        self.tail = tail;
        self
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Queues a transient read error after the batches scripted so far.
    pub fn push_transient(mut self, message: &str) -> Self {
        self.script.push_back(Err(SourceError::Transient(std::io::Error::new(
            std::io::ErrorKind::Other,
            message.to_string(),
        ))));
        self
    }

    pub fn push(mut self, batch: Batch) -> Self {
        self.script.push_back(Ok(batch));
        self
    }
}

impl InputSource for ScriptedSource {
    fn next_batch(&mut self) -> Result<Batch, SourceError> {
        if !self.pace.is_zero() {
            std::thread::sleep(self.pace);
        }
        match self.script.pop_front() {
            Some(result) => result,
            None => {
                if let Tail::Block(duration) = self.tail {
                    std::thread::sleep(duration);
                }
                Err(SourceError::Disconnected)
            }
        }
    }

    fn device_name(&self) -> &str {
        &self.name
    }
}

/// Hands out a prepared source once; later detections find nothing.
pub struct ScriptedProvider {
    source: Option<ScriptedSource>,
}

impl ScriptedProvider {
    pub fn new(source: ScriptedSource) -> Self {
        ScriptedProvider { source: Some(source) }
    }

    /// A provider that never finds a device.
    pub fn empty() -> Self {
        ScriptedProvider { source: None }
    }
}

impl DeviceProvider for ScriptedProvider {
    fn detect(&mut self) -> Option<Box<dyn InputSource>> {
        let source = self.source.take()?;
        Some(Box::new(source))
    }
}

// --- Waiting ---

/// Polls `condition` every few milliseconds until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
