// The tracking engine for one monitoring session. A `Session` owns every piece
// of mutable state (classifier edge flags, open presses, press log, aggregate
// and poll window) and is driven by a single thread; everything it hands out
// is a copy. Only `Settings` is shared, because the threshold and the button
// filter are changed from outside while the session runs.

use crate::classify::{EventClassifier, TransitionKind};
use crate::diagnostics::{self, ConnectionType, DiagnosticSnapshot, SessionSummary};
use crate::event::RawEvent;
use crate::latency::{LatencyStats, LatencyWindow};
use crate::stats::{Meta, SessionStats, SessionStatsAggregator, StatusReport, Verdict};
use crate::tracker::{PressEvent, PressTracker};
use crate::util::round_to;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{trace, warn};

/// Smallest accepted threshold in milliseconds.
pub const MIN_THRESHOLD_MS: f64 = 1.0;

/// Runtime-adjustable tracking settings, shared between the engine and its controllers.
#[derive(Debug)]
pub struct Settings {
    // f64 bit pattern of the threshold in milliseconds.
    threshold_bits: AtomicU64,
    monitored_button: RwLock<Option<String>>,
}

impl Settings {
    pub fn new(threshold_ms: f64, monitored_button: Option<String>) -> Self {
        Settings {
            threshold_bits: AtomicU64::new(clamp_threshold(threshold_ms).to_bits()),
            monitored_button: RwLock::new(monitored_button),
        }
    }

    pub fn threshold_ms(&self) -> f64 {
        f64::from_bits(self.threshold_bits.load(Ordering::Relaxed))
    }

    /// Sets the threshold, clamped to at least 1 ms. Applies to the next completed press.
    pub fn set_threshold_ms(&self, threshold_ms: f64) {
        self.threshold_bits
            .store(clamp_threshold(threshold_ms).to_bits(), Ordering::Relaxed);
    }

    pub fn monitored_button(&self) -> Option<String> {
        match self.monitored_button.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Restricts tracking to `button`, or accepts every button with `None`.
    pub fn set_monitored_button(&self, button: Option<String>) {
        let mut guard = match self.monitored_button.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = button;
    }

    /// Returns `true` if transitions for `button` should reach the tracker.
    pub fn accepts(&self, button: &str) -> bool {
        let guard = match self.monitored_button.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.as_deref().map_or(true, |monitored| monitored == button)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new(crate::config::DEFAULT_THRESHOLD_MS, None)
    }
}

// NaN is treated like any other too-small value.
fn clamp_threshold(threshold_ms: f64) -> f64 {
    if threshold_ms >= MIN_THRESHOLD_MS {
        threshold_ms
    } else {
        MIN_THRESHOLD_MS
    }
}

/// Callback invoked with every completed press, in release order.
pub type Observer = Box<dyn FnMut(&PressEvent) + Send>;

pub struct Session {
    settings: Arc<Settings>,
    classifier: EventClassifier,
    tracker: PressTracker,
    aggregator: SessionStatsAggregator,
    latency: LatencyWindow,
    observer: Option<Observer>,
    subscribers: Vec<Sender<PressEvent>>,
    device_name: String,
    connection_type: ConnectionType,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device_name", &self.device_name)
            .field("connection_type", &self.connection_type)
            .field("presses", &self.tracker.len())
            .field("polls", &self.latency.len())
            .field("has_observer", &self.observer.is_some())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Session {
    pub fn new(settings: Arc<Settings>, trigger_threshold: i32) -> Self {
        Session {
            aggregator: SessionStatsAggregator::new(Arc::clone(&settings)),
            settings,
            classifier: EventClassifier::new(trigger_threshold),
            tracker: PressTracker::new(),
            latency: LatencyWindow::with_capacity(crate::config::POLL_CAPACITY),
            observer: None,
            subscribers: Vec::new(),
            device_name: String::new(),
            connection_type: ConnectionType::Unknown,
        }
    }

    /// Clears all tracking state and starts a new session on `device_name`.
    /// Observers and subscribers are kept.
    pub fn begin(&mut self, device_name: &str, start_time: f64) {
        self.reset(start_time);
        self.device_name = device_name.to_string();
        self.connection_type = ConnectionType::from_device_name(device_name);
    }

    pub fn reset(&mut self, start_time: f64) {
        self.classifier.reset();
        self.tracker.clear();
        self.aggregator.reset(start_time);
        self.latency.clear();
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Records one poll and runs its events through classification, filtering and tracking.
    ///
    /// All events in the batch share the poll timestamp. Returns the presses the
    /// batch completed, after they have been aggregated and delivered to observers.
    pub fn process_batch(&mut self, timestamp: f64, events: &[RawEvent]) -> Vec<PressEvent> {
        self.process_batch_scored(timestamp, events)
            .into_iter()
            .map(|(event, _)| event)
            .collect()
    }

    /// Like [`process_batch`](Self::process_batch), paired with the verdict each press was counted under.
    pub fn process_batch_scored(&mut self, timestamp: f64, events: &[RawEvent]) -> Vec<(PressEvent, Verdict)> {
        self.latency.record_poll(timestamp);

        let mut completed = Vec::new();
        for raw in events {
            // Classify before filtering so axis edge state stays current for every code.
            let Some(transition) = self.classifier.classify(raw.code, raw.state, timestamp) else {
                continue;
            };
            if !self.settings.accepts(transition.button) {
                trace!(button = transition.button, "Transition for unmonitored button dropped");
                continue;
            }

            match transition.kind {
                TransitionKind::Press => self.tracker.on_press(transition.button, timestamp),
                TransitionKind::Release => {
                    if let Some(event) = self.tracker.on_release(transition.button, timestamp) {
                        let verdict = self.aggregator.update(&event);
                        self.notify(&event);
                        completed.push((event, verdict));
                    }
                }
            }
        }
        completed
    }

    /// Records a poll that carried no events.
    pub fn record_poll(&mut self, timestamp: f64) {
        self.latency.record_poll(timestamp);
    }

    fn notify(&mut self, event: &PressEvent) {
        if let Some(observer) = self.observer.as_mut() {
            if panic::catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
                warn!(button = %event.button, duration_ms = event.duration_ms, "Press observer panicked");
            }
        }
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Replaces the press observer.
    pub fn set_observer(&mut self, observer: Option<Observer>) {
        self.observer = observer;
    }

    /// Opens a new channel that receives every press completed from now on.
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<PressEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn add_subscriber(&mut self, tx: Sender<PressEvent>) {
        self.subscribers.push(tx);
    }

    pub fn stats(&self) -> &SessionStats {
        self.aggregator.stats()
    }

    pub fn snapshot(&self) -> SessionStats {
        self.aggregator.snapshot()
    }

    pub fn recent(&self, n: usize) -> Vec<PressEvent> {
        self.tracker.recent(n)
    }

    pub fn all(&self) -> Vec<PressEvent> {
        self.tracker.all()
    }

    pub fn average_duration(&self) -> f64 {
        self.tracker.average_duration()
    }

    pub fn polling_rate(&self) -> f64 {
        self.latency.polling_rate_hz()
    }

    pub fn latency_stats(&self) -> LatencyStats {
        self.latency.latency_stats()
    }

    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        diagnostics::take_snapshot(self.polling_rate(), &self.latency_stats())
    }

    pub fn elapsed(&self) -> Duration {
        self.aggregator.stats().elapsed()
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            meta: Meta {
                threshold_ms: self.settings.threshold_ms(),
                monitored_button: self.settings.monitored_button(),
                device_name: self.device_name.clone(),
                connection_type: self.connection_type.to_string(),
                elapsed_s: round_to(self.elapsed().as_secs_f64(), 1),
            },
            stats: self.snapshot(),
            average_duration_ms: self.average_duration(),
            diagnostics: self.diagnostics(),
        }
    }

    /// Condenses the session into the record kept in session history.
    pub fn summary(&self) -> SessionSummary {
        let stats = self.aggregator.stats();
        let latency = self.latency_stats();
        SessionSummary {
            timestamp: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            button: self
                .settings
                .monitored_button()
                .unwrap_or_else(|| "All".to_string()),
            press_count: stats.total_presses,
            session_duration_s: round_to(self.elapsed().as_secs_f64(), 1),
            min_duration_ms: stats.min_duration_or_zero(),
            avg_duration_ms: self.average_duration(),
            max_duration_ms: stats.max_duration_ms,
            connection_type: self.connection_type.to_string(),
            latency_avg_ms: latency.avg,
            jitter_ms: latency.jitter,
            threshold_ms: self.settings.threshold_ms(),
            threshold_successes: stats.threshold_successes,
        }
    }
}
