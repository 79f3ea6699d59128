//! The public control surface: start and stop monitoring, adjust settings,
//! register observers, and read copies of the session state.
//!
//! While running, two threads do the work. The capture thread blocks on the
//! input source and forwards each batch; the recorder thread owns the
//! [`Session`] and answers queries sent to it as closures. After `stop` the
//! session comes back to the `Monitor` and is queried in place.

use crate::config::{QUERY_TIMEOUT, RETRY_DELAY, STOP_TIMEOUT};
use crate::diagnostics::{ConnectionType, DiagnosticSnapshot, SessionSummary};
use crate::event::{DeviceProvider, InputSource, SourceError};
use crate::latency::LatencyStats;
use crate::recorder::{Message, Recorder, RecorderOptions};
use crate::session::{Session, Settings};
use crate::stats::{SessionStats, StatusReport};
use crate::tracker::PressEvent;
use crate::util::unix_seconds;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::io;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

struct Worker {
    sender: Sender<Message>,
    capture: JoinHandle<()>,
    recorder: JoinHandle<Option<Session>>,
}

impl Worker {
    /// Waits (bounded) for the capture thread, then stops the recorder and takes its session back.
    fn shutdown(self) -> Option<Session> {
        let deadline = Instant::now() + STOP_TIMEOUT;
        while !self.capture.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        if self.capture.is_finished() {
            if self.capture.join().is_err() {
                error!("Capture thread panicked");
            }
        } else {
            // A read blocked in the kernel cannot be interrupted from here.
            warn!(timeout = ?STOP_TIMEOUT, "Capture thread still blocked in a read, abandoning it");
        }

        let _ = self.sender.send(Message::Shutdown);
        drop(self.sender);
        match self.recorder.join() {
            Ok(session) => session,
            Err(_) => {
                error!("Recorder thread panicked, session data lost");
                None
            }
        }
    }
}

enum Engine {
    /// Not monitoring; the session is owned here. The lock lets readers on
    /// several threads query it through `&Monitor`.
    Idle(Box<Mutex<Session>>),
    Running(Worker),
    /// The recorder panicked and took the session with it.
    Lost,
}

pub struct Monitor {
    settings: Arc<Settings>,
    trigger_threshold: i32,
    options: RecorderOptions,
    // Replaced on every start so an abandoned capture thread cannot touch a later session's flag.
    running: Arc<AtomicBool>,
    device_name: String,
    connection_type: ConnectionType,
    engine: Engine,
}

impl Monitor {
    pub fn new(settings: Arc<Settings>, trigger_threshold: i32, options: RecorderOptions) -> Self {
        let session = Session::new(Arc::clone(&settings), trigger_threshold);
        Monitor {
            settings,
            trigger_threshold,
            options,
            running: Arc::new(AtomicBool::new(false)),
            device_name: String::new(),
            connection_type: ConnectionType::Unknown,
            engine: idle(session),
        }
    }

    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Monitor::new(
            Arc::new(Settings::new(cfg.threshold_ms, cfg.button.clone())),
            cfg.trigger_threshold,
            RecorderOptions::from(cfg),
        )
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn threshold_ms(&self) -> f64 {
        self.settings.threshold_ms()
    }

    /// Sets the hold-duration goal; values below 1 ms are raised to 1 ms.
    /// Presses already counted keep their outcome.
    pub fn set_threshold_ms(&self, threshold_ms: f64) {
        self.settings.set_threshold_ms(threshold_ms);
        info!(threshold_ms = self.settings.threshold_ms(), "Threshold updated");
    }

    pub fn monitored_button(&self) -> Option<String> {
        self.settings.monitored_button()
    }

    /// Restricts tracking to one button, or all buttons with `None`.
    /// Names outside [`available_buttons`](Self::available_buttons) are accepted but never match.
    pub fn set_monitored_button(&self, button: Option<String>) {
        if let Some(name) = button.as_deref() {
            if !crate::classify::controls::is_button_name(name) {
                warn!(button = name, "Monitored button is not a known button name");
            }
        }
        info!(button = button.as_deref().unwrap_or("<all>"), "Monitored button updated");
        self.settings.set_monitored_button(button);
    }

    pub fn available_buttons(&self) -> &'static [&'static str] {
        crate::classify::controls::available_buttons()
    }

    /// Replaces the press observer. It runs on the recorder thread, once per
    /// completed press in release order. A panic inside it is caught and logged.
    /// Calling back into this `Monitor` from the observer will time out.
    pub fn set_observer(&mut self, observer: impl FnMut(&PressEvent) + Send + 'static) {
        self.replace_observer(Some(Box::new(observer)));
    }

    pub fn clear_observer(&mut self) {
        self.replace_observer(None);
    }

    fn replace_observer(&mut self, observer: Option<crate::session::Observer>) {
        match &mut self.engine {
            Engine::Idle(session) => idle_mut(session).set_observer(observer),
            Engine::Running(worker) => {
                if worker.sender.send(Message::SetObserver(observer)).is_err() {
                    warn!("Recorder is gone, observer not installed");
                }
            }
            Engine::Lost => warn!("Session lost, observer not installed"),
        }
    }

    /// A channel of every press completed from now on. Drop the receiver to unsubscribe.
    pub fn subscribe(&mut self) -> Receiver<PressEvent> {
        match &mut self.engine {
            Engine::Idle(session) => idle_mut(session).subscribe(),
            Engine::Running(worker) => {
                let (tx, rx) = unbounded();
                if worker.sender.send(Message::Subscribe(tx)).is_err() {
                    warn!("Recorder is gone, subscription will never receive presses");
                }
                rx
            }
            Engine::Lost => unbounded().1,
        }
    }

    /// Detects a device and starts monitoring it. Returns `false`, without
    /// spawning anything, if no device is found. Already running is success.
    pub fn start(&mut self, provider: &mut dyn DeviceProvider) -> bool {
        if self.is_running() {
            return true;
        }
        // A previous run that ended on its own (disconnect) still has threads to reap.
        if matches!(self.engine, Engine::Running(_)) {
            self.stop();
        }

        let Some(source) = provider.detect() else {
            warn!("No controller detected");
            return false;
        };

        let mut session = match mem::replace(&mut self.engine, Engine::Lost) {
            Engine::Idle(session) => into_session(*session),
            _ => Session::new(Arc::clone(&self.settings), self.trigger_threshold),
        };
        self.device_name = source.device_name().to_string();
        self.connection_type = ConnectionType::from_device_name(&self.device_name);

        let (sender, receiver) = unbounded();
        let builder = thread::Builder::new().name("tapmeter-recorder".into());
        let (recorder, handoff) = match spawn_recorder(builder, receiver, self.options.clone()) {
            Ok(spawned) => spawned,
            Err(e) => {
                error!(error = %e, "Failed to spawn recorder thread");
                self.engine = idle(session);
                return false;
            }
        };

        let running = Arc::new(AtomicBool::new(true));
        let capture_sender = sender.clone();
        let capture_running = Arc::clone(&running);
        let capture = thread::Builder::new()
            .name("tapmeter-capture".into())
            .spawn(move || capture_loop(source, capture_sender, capture_running));
        let capture = match capture {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Failed to spawn capture thread");
                // The recorder never received a session; dropping the handoff ends it.
                drop(handoff);
                let _ = recorder.join();
                self.engine = idle(session);
                return false;
            }
        };

        session.begin(&self.device_name, unix_seconds());
        if let Err(returned) = handoff.send(session) {
            error!("Recorder thread exited before receiving the session");
            running.store(false, Ordering::SeqCst);
            self.engine = idle(returned.into_inner());
            return false;
        }
        self.running = running;

        self.engine = Engine::Running(Worker {
            sender,
            capture,
            recorder,
        });
        info!(
            device = %self.device_name,
            connection = %self.connection_type,
            threshold_ms = self.settings.threshold_ms(),
            button = self.settings.monitored_button().as_deref().unwrap_or("<all>"),
            "Monitoring started"
        );
        true
    }

    /// Stops monitoring and returns the final statistics. The session stays
    /// queryable until the next `start`.
    pub fn stop(&mut self) -> SessionStats {
        self.running.store(false, Ordering::SeqCst);
        self.engine = match mem::replace(&mut self.engine, Engine::Lost) {
            Engine::Running(worker) => match worker.shutdown() {
                Some(session) => idle(session),
                None => Engine::Lost,
            },
            other => other,
        };

        let stats = self.stats();
        info!(total_presses = stats.total_presses, "Monitoring stopped");
        stats
    }

    /// `false` once stopped or after the device disconnected.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs `f` against the session and returns its result. While running, `f`
    /// executes on the recorder thread; `None` if the recorder does not answer.
    pub fn inspect<T, F>(&self, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&Session) -> T + Send + 'static,
    {
        match &self.engine {
            Engine::Idle(session) => {
                let session = lock(session);
                Some(f(&*session))
            }
            Engine::Running(worker) => {
                let (reply_tx, reply_rx) = bounded(1);
                let query = Box::new(move |session: &Session| {
                    let _ = reply_tx.send(f(session));
                });
                worker.sender.send(Message::Inspect(query)).ok()?;
                match reply_rx.recv_timeout(QUERY_TIMEOUT) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(error = %e, "Recorder did not answer query");
                        None
                    }
                }
            }
            Engine::Lost => None,
        }
    }

    /// The last `n` completed presses, oldest first.
    pub fn recent_presses(&self, n: usize) -> Vec<PressEvent> {
        self.inspect(move |s| s.recent(n)).unwrap_or_default()
    }

    pub fn press_log(&self) -> Vec<PressEvent> {
        self.inspect(Session::all).unwrap_or_default()
    }

    pub fn average_duration(&self) -> f64 {
        self.inspect(Session::average_duration).unwrap_or_default()
    }

    pub fn polling_rate(&self) -> f64 {
        self.inspect(Session::polling_rate).unwrap_or_default()
    }

    pub fn latency_stats(&self) -> LatencyStats {
        self.inspect(Session::latency_stats).unwrap_or_default()
    }

    pub fn session_elapsed(&self) -> Duration {
        self.inspect(Session::elapsed).unwrap_or_default()
    }

    pub fn stats(&self) -> SessionStats {
        self.inspect(Session::snapshot).unwrap_or_default()
    }

    /// Current connection diagnostics.
    pub fn snapshot(&self) -> DiagnosticSnapshot {
        self.inspect(Session::diagnostics).unwrap_or_default()
    }

    pub fn status(&self) -> Option<StatusReport> {
        self.inspect(Session::status)
    }

    pub fn summary(&self) -> SessionSummary {
        self.inspect(Session::summary).unwrap_or_default()
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if matches!(self.engine, Engine::Running(_)) {
            self.stop();
        }
    }
}

fn idle(session: Session) -> Engine {
    Engine::Idle(Box::new(Mutex::new(session)))
}

// Readers never mutate the session, so a poisoned lock still guards consistent data.
fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn idle_mut(session: &mut Mutex<Session>) -> &mut Session {
    session.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn into_session(session: Mutex<Session>) -> Session {
    session.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Spawns the recorder thread before it owns anything. The session is handed
/// over on the returned sender once the rest of the pipeline is up; if the
/// sender is dropped instead, the thread exits with `None`.
fn spawn_recorder(
    builder: thread::Builder,
    receiver: Receiver<Message>,
    options: RecorderOptions,
) -> io::Result<(JoinHandle<Option<Session>>, Sender<Session>)> {
    let (handoff_tx, handoff_rx) = bounded::<Session>(1);
    let handle = builder.spawn(move || {
        let session = handoff_rx.recv().ok()?;
        Some(Recorder::new(receiver, session, options).run())
    })?;
    Ok((handle, handoff_tx))
}

/// Reads batches until stopped, disconnected, or the recorder goes away.
fn capture_loop(mut source: Box<dyn InputSource>, sender: Sender<Message>, running: Arc<AtomicBool>) {
    debug!(device = source.device_name(), "Capture thread started");
    while running.load(Ordering::SeqCst) {
        match source.next_batch() {
            Ok(batch) => {
                if sender.send(Message::Batch(batch)).is_err() {
                    debug!("Recorder channel closed, capture exiting");
                    break;
                }
            }
            Err(SourceError::Disconnected) => {
                warn!(device = source.device_name(), "Controller disconnected");
                break;
            }
            Err(SourceError::Transient(e)) => {
                warn!(error = %e, "Input read failed, retrying");
                thread::sleep(RETRY_DELAY);
            }
        }
    }
    running.store(false, Ordering::SeqCst);
    debug!("Capture thread exiting");
}
