// This module defines the recorder thread, the single owner of the tracking
// `Session`. The capture thread feeds it batches; controllers send it queries
// and observer changes. Messages are handled strictly in arrival order, so
// presses reach the aggregate and the observers in release order.

use crate::config::Config;
use crate::event::Batch;
use crate::session::{Observer, Session};
use crate::stats::Verdict;
use crate::tracker::PressEvent;
use crate::util::format_ms;
use colored::*;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// A closure run on the recorder thread against the live session.
pub type Inspect = Box<dyn FnOnce(&Session) + Send>;

/// Represents a message sent to the recorder thread.
pub enum Message {
    /// One poll worth of raw events from the capture thread.
    Batch(Batch),
    /// Read-only query; the closure sends its answer back on its own channel.
    Inspect(Inspect),
    SetObserver(Option<Observer>),
    Subscribe(Sender<PressEvent>),
    /// Finish the queued messages and hand the session back.
    Shutdown,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Batch(batch) => f.debug_tuple("Batch").field(batch).finish(),
            Message::Inspect(_) => f.write_str("Inspect(..)"),
            Message::SetObserver(observer) => write!(f, "SetObserver(present: {})", observer.is_some()),
            Message::Subscribe(_) => f.write_str("Subscribe(..)"),
            Message::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Output options for the recorder's own logging.
#[derive(Debug, Clone, Default)]
pub struct RecorderOptions {
    pub log_presses: bool,
    pub status_interval: Option<Duration>,
    pub stats_json: bool,
}

impl From<&Config> for RecorderOptions {
    fn from(cfg: &Config) -> Self {
        RecorderOptions {
            log_presses: cfg.log_presses,
            status_interval: cfg.status_interval(),
            stats_json: cfg.stats_json,
        }
    }
}

/// Manages the state and execution loop for the recorder thread.
pub struct Recorder {
    receiver: Receiver<Message>,
    session: Session,
    options: RecorderOptions,
    last_dump_time: Instant,
    // Release time of the first press this recorder saw, for relative timestamps.
    first_release: Option<f64>,
}

impl Recorder {
    pub fn new(receiver: Receiver<Message>, session: Session, options: RecorderOptions) -> Self {
        Recorder {
            receiver,
            session,
            options,
            last_dump_time: Instant::now(),
            first_release: None,
        }
    }

    /// Runs until `Shutdown` arrives or every sender is gone, then returns the session.
    pub fn run(mut self) -> Session {
        // How often to check the timer when idle.
        let check_interval = Duration::from_millis(100);

        loop {
            if let Some(interval) = self.options.status_interval {
                if self.last_dump_time.elapsed() >= interval {
                    self.dump_periodic_status();
                    self.last_dump_time = Instant::now();
                }
            }

            match self.receiver.recv_timeout(check_interval) {
                Ok(Message::Shutdown) => {
                    debug!("Recorder received shutdown, draining queue");
                    while let Ok(msg) = self.receiver.try_recv() {
                        if !matches!(msg, Message::Shutdown) {
                            self.process_message(msg);
                        }
                    }
                    break;
                }
                Ok(msg) => self.process_message(msg),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Recorder channel disconnected");
                    break;
                }
            }
        }

        info!(
            total_presses = self.session.stats().total_presses,
            polling_rate_hz = self.session.polling_rate(),
            "Recorder finished"
        );
        self.session
    }

    /// Processes a single message.
    fn process_message(&mut self, msg: Message) {
        trace!(?msg, "Recorder processing message");
        match msg {
            Message::Batch(batch) => {
                let completed = self.session.process_batch_scored(batch.timestamp, &batch.events);
                for (event, verdict) in &completed {
                    debug!(
                        button = %event.button,
                        duration_ms = event.duration_ms,
                        within_threshold = verdict.within_threshold,
                        "Press completed"
                    );
                    if self.options.log_presses {
                        let line = self.press_line(event, verdict);
                        eprintln!("{line}");
                    }
                }
            }
            Message::Inspect(query) => query(&self.session),
            Message::SetObserver(observer) => self.session.set_observer(observer),
            Message::Subscribe(tx) => self.session.add_subscriber(tx),
            Message::Shutdown => {}
        }
    }

    /// Dumps the current session status to stderr.
    fn dump_periodic_status(&self) {
        eprintln!(
            "\n{} {} {}",
            "--- Periodic Status (Wallclock:".magenta().bold(),
            chrono::Local::now()
                .format("%Y-%m-%d %H:%M:%S%.3f")
                .to_string()
                .on_bright_black()
                .bright_yellow(),
            ") ---".magenta().bold()
        );

        let report = self.session.status();
        if self.options.stats_json {
            report.print_stats_json("Periodic", &mut io::stderr().lock());
        } else {
            report.print_stats_to_stderr("Periodic");
        }
    }

    /// One colored line per completed press, labelled with the verdict it was counted under.
    fn press_line(&mut self, event: &PressEvent, verdict: &Verdict) -> String {
        let status = if verdict.within_threshold {
            "[FAST]".on_green().black().bold()
        } else {
            "[SLOW]".on_red().white().bold()
        };

        let first = *self.first_release.get_or_insert(event.release_time);
        let relative_s = (event.release_time - first).max(0.0);

        format!(
            "{} {} Button [{}] held {} (threshold {})",
            status,
            format_relative(relative_s).on_bright_black().bright_yellow().bold(),
            event.button.as_str().on_bright_black().bright_magenta().bold(),
            format_ms(event.duration_ms).on_bright_black().bright_cyan().bold(),
            format_ms(verdict.threshold_ms)
        )
    }
}

/// Formats a relative timestamp in seconds, padded for alignment in logs.
fn format_relative(relative_s: f64) -> String {
    let s = if relative_s < 0.001 {
        format!("+{:.0} µs", relative_s * 1_000_000.0)
    } else if relative_s < 1.0 {
        format!("+{:.1} ms", relative_s * 1000.0)
    } else {
        format!("+{relative_s:.3} s")
    };
    format!("{s:<10}")
}
