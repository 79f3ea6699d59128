use crate::diagnostics::DiagnosticSnapshot;
use crate::session::Settings;
use crate::tracker::PressEvent;
use crate::util::{format_ms, unix_seconds};
use colored::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// One entry of the session's duration history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationSample {
    pub release_time: f64,
    pub duration_ms: f64,
    pub button: String,
}

/// Cumulative statistics for one monitoring session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    /// Seconds since the Unix epoch when the session started; 0.0 if never started.
    pub start_time: f64,
    pub total_presses: u64,
    pub presses_per_button: BTreeMap<String, u64>,
    /// `+∞` until the first press.
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub last_duration_ms: f64,
    pub threshold_successes: u64,
    /// Whether the most recent press was at or under the threshold.
    pub below_threshold: bool,
    pub durations_history: Vec<DurationSample>,
}

impl Default for SessionStats {
    fn default() -> Self {
        SessionStats::new(0.0)
    }
}

impl SessionStats {
    pub fn new(start_time: f64) -> Self {
        SessionStats {
            start_time,
            total_presses: 0,
            presses_per_button: BTreeMap::new(),
            min_duration_ms: f64::INFINITY,
            max_duration_ms: 0.0,
            last_duration_ms: 0.0,
            threshold_successes: 0,
            below_threshold: false,
            durations_history: Vec::with_capacity(256),
        }
    }

    /// Wall-clock time since `start_time`; zero for a session that never started.
    pub fn elapsed(&self) -> Duration {
        if self.start_time == 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((unix_seconds() - self.start_time).max(0.0))
    }

    /// Minimum duration with the "no presses yet" sentinel mapped to 0.0.
    pub fn min_duration_or_zero(&self) -> f64 {
        if self.min_duration_ms.is_finite() {
            self.min_duration_ms
        } else {
            0.0
        }
    }

    /// Percentage of presses at or under the threshold.
    pub fn success_rate(&self) -> f64 {
        if self.total_presses == 0 {
            0.0
        } else {
            self.threshold_successes as f64 / self.total_presses as f64 * 100.0
        }
    }

    /// Just the durations, in the order the presses were released.
    pub fn durations(&self) -> Vec<f64> {
        self.durations_history.iter().map(|s| s.duration_ms).collect()
    }
}

/// How one press was scored: the threshold in force and whether the press met it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub threshold_ms: f64,
    pub within_threshold: bool,
}

/// Owns the live `SessionStats` and folds completed presses into it.
#[derive(Debug)]
pub struct SessionStatsAggregator {
    settings: Arc<Settings>,
    stats: SessionStats,
}

impl SessionStatsAggregator {
    pub fn new(settings: Arc<Settings>) -> Self {
        SessionStatsAggregator {
            settings,
            stats: SessionStats::default(),
        }
    }

    /// Starts a fresh session at `start_time`.
    pub fn reset(&mut self, start_time: f64) {
        self.stats = SessionStats::new(start_time);
    }

    /// Folds one completed press into the session.
    ///
    /// The threshold is read from the shared settings now, so a change applies
    /// to the next press and never to presses already counted. The returned
    /// verdict is the one that was counted.
    pub fn update(&mut self, event: &PressEvent) -> Verdict {
        let threshold_ms = self.settings.threshold_ms();
        let d = event.duration_ms;
        let stats = &mut self.stats;

        stats.total_presses += 1;
        stats.last_duration_ms = d;
        *stats.presses_per_button.entry(event.button.clone()).or_insert(0) += 1;

        if d < stats.min_duration_ms {
            stats.min_duration_ms = d;
        }
        if d > stats.max_duration_ms {
            stats.max_duration_ms = d;
        }

        // Success means short enough: the goal is to stay under the threshold.
        stats.below_threshold = d <= threshold_ms;
        if stats.below_threshold {
            stats.threshold_successes += 1;
        }

        stats.durations_history.push(DurationSample {
            release_time: event.release_time,
            duration_ms: d,
            button: event.button.clone(),
        });

        Verdict {
            threshold_ms,
            within_threshold: stats.below_threshold,
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn snapshot(&self) -> SessionStats {
        self.stats.clone()
    }

    pub fn into_stats(self) -> SessionStats {
        self.stats
    }
}

/// Context printed alongside the statistics.
#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub threshold_ms: f64,
    pub monitored_button: Option<String>,
    pub device_name: String,
    pub connection_type: String,
    pub elapsed_s: f64,
}

/// Everything a status dump shows: session counters, averages, and connection diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub meta: Meta,
    pub stats: SessionStats,
    pub average_duration_ms: f64,
    pub diagnostics: DiagnosticSnapshot,
}

impl StatusReport {
    /// Print human-readable stats to stderr.
    pub fn print_stats_to_stderr(&self, report_type: &str) {
        let meta = &self.meta;
        let stats = &self.stats;

        eprintln!(
            "{}",
            format!("--- tapmeter status ({report_type}) ---")
                .on_bright_black()
                .bold()
                .blue()
                .underline()
        );
        eprintln!(
            "{} {}",
            "Device:".on_bright_black().bold().bright_cyan(),
            format!("{} ({})", meta.device_name, meta.connection_type)
                .on_bright_black()
                .bright_cyan()
                .bold()
        );
        eprintln!(
            "{} {}",
            "Threshold:".on_bright_black().bold().bright_yellow(),
            format_ms(meta.threshold_ms).on_bright_black().bright_yellow().bold()
        );
        eprintln!(
            "{} {}",
            "Monitored Button:".on_bright_black().bold().bright_magenta(),
            match &meta.monitored_button {
                Some(button) => button.as_str().on_bright_black().bright_magenta().bold(),
                None => "All".on_bright_black().dimmed(),
            }
        );
        eprintln!(
            "{} {}",
            "Session Time:".on_bright_black().bold().bright_white(),
            crate::util::format_duration(Duration::from_secs(meta.elapsed_s as u64))
                .on_bright_black()
                .bright_white()
                .bold()
        );

        eprintln!("\n{}", "--- Press Durations ---".on_bright_black().bold().blue().underline());
        eprintln!(
            "{} {}",
            "Total Presses:".on_bright_black().bold().bright_white(),
            stats.total_presses.to_string().on_bright_black().bright_white().bold()
        );
        if stats.total_presses > 0 {
            eprintln!(
                "{} {} / {} / {}",
                "Duration (Min / Avg / Max):".on_bright_black().bold().bright_green(),
                format_ms(stats.min_duration_ms).on_bright_black().bright_green().bold(),
                format_ms(self.average_duration_ms).on_bright_black().bright_yellow().bold(),
                format_ms(stats.max_duration_ms).on_bright_black().bright_red().bold()
            );
            let last = format_ms(stats.last_duration_ms);
            eprintln!(
                "{} {}",
                "Last Press:".on_bright_black().bold().bright_white(),
                if stats.below_threshold {
                    last.on_green().black().bold()
                } else {
                    last.on_red().white().bold()
                }
            );
            eprintln!(
                "{} {} / {} ({:.1}%)",
                "Under Threshold:".on_bright_black().bold().bright_green(),
                stats.threshold_successes.to_string().on_bright_black().bright_green().bold(),
                stats.total_presses,
                stats.success_rate()
            );
            for (button, count) in &stats.presses_per_button {
                eprintln!(
                    "  Button [{}]: {}",
                    button.as_str().on_bright_black().bright_magenta().bold(),
                    count.to_string().on_bright_black().bright_yellow().bold()
                );
            }
        } else {
            eprintln!("{}", "--- No presses recorded ---".on_bright_black().green().bold());
        }

        let diag = &self.diagnostics;
        eprintln!("\n{}", "--- Connection Diagnostics ---".on_bright_black().bold().blue().underline());
        eprintln!(
            "{} {}",
            "Polling Rate:".on_bright_black().bold().bright_cyan(),
            format!("{:.0} Hz", diag.polling_rate_hz).on_bright_black().bright_cyan().bold()
        );
        eprintln!(
            "{} {} / {} / {}",
            "Latency (Min / Avg / Max):".on_bright_black().bold().bright_yellow(),
            format_ms(diag.latency_min_ms).on_bright_black().bright_green().bold(),
            format_ms(diag.latency_avg_ms).on_bright_black().bright_yellow().bold(),
            format_ms(diag.latency_max_ms).on_bright_black().bright_red().bold()
        );
        eprintln!(
            "{} {}",
            "Jitter:".on_bright_black().bold().bright_yellow(),
            format_ms(diag.jitter_ms).on_bright_black().bright_yellow().bold()
        );
        eprintln!(
            "{} {}",
            "Connection Quality:".on_bright_black().bold().bright_white(),
            diag.connection_quality.to_string().on_bright_black().bright_white().bold()
        );
        eprintln!("{}", "----------------------------------------------------------".on_bright_black().blue().bold());
    }

    /// Print JSON stats to the given writer (e.g. stderr). The duration history is left out.
    pub fn print_stats_json(&self, report_type: &str, mut writer: impl std::io::Write) {
        #[derive(Serialize)]
        struct FilteredStats<'a> {
            start_time: f64,
            total_presses: u64,
            presses_per_button: &'a BTreeMap<String, u64>,
            min_duration_ms: Option<f64>,
            max_duration_ms: f64,
            last_duration_ms: f64,
            average_duration_ms: f64,
            threshold_successes: u64,
            success_rate_pct: f64,
            below_threshold: bool,
        }

        #[derive(Serialize)]
        struct Output<'a> {
            report_type: &'a str,
            meta: &'a Meta,
            stats: FilteredStats<'a>,
            diagnostics: &'a DiagnosticSnapshot,
        }

        let stats = &self.stats;
        let output = Output {
            report_type,
            meta: &self.meta,
            stats: FilteredStats {
                start_time: stats.start_time,
                total_presses: stats.total_presses,
                presses_per_button: &stats.presses_per_button,
                min_duration_ms: stats.min_duration_ms.is_finite().then_some(stats.min_duration_ms),
                max_duration_ms: stats.max_duration_ms,
                last_duration_ms: stats.last_duration_ms,
                average_duration_ms: self.average_duration_ms,
                threshold_successes: stats.threshold_successes,
                success_rate_pct: crate::util::round_to(stats.success_rate(), 1),
                below_threshold: stats.below_threshold,
            },
            diagnostics: &self.diagnostics,
        };
        let _ = serde_json::to_writer_pretty(&mut writer, &output);
        let _ = writeln!(writer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator(threshold_ms: f64) -> (Arc<Settings>, SessionStatsAggregator) {
        let settings = Arc::new(Settings::new(threshold_ms, None));
        let aggregator = SessionStatsAggregator::new(Arc::clone(&settings));
        (settings, aggregator)
    }

    fn press(button: &str, release_time: f64, duration_ms: f64) -> PressEvent {
        PressEvent {
            button: button.to_string(),
            press_time: release_time - duration_ms / 1000.0,
            release_time,
            duration_ms,
        }
    }

    #[test]
    fn empty_session_sentinels() {
        let (_, agg) = aggregator(50.0);
        let stats = agg.stats();
        assert_eq!(stats.total_presses, 0);
        assert_eq!(stats.min_duration_ms, f64::INFINITY);
        assert_eq!(stats.max_duration_ms, 0.0);
        assert_eq!(stats.min_duration_or_zero(), 0.0);
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.elapsed(), Duration::ZERO);
    }

    #[test]
    fn update_counts_and_extremes() {
        let (_, mut agg) = aggregator(50.0);
        agg.update(&press("A", 1.0, 40.0));
        agg.update(&press("B", 2.0, 80.0));
        agg.update(&press("A", 3.0, 25.5));

        let stats = agg.stats();
        assert_eq!(stats.total_presses, 3);
        assert_eq!(stats.presses_per_button["A"], 2);
        assert_eq!(stats.presses_per_button["B"], 1);
        assert_eq!(stats.min_duration_ms, 25.5);
        assert_eq!(stats.max_duration_ms, 80.0);
        assert_eq!(stats.last_duration_ms, 25.5);
        assert_eq!(stats.threshold_successes, 2);
        assert!(stats.below_threshold);
        assert_eq!(stats.durations(), vec![40.0, 80.0, 25.5]);
        assert_eq!(stats.durations_history[1].button, "B");
        assert_eq!(stats.durations_history[1].release_time, 2.0);
    }

    #[test]
    fn threshold_is_inclusive() {
        let (_, mut agg) = aggregator(50.0);
        agg.update(&press("A", 1.0, 50.0));
        assert!(agg.stats().below_threshold);
        agg.update(&press("A", 2.0, 50.01));
        assert!(!agg.stats().below_threshold);
        assert_eq!(agg.stats().threshold_successes, 1);
    }

    #[test]
    fn threshold_change_is_not_retroactive() {
        let (settings, mut agg) = aggregator(50.0);
        agg.update(&press("A", 1.0, 60.0)); // fail at 50
        settings.set_threshold_ms(100.0);
        agg.update(&press("A", 2.0, 60.0)); // success at 100
        assert_eq!(agg.stats().threshold_successes, 1);
        assert_eq!(agg.stats().total_presses, 2);
    }

    #[test]
    fn reset_starts_fresh() {
        let (_, mut agg) = aggregator(50.0);
        agg.update(&press("A", 1.0, 10.0));
        agg.reset(1234.5);
        let stats = agg.snapshot();
        assert_eq!(stats.start_time, 1234.5);
        assert_eq!(stats.total_presses, 0);
        assert!(stats.durations_history.is_empty());
    }
}
