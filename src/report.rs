//! Cross-session report over recorded `SessionSummary` history.

use crate::diagnostics::{
    analyze_durations, compare_by_connection_type, compare_sessions, AnalysisError,
    ConnectionComparison, DurationReport, SessionComparison, SessionSummary,
};
use crate::util::format_ms;
use colored::*;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryReport {
    pub comparison: SessionComparison,
    pub by_connection: ConnectionComparison,
    /// Distribution of per-session average durations; absent when no session recorded a press.
    pub average_distribution: Option<DurationReport>,
}

impl HistoryReport {
    pub fn build(sessions: &[SessionSummary]) -> Result<Self, AnalysisError> {
        let comparison = compare_sessions(sessions)?;
        let averages: Vec<f64> = sessions
            .iter()
            .filter(|s| s.press_count > 0)
            .map(|s| s.avg_duration_ms)
            .collect();
        Ok(HistoryReport {
            comparison,
            by_connection: compare_by_connection_type(sessions),
            average_distribution: analyze_durations(&averages).ok(),
        })
    }

    pub fn write_json(&self, mut writer: impl Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)
    }

    pub fn write_human(&self, mut w: impl Write) -> io::Result<()> {
        let c = &self.comparison;
        writeln!(w, "{}", "--- Session History ---".bold().blue().underline())?;
        writeln!(w, "{} {}", "Sessions:".bold(), c.sessions)?;
        writeln!(w, "{} {}", "Best Min Duration:".bold().bright_green(), format_ms(c.best_min_duration_ms))?;
        writeln!(w, "{} {}", "Mean Avg Duration:".bold().bright_yellow(), format_ms(c.mean_avg_duration_ms))?;
        writeln!(w, "{} {}", "Trend:".bold(), c.trend.to_string().bright_cyan().bold())?;
        writeln!(
            w,
            "{} {} (best {})",
            "Mean Latency:".bold(),
            format_ms(c.mean_latency_ms),
            format_ms(c.best_latency_ms)
        )?;
        writeln!(w, "{} {}", "Mean Jitter:".bold(), format_ms(c.mean_jitter_ms))?;

        writeln!(w, "\n{}", "--- By Connection ---".bold().blue().underline())?;
        for (label, group) in [("USB", &self.by_connection.usb), ("Bluetooth", &self.by_connection.bluetooth)] {
            if group.sessions == 0 {
                writeln!(w, "  {}: {}", label.bright_magenta().bold(), "no sessions".dimmed())?;
            } else {
                writeln!(
                    w,
                    "  {}: {} sessions, latency {}, best min {}",
                    label.bright_magenta().bold(),
                    group.sessions,
                    format_ms(group.mean_latency_ms),
                    format_ms(group.best_min_duration_ms)
                )?;
            }
        }

        if let Some(d) = &self.average_distribution {
            writeln!(w, "\n{}", "--- Average Duration Distribution ---".bold().blue().underline())?;
            writeln!(
                w,
                "  Mean {} / Median {} / Std Dev {}",
                format_ms(d.mean_ms),
                format_ms(d.median_ms),
                format_ms(d.std_dev_ms)
            )?;
            writeln!(
                w,
                "  Min {} / P10 {} / P90 {} / Max {}",
                format_ms(d.min_ms),
                format_ms(d.p10_ms),
                format_ms(d.p90_ms),
                format_ms(d.max_ms)
            )?;
            writeln!(
                w,
                "  <= 50 ms: {} ({:.1}%)   <= 100 ms: {} ({:.1}%)",
                d.under_50ms, d.under_50ms_pct, d.under_100ms, d.under_100ms_pct
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Trend;

    fn summary(connection: &str, presses: u64, min: f64, avg: f64) -> SessionSummary {
        SessionSummary {
            connection_type: connection.into(),
            press_count: presses,
            min_duration_ms: min,
            avg_duration_ms: avg,
            ..SessionSummary::default()
        }
    }

    #[test]
    fn build_skips_empty_sessions_in_distribution() {
        let sessions = vec![
            summary("USB", 10, 40.0, 60.0),
            summary("USB", 0, 0.0, 0.0),
            summary("Bluetooth", 8, 45.0, 80.0),
        ];
        let report = HistoryReport::build(&sessions).unwrap();
        assert_eq!(report.comparison.sessions, 3);
        // Min durations [40, 0, 45]: first half 40, second half 22.5.
        assert_eq!(report.comparison.trend, Trend::Improving);
        let dist = report.average_distribution.unwrap();
        assert_eq!(dist.samples, 2);
        assert_eq!(dist.mean_ms, 70.0);
        assert_eq!(report.by_connection.usb.sessions, 2);
    }

    #[test]
    fn no_sessions_is_an_error() {
        assert_eq!(HistoryReport::build(&[]), Err(AnalysisError::NoSessions));
    }

    #[test]
    fn writes_both_formats() {
        let report = HistoryReport::build(&[summary("USB", 3, 30.0, 45.0)]).unwrap();
        let mut json = Vec::new();
        report.write_json(&mut json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["comparison"]["sessions"], 1);
        assert_eq!(value["comparison"]["trend"], "insufficient data");

        let mut text = Vec::new();
        report.write_human(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("Sessions:"));
        assert!(text.contains("no sessions"));
    }
}
