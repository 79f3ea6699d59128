//! Connection-quality classification and duration statistics.
//!
//! Everything here is a pure function over values supplied by the caller:
//! latency figures from a `LatencyWindow`, duration samples from a session,
//! or session summaries loaded from wherever the caller keeps history.

use crate::latency::LatencyStats;
use crate::util::round_to;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors from the statistical analyses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("no duration samples to analyze")]
    NoSamples,
    #[error("no sessions to compare")]
    NoSessions,
}

/// Discrete connection grade derived from polling rate and jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionQuality::Excellent => "Excellent",
            ConnectionQuality::Good => "Good",
            ConnectionQuality::Fair => "Fair",
            ConnectionQuality::Poor => "Poor",
            ConnectionQuality::NotAvailable => "N/A",
        })
    }
}

// (grade, minimum polling rate Hz, maximum jitter ms), checked in order.
const QUALITY_THRESHOLDS: [(ConnectionQuality, f64, f64); 3] = [
    (ConnectionQuality::Excellent, 200.0, 2.0),
    (ConnectionQuality::Good, 100.0, 5.0),
    (ConnectionQuality::Fair, 50.0, 10.0),
];

/// Physical link to the controller, guessed from its device name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionType {
    #[serde(rename = "USB")]
    Usb,
    Bluetooth,
    Unknown,
}

impl ConnectionType {
    /// Names mentioning "bluetooth" or "wireless" are taken as Bluetooth, anything else as USB.
    /// Purely cosmetic: nothing about the transport is verified.
    pub fn from_device_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("bluetooth") || lower.contains("wireless") {
            ConnectionType::Bluetooth
        } else {
            ConnectionType::Usb
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectionType::Usb => "USB",
            ConnectionType::Bluetooth => "Bluetooth",
            ConnectionType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time connection diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    pub polling_rate_hz: f64,
    pub latency_avg_ms: f64,
    pub latency_min_ms: f64,
    pub latency_max_ms: f64,
    pub jitter_ms: f64,
    pub connection_quality: ConnectionQuality,
}

impl Default for DiagnosticSnapshot {
    fn default() -> Self {
        take_snapshot(0.0, &LatencyStats::default())
    }
}

/// Grades a connection. The first row of the threshold table whose rate and
/// jitter limits are both met wins; no match is `Poor`; a zero rate is `N/A`.
pub fn evaluate_connection(polling_rate: f64, latency: &LatencyStats) -> ConnectionQuality {
    if polling_rate == 0.0 {
        return ConnectionQuality::NotAvailable;
    }
    QUALITY_THRESHOLDS
        .iter()
        .find(|(_, min_rate, max_jitter)| polling_rate >= *min_rate && latency.jitter <= *max_jitter)
        .map(|(quality, _, _)| *quality)
        .unwrap_or(ConnectionQuality::Poor)
}

/// Captures the current diagnostics, with the polling rate rounded to one decimal.
pub fn take_snapshot(polling_rate: f64, latency: &LatencyStats) -> DiagnosticSnapshot {
    DiagnosticSnapshot {
        polling_rate_hz: round_to(polling_rate, 1),
        latency_avg_ms: latency.avg,
        latency_min_ms: latency.min,
        latency_max_ms: latency.max,
        jitter_ms: latency.jitter,
        connection_quality: evaluate_connection(polling_rate, latency),
    }
}

/// Distribution summary of a set of press durations. Milliseconds rounded to
/// two decimals, percentages to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationReport {
    pub samples: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub std_dev_ms: f64,
    pub p10_ms: f64,
    pub p90_ms: f64,
    /// The shortest press seen, taken as the shortest input the device can resolve.
    pub min_resolution_ms: f64,
    pub under_50ms: usize,
    pub under_50ms_pct: f64,
    pub under_100ms: usize,
    pub under_100ms_pct: f64,
    /// Standard deviation of the presses at or below the median.
    pub fast_tap_std_ms: f64,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64]) -> f64 {
    let avg = mean(values);
    let variance = values.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

// Nearest-rank percentile over sorted data: index floor(n * p), clamped.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let index = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
    sorted[index]
}

pub fn analyze_durations(durations_ms: &[f64]) -> Result<DurationReport, AnalysisError> {
    if durations_ms.is_empty() {
        return Err(AnalysisError::NoSamples);
    }

    let n = durations_ms.len();
    let mut sorted = durations_ms.to_vec();
    sorted.sort_by(f64::total_cmp);

    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let min = sorted[0];
    let max = sorted[n - 1];

    let under_50ms = durations_ms.iter().filter(|&&d| d <= 50.0).count();
    let under_100ms = durations_ms.iter().filter(|&&d| d <= 100.0).count();

    let fast: Vec<f64> = durations_ms.iter().copied().filter(|&d| d <= median).collect();
    let fast_tap_std = if fast.len() > 1 { population_std_dev(&fast) } else { 0.0 };

    Ok(DurationReport {
        samples: n,
        mean_ms: round_to(mean(durations_ms), 2),
        median_ms: round_to(median, 2),
        min_ms: round_to(min, 2),
        max_ms: round_to(max, 2),
        std_dev_ms: round_to(population_std_dev(durations_ms), 2),
        p10_ms: round_to(percentile(&sorted, 0.1), 2),
        p90_ms: round_to(percentile(&sorted, 0.9), 2),
        min_resolution_ms: round_to(min, 2),
        under_50ms,
        under_50ms_pct: round_to(under_50ms as f64 / n as f64 * 100.0, 1),
        under_100ms,
        under_100ms_pct: round_to(under_100ms as f64 / n as f64 * 100.0, 1),
        fast_tap_std_ms: round_to(fast_tap_std, 2),
    })
}

/// Per-session record as kept by whoever persists history. Missing fields default to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSummary {
    pub timestamp: String,
    pub button: String,
    pub press_count: u64,
    pub session_duration_s: f64,
    pub min_duration_ms: f64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: f64,
    pub connection_type: String,
    pub latency_avg_ms: f64,
    pub jitter_ms: f64,
    pub threshold_ms: f64,
    pub threshold_successes: u64,
}

/// Parses one `SessionSummary` per non-blank line.
pub fn parse_summaries(input: &str) -> Result<Vec<SessionSummary>, serde_json::Error> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str)
        .collect()
}

/// Direction of the minimum-duration series. Lower durations are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    #[serde(rename = "improving")]
    Improving,
    #[serde(rename = "worsening")]
    Worsening,
    #[serde(rename = "stable")]
    Stable,
    #[serde(rename = "insufficient data")]
    InsufficientData,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Improving => "improving",
            Trend::Worsening => "worsening",
            Trend::Stable => "stable",
            Trend::InsufficientData => "insufficient data",
        })
    }
}

/// Compares the mean of the second half of `values` against the first half.
/// A change beyond ±5% is a trend; fewer than three values is not enough to tell.
pub fn trend(values: &[f64]) -> Trend {
    if values.len() < 3 {
        return Trend::InsufficientData;
    }
    let mid = values.len() / 2;
    let first_half = mean(&values[..mid]);
    let second_half = mean(&values[mid..]);
    if first_half == 0.0 {
        return Trend::Stable;
    }

    let diff_pct = (second_half - first_half) / first_half * 100.0;
    if diff_pct < -5.0 {
        Trend::Improving
    } else if diff_pct > 5.0 {
        Trend::Worsening
    } else {
        Trend::Stable
    }
}

/// Aggregate view over several sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionComparison {
    pub sessions: usize,
    pub best_min_duration_ms: f64,
    pub mean_avg_duration_ms: f64,
    pub trend: Trend,
    pub mean_latency_ms: f64,
    pub best_latency_ms: f64,
    pub mean_jitter_ms: f64,
}

fn min_of(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::INFINITY, f64::min)
}

pub fn compare_sessions(sessions: &[SessionSummary]) -> Result<SessionComparison, AnalysisError> {
    if sessions.is_empty() {
        return Err(AnalysisError::NoSessions);
    }

    let min_durations: Vec<f64> = sessions.iter().map(|s| s.min_duration_ms).collect();
    let avg_durations: Vec<f64> = sessions.iter().map(|s| s.avg_duration_ms).collect();
    let latencies: Vec<f64> = sessions.iter().map(|s| s.latency_avg_ms).collect();
    let jitters: Vec<f64> = sessions.iter().map(|s| s.jitter_ms).collect();

    Ok(SessionComparison {
        sessions: sessions.len(),
        best_min_duration_ms: round_to(min_of(min_durations.iter().copied()), 2),
        mean_avg_duration_ms: round_to(mean(&avg_durations), 2),
        trend: trend(&min_durations),
        mean_latency_ms: round_to(mean(&latencies), 2),
        best_latency_ms: round_to(min_of(latencies.iter().copied()), 2),
        mean_jitter_ms: round_to(mean(&jitters), 2),
    })
}

/// Figures for the sessions recorded over one connection type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGroup {
    pub sessions: usize,
    pub mean_latency_ms: f64,
    pub best_min_duration_ms: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionComparison {
    #[serde(rename = "USB")]
    pub usb: ConnectionGroup,
    #[serde(rename = "Bluetooth")]
    pub bluetooth: ConnectionGroup,
}

fn connection_group(sessions: &[SessionSummary], connection: ConnectionType) -> ConnectionGroup {
    let group: Vec<&SessionSummary> = sessions
        .iter()
        .filter(|s| s.connection_type == connection.label())
        .collect();
    if group.is_empty() {
        return ConnectionGroup::default();
    }
    let latency_sum: f64 = group.iter().map(|s| s.latency_avg_ms).sum();
    ConnectionGroup {
        sessions: group.len(),
        mean_latency_ms: round_to(latency_sum / group.len() as f64, 2),
        best_min_duration_ms: round_to(min_of(group.iter().map(|s| s.min_duration_ms)), 2),
    }
}

/// Splits sessions into USB and Bluetooth groups; a group with no sessions is all zero.
pub fn compare_by_connection_type(sessions: &[SessionSummary]) -> ConnectionComparison {
    ConnectionComparison {
        usb: connection_group(sessions, ConnectionType::Usb),
        bluetooth: connection_group(sessions, ConnectionType::Bluetooth),
    }
}
