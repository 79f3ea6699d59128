//! Rolling poll-timestamp window and the timing diagnostics derived from it.

use crate::util::round_to;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of poll timestamps retained.
pub const DEFAULT_CAPACITY: usize = 2000;
/// Only the newest samples feed the rate and latency figures.
pub const RECENT_WINDOW: usize = 200;
/// Below this many samples every figure reports zero.
pub const MIN_SAMPLES: usize = 10;

/// Inter-poll interval statistics in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation of the intervals.
    pub jitter: f64,
}

/// Fixed-capacity FIFO of poll timestamps (seconds). The oldest entry is evicted when full.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    timestamps: VecDeque<f64>,
    capacity: usize,
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl LatencyWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        LatencyWindow {
            timestamps: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record_poll(&mut self, timestamp: f64) {
        if self.timestamps.len() == self.capacity {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(timestamp);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
    }

    // The newest RECENT_WINDOW samples, or `None` while too few have been seen.
    fn recent(&self) -> Option<impl Iterator<Item = f64> + Clone + '_> {
        if self.timestamps.len() < MIN_SAMPLES {
            return None;
        }
        let skip = self.timestamps.len().saturating_sub(RECENT_WINDOW);
        Some(self.timestamps.iter().skip(skip).copied())
    }

    /// Effective polling rate in Hz over the recent window.
    pub fn polling_rate_hz(&self) -> f64 {
        let Some(recent) = self.recent() else {
            return 0.0;
        };
        let count = recent.clone().count();
        let oldest = recent.clone().next().unwrap_or(0.0);
        let newest = recent.last().unwrap_or(0.0);
        let span = newest - oldest;
        if span > 0.0 {
            (count - 1) as f64 / span
        } else {
            0.0
        }
    }

    /// Interval statistics over the recent window; all zero while too few samples exist.
    pub fn latency_stats(&self) -> LatencyStats {
        let Some(recent) = self.recent() else {
            return LatencyStats::default();
        };
        let samples: Vec<f64> = recent.collect();
        let intervals: Vec<f64> = samples.windows(2).map(|w| (w[1] - w[0]) * 1000.0).collect();

        let n = intervals.len() as f64;
        let avg = intervals.iter().sum::<f64>() / n;
        let min = intervals.iter().copied().fold(f64::INFINITY, f64::min);
        let max = intervals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let variance = intervals.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;

        LatencyStats {
            avg: round_to(avg, 2),
            min: round_to(min, 2),
            max: round_to(max, 2),
            jitter: round_to(variance.sqrt(), 2),
        }
    }
}
