//! Utility functions shared across modules.

use std::time::Duration;

/// Rounds `value` to `decimals` decimal places (half away from zero).
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Formats a duration in milliseconds into a human-readable string (µs, ms, or s).
#[inline]
pub fn format_ms(ms: f64) -> String {
    if !ms.is_finite() {
        "n/a".to_string()
    } else if ms < 1.0 {
        format!("{:.0} µs", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{ms:.2} ms")
    } else {
        format!("{:.3} s", ms / 1000.0)
    }
}

/// Formats a `std::time::Duration` into a human-readable string using `humantime`.
#[inline]
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

/// Seconds since the Unix epoch as `f64`, the timestamp unit used for presses and polls.
#[inline]
pub fn unix_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round_to(12.3456, 2), 12.35);
        assert_eq!(round_to(0.004, 2), 0.0);
        assert_eq!(round_to(2.25, 1), 2.3);
    }

    #[test]
    fn formats_milliseconds() {
        assert_eq!(format_ms(0.5), "500 µs");
        assert_eq!(format_ms(42.0), "42.00 ms");
        assert_eq!(format_ms(1500.0), "1.500 s");
        assert_eq!(format_ms(f64::INFINITY), "n/a");
    }
}
