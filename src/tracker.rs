// Press/release correlation. Each button is either idle or held since some
// timestamp; a release closes the open press and produces a `PressEvent`.

use crate::util::round_to;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One completed press: the button was held from `press_time` to `release_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressEvent {
    pub button: String,
    pub press_time: f64,
    pub release_time: f64,
    /// Hold duration, rounded to two decimal places.
    pub duration_ms: f64,
}

impl PressEvent {
    pub fn new(button: impl Into<String>, press_time: f64, release_time: f64) -> Self {
        PressEvent {
            button: button.into(),
            press_time,
            release_time,
            duration_ms: round_to((release_time - press_time) * 1000.0, 2),
        }
    }
}

/// Tracks open presses per button and keeps the append-only log of completed ones.
#[derive(Debug, Default)]
pub struct PressTracker {
    open_presses: HashMap<String, f64>,
    log: Vec<PressEvent>,
}

impl PressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `button` as held since `timestamp`.
    ///
    /// A second press while already held replaces the stored time: the most
    /// recent press wins.
    pub fn on_press(&mut self, button: &str, timestamp: f64) {
        if let Some(previous) = self.open_presses.insert(button.to_string(), timestamp) {
            tracing::debug!(button, previous, timestamp, "Re-press while held, keeping latest press time");
        }
    }

    /// Closes the open press for `button`, appending and returning the completed event.
    /// Returns `None` when the button was not held.
    pub fn on_release(&mut self, button: &str, timestamp: f64) -> Option<PressEvent> {
        let press_time = self.open_presses.remove(button)?;
        let event = PressEvent::new(button, press_time, timestamp);
        self.log.push(event.clone());
        Some(event)
    }

    /// Returns `true` while `button` has an open press.
    pub fn is_held(&self, button: &str) -> bool {
        self.open_presses.contains_key(button)
    }

    /// The last `n` completed presses, oldest first.
    pub fn recent(&self, n: usize) -> Vec<PressEvent> {
        let start = self.log.len().saturating_sub(n);
        self.log[start..].to_vec()
    }

    /// A copy of the full press log.
    pub fn all(&self) -> Vec<PressEvent> {
        self.log.clone()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Mean hold duration over the whole log, rounded to two decimals. 0.0 when empty.
    pub fn average_duration(&self) -> f64 {
        if self.log.is_empty() {
            return 0.0;
        }
        let total: f64 = self.log.iter().map(|p| p.duration_ms).sum();
        round_to(total / self.log.len() as f64, 2)
    }

    /// Drops open presses and the log.
    pub fn clear(&mut self) {
        self.open_presses.clear();
        self.log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_then_release_produces_event() {
        let mut tracker = PressTracker::new();
        tracker.on_press("A", 10.0);
        assert!(tracker.is_held("A"));
        let event = tracker.on_release("A", 10.0425).unwrap();
        assert_eq!(event.button, "A");
        assert_eq!(event.press_time, 10.0);
        assert_eq!(event.release_time, 10.0425);
        assert_eq!(event.duration_ms, 42.5);
        assert!(!tracker.is_held("A"));
        assert_eq!(tracker.all(), vec![event]);
    }

    #[test]
    fn release_without_press_is_noop() {
        let mut tracker = PressTracker::new();
        assert!(tracker.on_release("B", 1.0).is_none());
        tracker.on_press("A", 1.0);
        assert!(tracker.on_release("B", 1.1).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn repress_overwrites_open_press() {
        let mut tracker = PressTracker::new();
        tracker.on_press("X", 1.0);
        tracker.on_press("X", 1.5);
        let event = tracker.on_release("X", 1.52).unwrap();
        assert_eq!(event.press_time, 1.5);
        assert_eq!(event.duration_ms, 20.0);
        // Second release has nothing to close.
        assert!(tracker.on_release("X", 1.6).is_none());
    }

    #[test]
    fn buttons_are_tracked_independently() {
        let mut tracker = PressTracker::new();
        tracker.on_press("A", 0.0);
        tracker.on_press("B", 0.01);
        let b = tracker.on_release("B", 0.03).unwrap();
        let a = tracker.on_release("A", 0.05).unwrap();
        assert_eq!(b.duration_ms, 20.0);
        assert_eq!(a.duration_ms, 50.0);
        let log = tracker.all();
        assert_eq!(log[0].button, "B");
        assert_eq!(log[1].button, "A");
    }

    #[test]
    fn recent_and_average() {
        let mut tracker = PressTracker::new();
        assert_eq!(tracker.average_duration(), 0.0);
        for (i, hold) in [0.010, 0.020, 0.030, 0.045].iter().enumerate() {
            let t = i as f64;
            tracker.on_press("A", t);
            tracker.on_release("A", t + hold);
        }
        let recent = tracker.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].duration_ms, 30.0);
        assert_eq!(recent[1].duration_ms, 45.0);
        assert_eq!(tracker.recent(100).len(), 4);
        assert!(tracker.recent(0).is_empty());
        assert_eq!(tracker.average_duration(), 26.25);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut tracker = PressTracker::new();
        tracker.on_press("A", 0.0);
        tracker.on_press("B", 0.0);
        tracker.on_release("B", 0.1);
        tracker.clear();
        assert!(tracker.is_empty());
        assert!(!tracker.is_held("A"));
    }
}
