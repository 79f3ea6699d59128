// This module turns raw `(code, state)` pairs into edge-triggered press and
// release transitions. Digital buttons report their state directly; analog
// triggers and d-pad hats are debounced into discrete presses by remembering
// whether each axis was last seen "pressed".

pub mod controls;

use controls::ControlKind;
use std::collections::HashMap;

/// Default analog trigger level above which a trigger counts as pressed.
pub const DEFAULT_TRIGGER_THRESHOLD: i32 = 128;

/// Direction of a button transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Press,
    Release,
}

/// A semantic press or release of one canonical button.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonTransition {
    pub button: &'static str,
    pub kind: TransitionKind,
    /// Seconds, in the same clock as the poll timestamps.
    pub timestamp: f64,
}

/// Holds the per-axis "pressed" flags needed to edge-trigger continuous inputs.
#[derive(Debug)]
pub struct EventClassifier {
    trigger_threshold: i32,
    // Last pressed flag per raw code, for triggers and d-pad axes only.
    axis_pressed: HashMap<&'static str, bool>,
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_THRESHOLD)
    }
}

impl EventClassifier {
    #[must_use]
    pub fn new(trigger_threshold: i32) -> Self {
        EventClassifier {
            trigger_threshold,
            axis_pressed: HashMap::with_capacity(4),
        }
    }

    pub fn trigger_threshold(&self) -> i32 {
        self.trigger_threshold
    }

    /// Classifies one raw state change.
    ///
    /// Returns `None` for unknown codes, digital states other than 0/1, and
    /// axis updates that do not cross the pressed/released boundary.
    pub fn classify(&mut self, code: &str, state: i32, timestamp: f64) -> Option<ButtonTransition> {
        let (code, control) = controls::lookup_entry(code)?;

        let kind = match control.kind {
            ControlKind::Digital => match state {
                1 => TransitionKind::Press,
                0 => TransitionKind::Release,
                _ => return None,
            },
            ControlKind::Trigger => self.edge(code, state > self.trigger_threshold)?,
            ControlKind::DPad => self.edge(code, state != 0)?,
        };

        Some(ButtonTransition {
            button: control.name,
            kind,
            timestamp,
        })
    }

    /// Records the new pressed flag for `code` and reports the edge, if any.
    fn edge(&mut self, code: &'static str, is_pressed: bool) -> Option<TransitionKind> {
        let was_pressed = self.axis_pressed.insert(code, is_pressed).unwrap_or(false);
        match (was_pressed, is_pressed) {
            (false, true) => Some(TransitionKind::Press),
            (true, false) => Some(TransitionKind::Release),
            _ => None,
        }
    }

    /// Forgets all axis state, as at the start of a session.
    pub fn reset(&mut self) {
        self.axis_pressed.clear();
    }
}
