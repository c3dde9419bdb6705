//! Overlay state and its transitions.
//!
//! Everything here is synchronous and free of I/O; the overlay component
//! wraps it with persistence and the first-visit timer.

use std::fmt;

use serde::Serialize;

/// One message in the onboarding sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructionStep {
    /// Text shown to the user.
    pub text: String,
}

impl InstructionStep {
    /// Create a step.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Where the overlay currently is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    /// Nothing is shown.
    Hidden,
    /// The panel is open on `step`.
    Visible {
        /// Zero-based index of the displayed step.
        step: usize,
    },
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hidden => write!(f, "hidden"),
            Self::Visible { step } => write!(f, "visible(step {step})"),
        }
    }
}

/// Visibility plus the current step.
///
/// `current_index` is kept while hidden so reopening resumes where the user
/// left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OverlayState {
    /// Whether the panel is shown.
    pub visible: bool,
    /// Index of the current step, always `< step_count`.
    pub current_index: usize,
}

impl OverlayState {
    /// The state-machine view of this state.
    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.visible {
            Phase::Visible {
                step: self.current_index,
            }
        } else {
            Phase::Hidden
        }
    }

    /// Whether `current_index` is the last of `step_count` steps.
    #[must_use]
    pub fn is_last_step(&self, step_count: usize) -> bool {
        self.current_index + 1 >= step_count
    }

    /// Open the panel without moving the step.
    pub fn show(&mut self) {
        self.visible = true;
    }

    /// Close the panel without moving the step.
    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Flip visibility.
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    /// Advance one step. No-op on the last step. Returns whether it moved.
    pub fn advance(&mut self, step_count: usize) -> bool {
        if self.is_last_step(step_count) {
            return false;
        }
        self.current_index += 1;
        true
    }

    /// Close the panel if it is open on the last step. Returns whether it
    /// closed.
    pub fn finish(&mut self, step_count: usize) -> bool {
        if !self.visible || !self.is_last_step(step_count) {
            return false;
        }
        self.visible = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_hidden_at_zero() {
        let state = OverlayState::default();
        assert!(!state.visible);
        assert_eq!(state.current_index, 0);
        assert_eq!(state.phase(), Phase::Hidden);
    }

    #[test]
    fn test_advance_stops_at_last_step() {
        for step_count in 1..=6 {
            let mut state = OverlayState {
                visible: true,
                current_index: 0,
            };
            for _ in 0..step_count - 1 {
                assert!(state.advance(step_count));
            }
            assert_eq!(state.current_index, step_count - 1);

            for _ in 0..3 {
                assert!(!state.advance(step_count));
                assert_eq!(state.current_index, step_count - 1);
            }
        }
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let mut state = OverlayState {
            visible: false,
            current_index: 1,
        };
        let original = state;
        state.toggle();
        assert_eq!(state.phase(), Phase::Visible { step: 1 });
        state.toggle();
        assert_eq!(state, original);
    }

    #[test]
    fn test_finish_only_from_last_visible_step() {
        let mut state = OverlayState {
            visible: true,
            current_index: 0,
        };
        assert!(!state.finish(2));
        assert!(state.visible);

        state.advance(2);
        assert!(state.finish(2));
        assert_eq!(state.phase(), Phase::Hidden);
        assert_eq!(state.current_index, 1);

        assert!(!state.finish(2));
    }

    #[test]
    fn test_single_step_sequence() {
        let mut state = OverlayState::default();
        assert!(state.is_last_step(1));
        assert!(!state.advance(1));
        state.show();
        assert!(state.finish(1));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Hidden.to_string(), "hidden");
        assert_eq!(Phase::Visible { step: 1 }.to_string(), "visible(step 1)");
    }

    #[test]
    fn test_phase_serialize() {
        let json = serde_json::to_string(&Phase::Visible { step: 1 }).unwrap();
        assert_eq!(json, r#"{"phase":"visible","step":1}"#);
    }
}
