use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The states of a single layer run.
///
/// Each layer flows through: NOT_STARTED → ATTEMPTING(1..=max) → one of
/// SUCCEEDED, ESCALATED or EXHAUSTED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "attempt")]
pub enum LayerState {
    NotStarted,
    Attempting(u32),
    Succeeded,
    Escalated,
    Exhausted,
}

impl LayerState {
    /// Whether no further attempts can happen from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LayerState::Succeeded | LayerState::Escalated | LayerState::Exhausted
        )
    }
}

impl fmt::Display for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerState::NotStarted => write!(f, "NOT_STARTED"),
            LayerState::Attempting(k) => write!(f, "ATTEMPTING({k})"),
            LayerState::Succeeded => write!(f, "SUCCEEDED"),
            LayerState::Escalated => write!(f, "ESCALATED"),
            LayerState::Exhausted => write!(f, "EXHAUSTED"),
        }
    }
}

/// What the executor concluded about the attempt that just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The attempt succeeded and validated.
    Accept,
    /// A detected pattern asks to abandon this layer.
    Escalate,
    /// Nothing conclusive; try again if budget remains.
    Retry,
}

/// The result of evaluating a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Run the given attempt number next.
    Attempt(u32),
    /// The layer reached a terminal state.
    Complete(LayerState),
}

/// Bookkeeping for one layer as it moves through the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRun {
    pub layer: String,
    pub max_attempts: u32,
    pub state: LayerState,
    pub state_history: Vec<LayerState>,
    pub attempts_made: u32,
    pub started_at: DateTime<Utc>,
}

impl LayerRun {
    pub fn new(layer: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            layer: layer.into(),
            max_attempts,
            state: LayerState::NotStarted,
            state_history: Vec::new(),
            attempts_made: 0,
            started_at: Utc::now(),
        }
    }
}

/// Drives a `LayerRun` through the state machine.
pub struct StateMachine;

impl StateMachine {
    /// Compute and apply the next transition for `run`.
    ///
    /// - `NotStarted` always moves to the first attempt; the verdict is ignored.
    /// - `Attempting(k)` completes on `Accept` or `Escalate`; on `Retry` it moves
    ///   to `k + 1` while budget remains, otherwise completes as `Exhausted`.
    /// - Terminal states are sticky and return `Complete` with the same state.
    pub fn next(run: &mut LayerRun, verdict: Verdict) -> Transition {
        let transition = match run.state {
            LayerState::NotStarted if run.max_attempts == 0 => {
                Transition::Complete(LayerState::Exhausted)
            }
            LayerState::NotStarted => Transition::Attempt(1),
            LayerState::Attempting(k) => match verdict {
                Verdict::Accept => Transition::Complete(LayerState::Succeeded),
                Verdict::Escalate => Transition::Complete(LayerState::Escalated),
                Verdict::Retry if k < run.max_attempts => Transition::Attempt(k + 1),
                Verdict::Retry => Transition::Complete(LayerState::Exhausted),
            },
            terminal => return Transition::Complete(terminal),
        };

        run.state_history.push(run.state);
        match transition {
            Transition::Attempt(k) => {
                run.state = LayerState::Attempting(k);
                run.attempts_made = k;
            }
            Transition::Complete(state) => run.state = state,
        }

        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_on_first_attempt() {
        let mut run = LayerRun::new("fetch", 3);
        assert_eq!(StateMachine::next(&mut run, Verdict::Retry), Transition::Attempt(1));
        assert_eq!(run.state, LayerState::Attempting(1));

        let t = StateMachine::next(&mut run, Verdict::Accept);
        assert_eq!(t, Transition::Complete(LayerState::Succeeded));
        assert_eq!(run.attempts_made, 1);
        assert!(run.state.is_terminal());
    }

    #[test]
    fn retries_until_budget_is_spent() {
        let mut run = LayerRun::new("fetch", 2);
        StateMachine::next(&mut run, Verdict::Retry);

        assert_eq!(StateMachine::next(&mut run, Verdict::Retry), Transition::Attempt(2));
        assert_eq!(
            StateMachine::next(&mut run, Verdict::Retry),
            Transition::Complete(LayerState::Exhausted)
        );
        assert_eq!(run.attempts_made, 2);
    }

    #[test]
    fn escalation_stops_before_budget() {
        let mut run = LayerRun::new("fetch", 5);
        StateMachine::next(&mut run, Verdict::Retry);
        StateMachine::next(&mut run, Verdict::Retry);

        let t = StateMachine::next(&mut run, Verdict::Escalate);
        assert_eq!(t, Transition::Complete(LayerState::Escalated));
        assert_eq!(run.attempts_made, 2);
    }

    #[test]
    fn terminal_state_is_sticky() {
        let mut run = LayerRun::new("fetch", 1);
        StateMachine::next(&mut run, Verdict::Retry);
        StateMachine::next(&mut run, Verdict::Accept);
        let history_len = run.state_history.len();

        let t = StateMachine::next(&mut run, Verdict::Retry);
        assert_eq!(t, Transition::Complete(LayerState::Succeeded));
        assert_eq!(run.state_history.len(), history_len);
    }

    #[test]
    fn zero_budget_exhausts_immediately() {
        let mut run = LayerRun::new("fetch", 0);
        assert_eq!(
            StateMachine::next(&mut run, Verdict::Retry),
            Transition::Complete(LayerState::Exhausted)
        );
        assert_eq!(run.attempts_made, 0);
    }

    #[test]
    fn state_history_is_recorded() {
        let mut run = LayerRun::new("fetch", 3);
        StateMachine::next(&mut run, Verdict::Retry);
        StateMachine::next(&mut run, Verdict::Retry);
        StateMachine::next(&mut run, Verdict::Accept);

        assert_eq!(
            run.state_history,
            vec![
                LayerState::NotStarted,
                LayerState::Attempting(1),
                LayerState::Attempting(2)
            ]
        );
    }

    #[test]
    fn state_display() {
        assert_eq!(LayerState::NotStarted.to_string(), "NOT_STARTED");
        assert_eq!(LayerState::Attempting(2).to_string(), "ATTEMPTING(2)");
        assert_eq!(LayerState::Escalated.to_string(), "ESCALATED");
    }
}
