//! State transition history tracking.
//!
//! Provides immutable tracking of the transitions a machine has completed.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a recorded transition reached its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    /// The transition action succeeded.
    Action,
    /// The transition action failed and a compensation chose the target.
    Compensation,
}

/// Record of a single completed transition.
///
/// # Example
///
/// ```rust
/// use sagaflow::core::{StateTransition, TransitionKind};
/// use sagaflow::state_enum;
/// use chrono::Utc;
///
/// state_enum! {
///     enum TaskState {
///         Pending,
///         Running,
///     }
/// }
///
/// let transition = StateTransition {
///     from: TaskState::Pending,
///     to: TaskState::Running,
///     event: "Start".to_string(),
///     kind: TransitionKind::Action,
///     timestamp: Utc::now(),
///     attempt: 1,
/// };
/// assert_eq!(transition.attempt, 1);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being transitioned from
    pub from: S,
    /// The state being transitioned to
    pub to: S,
    /// Name of the event that drove the transition
    pub event: String,
    /// Whether the target came from the action or a compensation
    pub kind: TransitionKind,
    /// When the transition completed
    pub timestamp: DateTime<Utc>,
    /// Executions from `from` since the machine last changed state, this one included
    pub attempt: usize,
}

/// Ordered history of completed transitions.
///
/// History is immutable - [`record`](Self::record) returns a new history with
/// the transition added.
///
/// # Example
///
/// ```rust
/// use sagaflow::core::{StateHistory, StateTransition, TransitionKind};
/// use sagaflow::state_enum;
/// use chrono::Utc;
///
/// state_enum! {
///     enum WorkState {
///         Start,
///         Middle,
///         End,
///     }
/// }
///
/// let step = |from, to| StateTransition {
///     from,
///     to,
///     event: "Advance".to_string(),
///     kind: TransitionKind::Action,
///     timestamp: Utc::now(),
///     attempt: 1,
/// };
///
/// let history = StateHistory::new()
///     .record(step(WorkState::Start, WorkState::Middle))
///     .record(step(WorkState::Middle, WorkState::End));
///
/// let path = history.get_path();
/// assert_eq!(path, vec![&WorkState::Start, &WorkState::Middle, &WorkState::End]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State> {
    transitions: Vec<StateTransition<S>>,
}

impl<S: State> Default for StateHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> StateHistory<S> {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Record a transition, returning a new history.
    ///
    /// The existing history is left untouched.
    pub fn record(&self, transition: StateTransition<S>) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// Get the path of states traversed.
    ///
    /// Returns the first transition's `from` state followed by the `to`
    /// state of every transition. Empty when nothing was recorded.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::with_capacity(self.transitions.len() + 1);

        if let Some(first) = self.transitions.first() {
            path.push(&first.from);
        }

        for transition in &self.transitions {
            path.push(&transition.to);
        }

        path
    }

    /// Time between the first and the last recorded transition.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Get all transitions, in order.
    pub fn transitions(&self) -> &[StateTransition<S>] {
        &self.transitions
    }

    /// Most recent transition, if any.
    pub fn last(&self) -> Option<&StateTransition<S>> {
        self.transitions.last()
    }
}
