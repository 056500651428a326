//! Core traits for states, events and workflow contexts.
//!
//! States and events are caller-defined closed alphabets. The context is the
//! mutable record a machine owns; it carries the current state alongside any
//! workflow-specific fields.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Trait for state machine states.
///
/// All methods are pure - no side effects. States are immutable values that
/// describe the current position in a workflow and key the transition table,
/// so they must be hashable.
///
/// # Example
///
/// ```rust
/// use sagaflow::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum TaskState {
///     Pending,
///     Running,
///     Complete,
///     Failed,
/// }
///
/// impl State for TaskState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Pending => "Pending",
///             Self::Running => "Running",
///             Self::Complete => "Complete",
///             Self::Failed => "Failed",
///         }
///     }
///
///     fn is_final(&self) -> bool {
///         matches!(self, Self::Complete | Self::Failed)
///     }
///
///     fn is_error(&self) -> bool {
///         matches!(self, Self::Failed)
///     }
/// }
/// ```
pub trait State:
    Clone + Eq + Hash + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// Check if this is a final (terminal) state.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Check if this is an error state.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }
}

/// Trait for the events that drive transitions.
pub trait Event:
    Clone + Eq + Hash + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Get the event's name for display/logging.
    fn name(&self) -> &str;
}

/// The mutable record owned by a running machine.
///
/// The state may be unset; a machine constructed over a context without a
/// state assigns the descriptor's initial state.
///
/// # Example
///
/// ```rust
/// use sagaflow::core::Context;
/// use sagaflow::state_enum;
///
/// state_enum! {
///     enum Phase {
///         Start,
///         Done,
///     }
///     final: [Done]
/// }
///
/// #[derive(Default)]
/// struct Job {
///     state: Option<Phase>,
///     attempts: u32,
/// }
///
/// impl Context for Job {
///     type State = Phase;
///
///     fn state(&self) -> Option<&Phase> {
///         self.state.as_ref()
///     }
///
///     fn set_state(&mut self, state: Phase) {
///         self.state = Some(state);
///     }
/// }
///
/// let mut job = Job::default();
/// assert!(job.state().is_none());
/// job.set_state(Phase::Start);
/// assert_eq!(job.state(), Some(&Phase::Start));
/// ```
pub trait Context: Send + 'static {
    /// The state alphabet of the workflow.
    type State: State;

    /// The current state, if one has been assigned.
    fn state(&self) -> Option<&Self::State>;

    /// Replace the current state.
    fn set_state(&mut self, state: Self::State);
}
