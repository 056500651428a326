//! Per-action outcomes collected while a machine drains its queue.

use crate::core::{Event, Fault, State};

/// Where in the transition algorithm a fault escaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureStage {
    /// Hooks or action of the transition itself, with nothing to recover it.
    Transition,
    /// Hooks or action of the selected compensation.
    Compensation,
    /// The descriptor's retry handler.
    Retry,
}

/// Result of executing a single queued action
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<S: State> {
    /// No transition is defined for the current state and event.
    Skipped { state: Option<S> },

    /// The action succeeded and the machine moved to `to`.
    Transitioned { from: S, to: S },

    /// The action failed and a compensation moved the machine to `to`.
    Compensated { from: S, to: S, fault: Fault },

    /// The action failed retryably and the retry handler took over.
    RetryDelegated { from: S, fault: Fault },

    /// The fault was not recovered.
    Failed {
        from: S,
        stage: FailureStage,
        fault: Fault,
    },
}

impl<S: State> Outcome<S> {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Compensated { fault, .. }
            | Self::RetryDelegated { fault, .. }
            | Self::Failed { fault, .. } => Some(fault),
            Self::Skipped { .. } | Self::Transitioned { .. } => None,
        }
    }
}

/// One processed action and what happened to it.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionRecord<S: State, E: Event> {
    pub event: E,
    pub outcome: Outcome<S>,
}

/// Everything a single drain processed, in execution order.
///
/// A report is *deferred* when the dispatch that produced it arrived while
/// another drain was running: the action was queued and will be processed,
/// and reported, by that drain.
#[derive(Clone, Debug, PartialEq)]
pub struct DrainReport<S: State, E: Event> {
    records: Vec<ActionRecord<S, E>>,
    deferred: bool,
}

impl<S: State, E: Event> Default for DrainReport<S, E> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            deferred: false,
        }
    }
}

impl<S: State, E: Event> DrainReport<S, E> {
    pub(crate) fn deferred() -> Self {
        Self {
            records: Vec::new(),
            deferred: true,
        }
    }

    pub(crate) fn push(&mut self, event: E, outcome: Outcome<S>) {
        self.records.push(ActionRecord { event, outcome });
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn records(&self) -> &[ActionRecord<S, E>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Events in the order they were executed.
    pub fn events(&self) -> Vec<&E> {
        self.records.iter().map(|r| &r.event).collect()
    }

    /// First record whose fault was not recovered.
    pub fn first_failure(&self) -> Option<&ActionRecord<S, E>> {
        self.records.iter().find(|r| r.outcome.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionRecord<S, E>> {
        self.records.iter().filter(|r| r.outcome.is_failure())
    }
}
