//! Errors surfaced by a draining machine.

use crate::core::{Event, Fault, State};
use crate::effects::report::{DrainReport, FailureStage};
use thiserror::Error;

/// Errors returned by [`StateMachine::dispatch`](super::StateMachine::dispatch)
/// and friends.
///
/// Every queued action is still processed before the error is returned; the
/// full report travels with it.
#[derive(Debug, Error)]
pub enum MachineError<S: State, E: Event> {
    #[error("{stage:?} failed while handling {event:?} in state {state:?}: {fault}")]
    Unrecoverable {
        state: S,
        event: E,
        stage: FailureStage,
        #[source]
        fault: Fault,
        report: DrainReport<S, E>,
    },
}

impl<S: State, E: Event> MachineError<S, E> {
    pub fn fault(&self) -> &Fault {
        match self {
            Self::Unrecoverable { fault, .. } => fault,
        }
    }

    pub fn report(&self) -> &DrainReport<S, E> {
        match self {
            Self::Unrecoverable { report, .. } => report,
        }
    }

    pub fn into_report(self) -> DrainReport<S, E> {
        match self {
            Self::Unrecoverable { report, .. } => report,
        }
    }
}

impl<S: State, E: Event> From<MachineError<S, E>> for Fault {
    fn from(error: MachineError<S, E>) -> Self {
        Fault::fatal("MachineError", error.to_string()).with_source(error)
    }
}
