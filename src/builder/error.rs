//! Build errors for saga builders.

use thiserror::Error;

/// Problems [`SagaBuilder::validate`](super::SagaBuilder::validate) reports.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StepViolation {
    /// A later step reuses an earlier step's `(from, event)` pair and replaces it.
    #[error("Step {index} redefines {event} out of {from}, replacing step {replaced}")]
    DuplicateStep {
        from: String,
        event: String,
        index: usize,
        replaced: usize,
    },

    /// A compensation can never run because an earlier unguarded one always matches first.
    #[error("Compensation {index} of {event} out of {from} is shadowed by compensation {shadowed_by}")]
    ShadowedCompensation {
        from: String,
        event: String,
        index: usize,
        shadowed_by: usize,
    },
}

/// Errors that can occur when building descriptors strictly.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No steps defined. Add at least one step")]
    NoSteps,

    #[error("Saga has {} invalid step(s): {}", .0.len(), join(.0))]
    Invalid(Vec<StepViolation>),
}

fn join(violations: &[StepViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
