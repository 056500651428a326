//! Builder compiling saga steps into a descriptor.

use crate::builder::error::{BuildError, StepViolation};
use crate::builder::step::SagaStep;
use crate::core::{Action, Context, Event, Fault, State};
use crate::effects::{BoxFuture, Descriptor, RetryHandler, StateMachine, TransitionHook};
use std::collections::HashMap;
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::debug;

type StateOf<C> = <C as Context>::State;

/// Builder for saga descriptors with a fluent API.
///
/// Steps are compiled in the order they were added. A later step with the
/// same `(from, event)` as an earlier one replaces it; [`validate`](Self::validate)
/// reports such overlaps and [`build_strict`](Self::build_strict) refuses them.
///
/// # Example
///
/// ```
/// use sagaflow::builder::{SagaBuilder, SagaStep};
/// use sagaflow::core::Context;
/// use sagaflow::effects::StateMachine;
/// use sagaflow::{event_enum, state_enum};
///
/// state_enum! {
///     enum Trip { Planned, Booked, Cancelled }
///     final: [Booked, Cancelled]
/// }
/// event_enum! {
///     enum TripEvent { Book, Cancel }
/// }
///
/// struct Itinerary { state: Option<Trip> }
///
/// impl Context for Itinerary {
///     type State = Trip;
///     fn state(&self) -> Option<&Trip> { self.state.as_ref() }
///     fn set_state(&mut self, state: Trip) { self.state = Some(state); }
/// }
///
/// let descriptor = SagaBuilder::<Itinerary, TripEvent>::new(Trip::Planned)
///     .step(SagaStep::direct(Trip::Planned, TripEvent::Book, Trip::Booked))
///     .step(SagaStep::direct(Trip::Planned, TripEvent::Cancel, Trip::Cancelled))
///     .build_strict()
///     .unwrap();
///
/// assert_eq!(descriptor.events(&Trip::Planned).len(), 2);
/// ```
pub struct SagaBuilder<C: Context, E: Event> {
    initial: StateOf<C>,
    steps: Vec<SagaStep<C, E>>,
    before_transition: Option<TransitionHook<C, E>>,
    after_transition: Option<TransitionHook<C, E>>,
    retry: Option<RetryHandler<C, E>>,
}

impl<C: Context, E: Event> SagaBuilder<C, E> {
    pub fn new(initial: StateOf<C>) -> Self {
        Self {
            initial,
            steps: Vec::new(),
            before_transition: None,
            after_transition: None,
            retry: None,
        }
    }

    pub fn step(mut self, step: SagaStep<C, E>) -> Self {
        self.steps.push(step);
        self
    }

    /// Add multiple steps at once.
    pub fn steps(mut self, steps: impl IntoIterator<Item = SagaStep<C, E>>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn before_transition<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut StateMachine<C, E>, &'a Action<E>) -> BoxFuture<'a, Result<(), Fault>>
            + Send
            + Sync
            + 'static,
    {
        self.before_transition = Some(Arc::new(hook));
        self
    }

    pub fn after_transition<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut StateMachine<C, E>, &'a Action<E>) -> BoxFuture<'a, Result<(), Fault>>
            + Send
            + Sync
            + 'static,
    {
        self.after_transition = Some(Arc::new(hook));
        self
    }

    pub fn retry<F>(mut self, handler: F) -> Self
    where
        F: for<'a> Fn(
                &'a mut StateMachine<C, E>,
                &'a Action<E>,
                &'a Fault,
            ) -> BoxFuture<'a, Result<(), Fault>>
            + Send
            + Sync
            + 'static,
    {
        self.retry = Some(Arc::new(handler));
        self
    }

    pub fn retry_handler(mut self, handler: RetryHandler<C, E>) -> Self {
        self.retry = Some(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check every step, accumulating ALL violations.
    pub fn validate(&self) -> Validation<(), NonEmptyVec<StepViolation>> {
        let mut checks: Vec<Validation<(), NonEmptyVec<StepViolation>>> = Vec::new();
        let mut seen: HashMap<(&StateOf<C>, &E), usize> = HashMap::new();

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(replaced) = seen.insert((&step.from, &step.event), index) {
                checks.push(Validation::fail(StepViolation::DuplicateStep {
                    from: step.from.name().to_string(),
                    event: step.event.name().to_string(),
                    index,
                    replaced,
                }));
            }

            for violation in shadowed_compensations(step) {
                checks.push(Validation::fail(violation));
            }
        }

        Validation::all_vec(checks).map(|_| ())
    }

    /// Compile the steps into a descriptor. Later duplicates replace earlier steps.
    pub fn build(self) -> Descriptor<C, E> {
        let mut descriptor = Descriptor::new(self.initial);
        descriptor.before_transition = self.before_transition;
        descriptor.after_transition = self.after_transition;
        descriptor.retry = self.retry;

        let steps = self.steps.len();
        for step in self.steps {
            descriptor.insert(step.from, step.event, step.spec);
        }

        debug!(steps, "saga descriptor built");
        descriptor
    }

    /// Build only if there is at least one step and [`validate`](Self::validate) passes.
    pub fn build_strict(self) -> Result<Descriptor<C, E>, BuildError> {
        if self.steps.is_empty() {
            return Err(BuildError::NoSteps);
        }

        match self.validate() {
            Validation::Success(()) => Ok(self.build()),
            Validation::Failure(violations) => {
                Err(BuildError::Invalid(violations.iter().cloned().collect()))
            }
        }
    }
}

fn shadowed_compensations<C: Context, E: Event>(
    step: &SagaStep<C, E>,
) -> impl Iterator<Item = StepViolation> + '_ {
    let compensations = step.spec.compensations();

    compensations.iter().enumerate().filter_map(move |(index, compensation)| {
        compensations[..index]
            .iter()
            .position(|earlier| !earlier.is_guarded() && earlier.class().covers(compensation.class()))
            .map(|shadowed_by| StepViolation::ShadowedCompensation {
                from: step.from.name().to_string(),
                event: step.event.name().to_string(),
                index,
                shadowed_by,
            })
    })
}
