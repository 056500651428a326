//! Saga steps: one `(from, event) -> to` transition with its compensations.

use crate::core::{Context, Event, Fault, Payload};
use crate::effects::{BoxFuture, Compensation, StateMachine, TransitionSpec};

type StateOf<C> = <C as Context>::State;

/// A single step of a saga.
///
/// Steps are the saga-shaped way to write descriptor entries: the source
/// state and event travel with the transition, so a list of steps reads as
/// the workflow it describes.
pub struct SagaStep<C: Context, E: Event> {
    pub(crate) from: StateOf<C>,
    pub(crate) event: E,
    pub(crate) spec: TransitionSpec<C, E>,
}

impl<C: Context, E: Event> SagaStep<C, E> {
    pub fn new(from: StateOf<C>, event: E, spec: TransitionSpec<C, E>) -> Self {
        Self { from, event, spec }
    }

    /// Step with an action and a fixed target.
    pub fn to<F>(from: StateOf<C>, event: E, to: StateOf<C>, action: F) -> Self
    where
        F: for<'a> Fn(&'a mut StateMachine<C, E>, Option<Payload>) -> BoxFuture<'a, Result<(), Fault>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(from, event, TransitionSpec::to(to, action))
    }

    /// Step whose target is computed from the action's result.
    pub fn resolve<R, F, T>(from: StateOf<C>, event: E, resolver: T, action: F) -> Self
    where
        R: Send + 'static,
        F: for<'a> Fn(&'a mut StateMachine<C, E>, Option<Payload>) -> BoxFuture<'a, Result<R, Fault>>
            + Send
            + Sync
            + 'static,
        T: Fn(R, &C) -> StateOf<C> + Send + Sync + 'static,
    {
        Self::new(from, event, TransitionSpec::resolve(resolver, action))
    }

    /// Step that only moves the machine.
    pub fn direct(from: StateOf<C>, event: E, to: StateOf<C>) -> Self {
        Self::new(from, event, TransitionSpec::direct(to))
    }

    /// Append a compensation, matched after the ones added before it.
    pub fn compensate(mut self, compensation: Compensation<C, E>) -> Self {
        self.spec = self.spec.catch(compensation);
        self
    }

    pub fn from(&self) -> &StateOf<C> {
        &self.from
    }

    pub fn event(&self) -> &E {
        &self.event
    }

    pub fn spec(&self) -> &TransitionSpec<C, E> {
        &self.spec
    }
}
