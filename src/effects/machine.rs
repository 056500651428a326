//! State machine that drains queued actions through a descriptor.

use crate::core::{
    Action, ActionQueue, Context, Event, Fault, State, StateHistory, StateTransition,
    TransitionKind,
};
use crate::effects::descriptor::{Compensation, Descriptor, TransitionSpec};
use crate::effects::error::MachineError;
use crate::effects::report::{DrainReport, FailureStage, Outcome};
use chrono::Utc;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

type StateOf<C> = <C as Context>::State;

/// Result of driving (or joining) a drain.
pub type DispatchResult<C, E> =
    Result<DrainReport<StateOf<C>, E>, MachineError<StateOf<C>, E>>;

/// Point-in-time copy of a machine's context and queue.
///
/// Treat it as opaque: restore it with
/// [`StateMachine::load_snapshot`].
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<C: Context, E: Event> {
    context: C,
    queue: Vec<Action<E>>,
    head_in_flight: bool,
}

impl<C: Context, E: Event> Snapshot<C, E> {
    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn queue(&self) -> &[Action<E>] {
        &self.queue
    }
}

/// Single-actor engine executing one action at a time.
///
/// Actions are queued by [`dispatch`](Self::dispatch). The call that finds the
/// machine idle drives the drain: it executes the queue head, assigns the
/// next state and repeats until the queue is empty. Dispatches made while a
/// drain runs (from transition actions, hooks, compensations or the retry
/// handler, all of which receive the machine) only enqueue, so they run
/// after the current transition completes, in FIFO order.
///
/// # Example
///
/// ```rust
/// use sagaflow::core::{Action, Context};
/// use sagaflow::effects::{Descriptor, StateMachine, TransitionSpec};
/// use sagaflow::{event_enum, state_enum};
///
/// state_enum! {
///     enum Light { Red, Green }
/// }
/// event_enum! {
///     enum Signal { Go, Stop }
/// }
///
/// #[derive(Default)]
/// struct Crossing {
///     state: Option<Light>,
///     cars: u32,
/// }
///
/// impl Context for Crossing {
///     type State = Light;
///     fn state(&self) -> Option<&Light> { self.state.as_ref() }
///     fn set_state(&mut self, state: Light) { self.state = Some(state); }
/// }
///
/// type Machine = StateMachine<Crossing, Signal>;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let descriptor = Descriptor::new(Light::Red)
///     .on(Light::Red, Signal::Go, TransitionSpec::to(Light::Green, |fsm: &mut Machine, _| {
///         Box::pin(async move {
///             fsm.context_mut().cars += 1;
///             Ok(())
///         })
///     }))
///     .on(Light::Green, Signal::Stop, TransitionSpec::direct(Light::Red));
///
/// let mut machine = StateMachine::new(descriptor, Crossing::default());
/// assert_eq!(machine.current_state(), Some(&Light::Red));
///
/// machine.dispatch(Action::new(Signal::Go)).await.unwrap();
/// assert_eq!(machine.current_state(), Some(&Light::Green));
/// assert_eq!(machine.context().cars, 1);
///
/// // No transition for Go out of Green: the action is skipped.
/// machine.dispatch(Action::new(Signal::Go)).await.unwrap();
/// assert_eq!(machine.current_state(), Some(&Light::Green));
/// # }
/// ```
pub struct StateMachine<C: Context, E: Event> {
    descriptor: Arc<Descriptor<C, E>>,
    context: C,
    queue: ActionQueue<E>,
    history: StateHistory<StateOf<C>>,
    attempts: usize,
    attempt_key: Option<(StateOf<C>, E)>,
    draining: bool,
    head_in_flight: bool,
}

/// Holds the dispatch gate for the duration of a drain.
///
/// Dropping it releases the gate even when the drain future is cancelled; an
/// interrupted head stays queued and runs again on the next drain.
struct DrainGate<'a, C: Context, E: Event> {
    machine: &'a mut StateMachine<C, E>,
}

impl<'a, C: Context, E: Event> DrainGate<'a, C, E> {
    fn open(machine: &'a mut StateMachine<C, E>) -> Self {
        machine.draining = true;
        Self { machine }
    }
}

impl<C: Context, E: Event> Deref for DrainGate<'_, C, E> {
    type Target = StateMachine<C, E>;

    fn deref(&self) -> &Self::Target {
        self.machine
    }
}

impl<C: Context, E: Event> DerefMut for DrainGate<'_, C, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.machine
    }
}

impl<C: Context, E: Event> Drop for DrainGate<'_, C, E> {
    fn drop(&mut self) {
        if self.machine.head_in_flight {
            warn!(
                queued = self.machine.queue.len(),
                "drain interrupted; head action left queued"
            );
        }
        self.machine.draining = false;
        self.machine.head_in_flight = false;
    }
}

impl<C: Context, E: Event> StateMachine<C, E> {
    /// Create a machine over `context`, assigning the descriptor's initial
    /// state when the context has none.
    pub fn new(descriptor: impl Into<Arc<Descriptor<C, E>>>, mut context: C) -> Self {
        let descriptor = descriptor.into();
        if context.state().is_none() {
            context.set_state(descriptor.initial_state.clone());
        }

        Self {
            descriptor,
            context,
            queue: ActionQueue::new(),
            history: StateHistory::new(),
            attempts: 0,
            attempt_key: None,
            draining: false,
            head_in_flight: false,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Replace the context wholesale.
    pub fn set_context(&mut self, context: C) {
        self.context = context;
        self.reset_attempts();
    }

    pub fn into_context(self) -> C {
        self.context
    }

    pub fn current_state(&self) -> Option<&StateOf<C>> {
        self.context.state()
    }

    /// Check if machine is in a final state
    pub fn is_final(&self) -> bool {
        self.current_state().is_some_and(State::is_final)
    }

    pub fn descriptor(&self) -> &Descriptor<C, E> {
        &self.descriptor
    }

    pub fn history(&self) -> &StateHistory<StateOf<C>> {
        &self.history
    }

    /// Number of queued actions, the executing one included.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Copy of the queued actions, in execution order.
    pub fn pending(&self) -> Vec<Action<E>> {
        self.queue.snapshot_elements()
    }

    /// Whether a drain is currently running.
    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Queue an action without driving the queue.
    pub fn enqueue(&mut self, action: impl Into<Action<E>>) {
        let action = action.into();
        trace!(event = %action.event.name(), queued = self.queue.len() + 1, "action enqueued");
        self.queue.enqueue(action);
    }

    /// Queue `action` and, unless a drain is already running, drain the
    /// queue until it is empty.
    ///
    /// Returns a deferred report when called during a drain. Otherwise the
    /// report covers every action this drain executed, including actions the
    /// retry handler or compensations dispatched along the way.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Unrecoverable`] when any action of the drain
    /// ended with a fault that was neither compensated nor handed to a retry
    /// handler, or when a compensation or the retry handler itself failed.
    /// The remaining queue is still drained first.
    ///
    /// Dropping the returned future mid-transition ends the drain. The
    /// interrupted action stays at the head of the queue and runs again on
    /// the next `dispatch` or `resume`.
    pub async fn dispatch(&mut self, action: impl Into<Action<E>>) -> DispatchResult<C, E> {
        self.enqueue(action);
        if self.draining {
            trace!(queued = self.queue.len(), "drain in progress; dispatch deferred");
            return Ok(DrainReport::deferred());
        }
        self.drain().await
    }

    /// Discard every queued action and dispatch `action`.
    ///
    /// Called during a drain, the executing action is discarded from the
    /// queue as well and `action` runs as soon as it completes.
    pub async fn abort(&mut self, action: impl Into<Action<E>>) -> DispatchResult<C, E> {
        let discarded = self.queue.len();
        self.queue.clear();
        self.head_in_flight = false;
        debug!(discarded, "queue aborted");
        self.dispatch(action).await
    }

    /// Drain whatever is queued, for example after restoring a checkpoint.
    ///
    /// # Errors
    ///
    /// Same as [`dispatch`](Self::dispatch).
    pub async fn resume(&mut self) -> DispatchResult<C, E> {
        if self.draining {
            return Ok(DrainReport::deferred());
        }
        self.drain().await
    }

    /// Capture the context and queue contents.
    pub fn snapshot(&self) -> Snapshot<C, E>
    where
        C: Clone,
    {
        Snapshot {
            context: self.context.clone(),
            queue: self.queue.snapshot_elements(),
            head_in_flight: self.head_in_flight,
        }
    }

    /// Replace the context and queue contents with a snapshot's.
    ///
    /// A snapshot captured while an action was executing holds that action
    /// at its head. Loaded during a drain, that head counts as the executing
    /// action and is removed when the current transition completes; loaded
    /// into an idle machine, it runs again on the next drain.
    pub fn load_snapshot(&mut self, snapshot: Snapshot<C, E>) {
        self.context = snapshot.context;
        self.queue.restore_elements(&snapshot.queue);
        self.head_in_flight = self.draining && snapshot.head_in_flight;
        self.reset_attempts();
    }

    pub(crate) fn restore_backlog(
        &mut self,
        queue: &[Action<E>],
        history: StateHistory<StateOf<C>>,
    ) {
        self.queue.restore_elements(queue);
        self.history = history;
        self.head_in_flight = false;
        self.reset_attempts();
    }

    fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.attempt_key = None;
    }

    async fn drain(&mut self) -> DispatchResult<C, E> {
        let mut gate = DrainGate::open(self);
        let mut report = DrainReport::default();

        while let Some(action) = gate.queue.peek().cloned() {
            gate.head_in_flight = true;
            let outcome = gate.execute(&action).await;
            if gate.head_in_flight {
                gate.queue.dequeue();
                gate.head_in_flight = false;
            }
            report.push(action.event, outcome);
        }

        drop(gate);

        let failure = report.first_failure().and_then(|record| match &record.outcome {
            Outcome::Failed { from, stage, fault } => {
                Some((from.clone(), record.event.clone(), *stage, fault.clone()))
            }
            _ => None,
        });

        match failure {
            Some((state, event, stage, fault)) => Err(MachineError::Unrecoverable {
                state,
                event,
                stage,
                fault,
                report,
            }),
            None => Ok(report),
        }
    }

    async fn execute(&mut self, action: &Action<E>) -> Outcome<StateOf<C>> {
        let descriptor = Arc::clone(&self.descriptor);

        let Some(from) = self.context.state().cloned() else {
            debug!(event = %action.event.name(), "context has no state; action skipped");
            return Outcome::Skipped { state: None };
        };

        let Some(spec) = descriptor.transition(&from, &action.event) else {
            debug!(
                state = %from.name(),
                event = %action.event.name(),
                "no transition defined; action skipped"
            );
            return Outcome::Skipped { state: Some(from) };
        };

        let key = (from.clone(), action.event.clone());
        if self.attempt_key.as_ref() != Some(&key) {
            self.attempts = 0;
            self.attempt_key = Some(key);
        }
        self.attempts += 1;
        let attempt = self.attempts;

        match self.run_transition(&descriptor, spec, action).await {
            Ok(to) => {
                debug!(
                    from = %from.name(),
                    to = %to.name(),
                    event = %action.event.name(),
                    attempt,
                    "transition completed"
                );
                self.record(&from, &to, action, TransitionKind::Action, attempt);
                Outcome::Transitioned { from, to }
            }
            Err(fault) => {
                self.recover(&descriptor, spec, action, from, fault, attempt)
                    .await
            }
        }
    }

    async fn run_transition(
        &mut self,
        descriptor: &Descriptor<C, E>,
        spec: &TransitionSpec<C, E>,
        action: &Action<E>,
    ) -> Result<StateOf<C>, Fault> {
        if let Some(hook) = &descriptor.before_transition {
            hook(&mut *self, action).await?;
        }

        let next = spec.run.execute(&mut *self, action.payload.clone()).await?;
        self.context.set_state(next.clone());

        if let Some(hook) = &descriptor.after_transition {
            hook(&mut *self, action).await?;
        }

        Ok(next)
    }

    async fn recover(
        &mut self,
        descriptor: &Descriptor<C, E>,
        spec: &TransitionSpec<C, E>,
        action: &Action<E>,
        from: StateOf<C>,
        fault: Fault,
        attempt: usize,
    ) -> Outcome<StateOf<C>> {
        let selected = spec
            .catch
            .iter()
            .find(|compensation| compensation.matches(&fault, &self.context));

        if let Some(compensation) = selected {
            warn!(
                state = %from.name(),
                event = %action.event.name(),
                fault = %fault,
                to = %compensation.target.name(),
                "transition failed; compensating"
            );
            return match self.run_compensation(descriptor, compensation, action).await {
                Ok(()) => {
                    let to = compensation.target.clone();
                    self.record(&from, &to, action, TransitionKind::Compensation, attempt);
                    Outcome::Compensated { from, to, fault }
                }
                Err(compensation_fault) => {
                    error!(
                        state = %from.name(),
                        event = %action.event.name(),
                        fault = %compensation_fault,
                        "compensation failed"
                    );
                    Outcome::Failed {
                        from,
                        stage: FailureStage::Compensation,
                        fault: compensation_fault,
                    }
                }
            };
        }

        if fault.is_retryable() {
            if let Some(retry) = &descriptor.retry {
                warn!(
                    state = %from.name(),
                    event = %action.event.name(),
                    fault = %fault,
                    attempt,
                    "transition failed; delegating to retry handler"
                );
                return match retry(&mut *self, action, &fault).await {
                    Ok(()) => Outcome::RetryDelegated { from, fault },
                    Err(retry_fault) => {
                        error!(
                            state = %from.name(),
                            event = %action.event.name(),
                            fault = %retry_fault,
                            "retry handler failed"
                        );
                        Outcome::Failed {
                            from,
                            stage: FailureStage::Retry,
                            fault: retry_fault,
                        }
                    }
                };
            }
        }

        error!(
            state = %from.name(),
            event = %action.event.name(),
            fault = %fault,
            "transition failed with no recovery"
        );
        Outcome::Failed {
            from,
            stage: FailureStage::Transition,
            fault,
        }
    }

    async fn run_compensation(
        &mut self,
        descriptor: &Descriptor<C, E>,
        compensation: &Compensation<C, E>,
        action: &Action<E>,
    ) -> Result<(), Fault> {
        if let Some(hook) = &descriptor.before_transition {
            hook(&mut *self, action).await?;
        }

        (compensation.action)(&mut *self, action.payload.clone()).await?;
        self.context.set_state(compensation.target.clone());

        if let Some(hook) = &descriptor.after_transition {
            hook(&mut *self, action).await?;
        }

        Ok(())
    }

    fn record(
        &mut self,
        from: &StateOf<C>,
        to: &StateOf<C>,
        action: &Action<E>,
        kind: TransitionKind,
        attempt: usize,
    ) {
        self.history = self.history.record(StateTransition {
            from: from.clone(),
            to: to.clone(),
            event: action.event.name().to_string(),
            kind,
            timestamp: Utc::now(),
            attempt,
        });

        if from != to {
            self.reset_attempts();
        }
    }
}
