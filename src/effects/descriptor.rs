//! Transition descriptors: the static `(state, event) -> transition` table.
//!
//! Every callback a descriptor stores is an explicit function value. Async
//! callbacks receive the running machine and return a boxed future, so a
//! closure body is written as `Box::pin(async move { ... })`.

use crate::core::{Action, Context, Event, Fault, FaultClass, Guard, Payload};
use crate::effects::machine::StateMachine;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by every async callback.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Hook run before and after every transition and compensation.
pub type TransitionHook<C, E> = Arc<
    dyn for<'a> Fn(&'a mut StateMachine<C, E>, &'a Action<E>) -> BoxFuture<'a, Result<(), Fault>>
        + Send
        + Sync,
>;

/// Handler invoked for retryable faults no compensation claimed.
pub type RetryHandler<C, E> = Arc<
    dyn for<'a> Fn(
            &'a mut StateMachine<C, E>,
            &'a Action<E>,
            &'a Fault,
        ) -> BoxFuture<'a, Result<(), Fault>>
        + Send
        + Sync,
>;

/// Action run by a compensation.
pub type CompensationAction<C, E> = Arc<
    dyn for<'a> Fn(&'a mut StateMachine<C, E>, Option<Payload>) -> BoxFuture<'a, Result<(), Fault>>
        + Send
        + Sync,
>;

type StateOf<C> = <C as Context>::State;

/// Where a successful transition goes.
pub enum Target<R, C: Context> {
    /// A fixed state.
    State(StateOf<C>),
    /// Computed from the action's result and the context.
    Resolve(Arc<dyn Fn(R, &C) -> StateOf<C> + Send + Sync>),
}

impl<R, C: Context> Target<R, C> {
    pub fn resolve_with<F>(resolver: F) -> Self
    where
        F: Fn(R, &C) -> StateOf<C> + Send + Sync + 'static,
    {
        Self::Resolve(Arc::new(resolver))
    }

    fn resolve(&self, result: R, context: &C) -> StateOf<C> {
        match self {
            Self::State(state) => state.clone(),
            Self::Resolve(resolver) => resolver(result, context),
        }
    }

    fn fixed(&self) -> Option<&StateOf<C>> {
        match self {
            Self::State(state) => Some(state),
            Self::Resolve(_) => None,
        }
    }
}

/// Type-erased transition action plus target resolution.
///
/// The result type `R` of an action only exists between the action and its
/// target resolver, so both are run behind one object-safe call.
pub(crate) trait ErasedTransition<C: Context, E: Event>: Send + Sync {
    fn execute<'a>(
        &'a self,
        machine: &'a mut StateMachine<C, E>,
        payload: Option<Payload>,
    ) -> BoxFuture<'a, Result<StateOf<C>, Fault>>;

    fn fixed_target(&self) -> Option<&StateOf<C>>;
}

struct ActionWrapper<F, R, C: Context> {
    action: F,
    target: Target<R, C>,
}

impl<C, E, F, R> ErasedTransition<C, E> for ActionWrapper<F, R, C>
where
    C: Context,
    E: Event,
    R: Send + 'static,
    F: for<'b> Fn(&'b mut StateMachine<C, E>, Option<Payload>) -> BoxFuture<'b, Result<R, Fault>>
        + Send
        + Sync,
{
    fn execute<'a>(
        &'a self,
        machine: &'a mut StateMachine<C, E>,
        payload: Option<Payload>,
    ) -> BoxFuture<'a, Result<StateOf<C>, Fault>> {
        Box::pin(async move {
            let result = (self.action)(&mut *machine, payload).await?;
            Ok(self.target.resolve(result, machine.context()))
        })
    }

    fn fixed_target(&self) -> Option<&StateOf<C>> {
        self.target.fixed()
    }
}

/// Behavior for one `(state, event)` pair.
///
/// # Example
///
/// ```rust
/// use sagaflow::core::{Context, Fault, FaultClass};
/// use sagaflow::effects::{Compensation, StateMachine, TransitionSpec};
/// use sagaflow::{event_enum, state_enum};
///
/// state_enum! {
///     enum Mail { Pending, Sent, NotSent }
/// }
/// event_enum! {
///     enum MailEvent { Send }
/// }
///
/// struct Outbox {
///     state: Option<Mail>,
///     sent: bool,
/// }
///
/// impl Context for Outbox {
///     type State = Mail;
///     fn state(&self) -> Option<&Mail> { self.state.as_ref() }
///     fn set_state(&mut self, state: Mail) { self.state = Some(state); }
/// }
///
/// type Machine = StateMachine<Outbox, MailEvent>;
///
/// let spec = TransitionSpec::to(Mail::Sent, |_fsm: &mut Machine, _payload| {
///     Box::pin(async move { Err(Fault::fatal("EmailUnavailable", "smtp down")) })
/// })
/// .catch(Compensation::new(
///     FaultClass::tag("EmailUnavailable"),
///     Mail::NotSent,
///     |fsm: &mut Machine, _payload| {
///         Box::pin(async move {
///             fsm.context_mut().sent = false;
///             Ok(())
///         })
///     },
/// ));
///
/// assert_eq!(spec.fixed_target(), Some(&Mail::Sent));
/// assert_eq!(spec.compensations().len(), 1);
/// ```
pub struct TransitionSpec<C: Context, E: Event> {
    pub(crate) run: Arc<dyn ErasedTransition<C, E>>,
    pub(crate) catch: Vec<Compensation<C, E>>,
}

impl<C: Context, E: Event> TransitionSpec<C, E> {
    /// Transition with an explicit target rule.
    pub fn new<R, F>(target: Target<R, C>, action: F) -> Self
    where
        R: Send + 'static,
        F: for<'a> Fn(&'a mut StateMachine<C, E>, Option<Payload>) -> BoxFuture<'a, Result<R, Fault>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            run: Arc::new(ActionWrapper { action, target }),
            catch: Vec::new(),
        }
    }

    /// Transition to a fixed state.
    pub fn to<F>(target: StateOf<C>, action: F) -> Self
    where
        F: for<'a> Fn(&'a mut StateMachine<C, E>, Option<Payload>) -> BoxFuture<'a, Result<(), Fault>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(Target::State(target), action)
    }

    /// Transition whose target is computed from the action's result.
    pub fn resolve<R, F, T>(resolver: T, action: F) -> Self
    where
        R: Send + 'static,
        F: for<'a> Fn(&'a mut StateMachine<C, E>, Option<Payload>) -> BoxFuture<'a, Result<R, Fault>>
            + Send
            + Sync
            + 'static,
        T: Fn(R, &C) -> StateOf<C> + Send + Sync + 'static,
    {
        Self::new(Target::resolve_with(resolver), action)
    }

    /// Transition to a fixed state without running any action.
    pub fn direct(target: StateOf<C>) -> Self {
        Self::to(target, |_machine: &mut StateMachine<C, E>, _payload| {
            Box::pin(async { Ok(()) })
        })
    }

    /// Append a compensation. Compensations are matched in the order added.
    pub fn catch(mut self, compensation: Compensation<C, E>) -> Self {
        self.catch.push(compensation);
        self
    }

    pub fn compensations(&self) -> &[Compensation<C, E>] {
        &self.catch
    }

    /// The literal target, when the target is not computed.
    pub fn fixed_target(&self) -> Option<&StateOf<C>> {
        self.run.fixed_target()
    }
}

impl<C: Context, E: Event> Clone for TransitionSpec<C, E> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
            catch: self.catch.clone(),
        }
    }
}

impl<C: Context, E: Event> fmt::Debug for TransitionSpec<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionSpec")
            .field("fixed_target", &self.fixed_target())
            .field("catch", &self.catch)
            .finish()
    }
}

/// Fault-triggered alternate transition.
///
/// Runs when the transition it is attached to raises a fault matching its
/// class (and guard, when one is set), then moves the machine to `target`.
pub struct Compensation<C: Context, E: Event> {
    pub(crate) class: FaultClass,
    pub(crate) guard: Option<Guard<C>>,
    pub(crate) target: StateOf<C>,
    pub(crate) action: CompensationAction<C, E>,
}

impl<C: Context, E: Event> Compensation<C, E> {
    pub fn new<F>(class: FaultClass, target: StateOf<C>, action: F) -> Self
    where
        F: for<'a> Fn(&'a mut StateMachine<C, E>, Option<Payload>) -> BoxFuture<'a, Result<(), Fault>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            class,
            guard: None,
            target,
            action: Arc::new(action),
        }
    }

    /// Only match when `predicate` also holds.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Fault, &C) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    pub fn matches(&self, fault: &Fault, context: &C) -> bool {
        self.class.matches(fault) && self.guard.as_ref().is_none_or(|g| g.check(fault, context))
    }

    pub fn class(&self) -> &FaultClass {
        &self.class
    }

    pub fn target(&self) -> &StateOf<C> {
        &self.target
    }

    pub fn is_guarded(&self) -> bool {
        self.guard.is_some()
    }
}

impl<C: Context, E: Event> Clone for Compensation<C, E> {
    fn clone(&self) -> Self {
        Self {
            class: self.class.clone(),
            guard: self.guard.clone(),
            target: self.target.clone(),
            action: Arc::clone(&self.action),
        }
    }
}

impl<C: Context, E: Event> fmt::Debug for Compensation<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compensation")
            .field("class", &self.class)
            .field("guarded", &self.guard.is_some())
            .field("target", &self.target)
            .finish()
    }
}

/// The static configuration a machine executes.
///
/// A sparse partial function from `(state, event)` to [`TransitionSpec`].
/// Pairs that are absent are no-ops, not errors.
pub struct Descriptor<C: Context, E: Event> {
    pub(crate) initial_state: StateOf<C>,
    pub(crate) before_transition: Option<TransitionHook<C, E>>,
    pub(crate) after_transition: Option<TransitionHook<C, E>>,
    pub(crate) retry: Option<RetryHandler<C, E>>,
    pub(crate) states: HashMap<StateOf<C>, HashMap<E, TransitionSpec<C, E>>>,
}

impl<C: Context, E: Event> Descriptor<C, E> {
    pub fn new(initial_state: StateOf<C>) -> Self {
        Self {
            initial_state,
            before_transition: None,
            after_transition: None,
            retry: None,
            states: HashMap::new(),
        }
    }

    /// Declare a state, even one without outgoing transitions.
    pub fn state(mut self, state: StateOf<C>) -> Self {
        self.states.entry(state).or_default();
        self
    }

    /// Add (or replace) the transition for `(state, event)`.
    pub fn on(mut self, state: StateOf<C>, event: E, spec: TransitionSpec<C, E>) -> Self {
        self.insert(state, event, spec);
        self
    }

    pub(crate) fn insert(&mut self, state: StateOf<C>, event: E, spec: TransitionSpec<C, E>) {
        self.states.entry(state).or_default().insert(event, spec);
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

    /// Use an already shared retry handler, such as one built from a
    /// [`RetryPolicy`](crate::effects::RetryPolicy).
    pub fn retry_handler(mut self, handler: RetryHandler<C, E>) -> Self {
        self.retry = Some(handler);
        self
    }

    pub fn initial_state(&self) -> &StateOf<C> {
        &self.initial_state
    }

    pub fn has_state(&self, state: &StateOf<C>) -> bool {
        self.states.contains_key(state)
    }

    pub fn transition(&self, state: &StateOf<C>, event: &E) -> Option<&TransitionSpec<C, E>> {
        self.states.get(state)?.get(event)
    }

    /// Events with a transition out of `state`.
    pub fn events(&self, state: &StateOf<C>) -> Vec<&E> {
        self.states
            .get(state)
            .map(|events| events.keys().collect())
            .unwrap_or_default()
    }

    pub fn has_retry(&self) -> bool {
        self.retry.is_some()
    }
}

impl<C: Context, E: Event> fmt::Debug for Descriptor<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("initial_state", &self.initial_state)
            .field("states", &self.states)
            .field("before_transition", &self.before_transition.is_some())
            .field("after_transition", &self.after_transition.is_some())
            .field("retry", &self.retry.is_some())
            .finish()
    }
}
