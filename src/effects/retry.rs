//! Retry policy for transitions that fail with retryable faults.

use crate::core::{Action, Context, Event, Fault};
use crate::effects::descriptor::{BoxFuture, RetryHandler};
use crate::effects::machine::StateMachine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded exponential backoff that re-dispatches the failed action.
///
/// The delay after failed attempt N is `min(base_delay * 2^(N-1), max_delay)`.
///
/// With defaults (base=100ms, max=5s):
/// - Attempt 1 fails: 100ms delay
/// - Attempt 2 fails: 200ms delay
/// - Attempt 3 fails: give up
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use sagaflow::effects::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 3);
/// assert!(policy.should_retry(2));
/// assert!(!policy.should_retry(3));
///
/// let eager = RetryPolicy {
///     max_attempts: 5,
///     base_delay: Duration::ZERO,
///     max_delay: Duration::ZERO,
/// };
/// assert_eq!(eager.delay_for_attempt(4), Duration::ZERO);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts allowed in total, the first one included.
    pub max_attempts: u32,

    /// Delay after the first failed attempt. Doubles with each retry.
    pub base_delay: Duration,

    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `attempt` (1-based) failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }

    /// Returns `true` if another attempt should follow the failed `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Build a retry handler driven by this policy.
    ///
    /// `attempts` reads how many times the failing action has run so far from
    /// the context. While that is below `max_attempts` the handler waits out
    /// the backoff and dispatches the failed action again; after that it
    /// dispatches `give_up` instead.
    pub fn handler<C, E, F>(&self, attempts: F, give_up: E) -> RetryHandler<C, E>
    where
        C: Context,
        E: Event,
        F: Fn(&C) -> u32 + Send + Sync + 'static,
    {
        let policy = self.clone();
        erase(
            move |machine: &mut StateMachine<C, E>, action: &Action<E>, fault: &Fault| {
                let attempt = attempts(machine.context());
                let (next, delay) = if policy.should_retry(attempt) {
                    let delay = policy.delay_for_attempt(attempt);
                    debug!(
                        event = %action.event.name(),
                        attempt,
                        max_attempts = policy.max_attempts,
                        ?delay,
                        "retrying action"
                    );
                    (action.clone(), delay)
                } else {
                    warn!(
                        event = %action.event.name(),
                        attempt,
                        fault = %fault,
                        give_up = %give_up.name(),
                        "retry attempts exhausted"
                    );
                    (Action::new(give_up.clone()), Duration::ZERO)
                };

                Box::pin(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    machine.dispatch(next).await?;
                    Ok(())
                })
            },
        )
    }
}

fn erase<C, E, F>(handler: F) -> RetryHandler<C, E>
where
    C: Context,
    E: Event,
    F: for<'a> Fn(&'a mut StateMachine<C, E>, &'a Action<E>, &'a Fault) -> BoxFuture<'a, Result<(), Fault>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(handler)
}
