//! Guard predicates that narrow when a compensation applies.
//!
//! A compensation is selected by its [`FaultClass`](super::FaultClass); a
//! guard adds a pure condition over the fault and the workflow context.

use super::fault::Fault;
use std::fmt;
use std::sync::Arc;

/// Pure predicate over a fault and the context it was raised in.
///
/// Guards are evaluated during compensation matching. They must be
/// deterministic and free of side effects; matching may evaluate them for
/// compensations that end up not being selected.
///
/// # Example
///
/// ```rust
/// use sagaflow::core::{Fault, Guard};
///
/// struct Booking {
///     seats_held: u32,
/// }
///
/// let holds_seats = Guard::new(|_fault: &Fault, booking: &Booking| booking.seats_held > 0);
/// let fault = Fault::fatal("PaymentFailed", "card declined");
///
/// assert!(holds_seats.check(&fault, &Booking { seats_held: 2 }));
/// assert!(!holds_seats.check(&fault, &Booking { seats_held: 0 }));
/// ```
pub struct Guard<C> {
    predicate: Arc<dyn Fn(&Fault, &C) -> bool + Send + Sync>,
}

impl<C> Guard<C> {
    /// Create a guard from a pure predicate function.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Fault, &C) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Check whether the guard allows the compensation to run.
    pub fn check(&self, fault: &Fault, context: &C) -> bool {
        (self.predicate)(fault, context)
    }
}

impl<C> Clone for Guard<C> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<C> fmt::Debug for Guard<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}
