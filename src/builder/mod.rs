//! Builder API for saga-shaped descriptors.
//!
//! A saga is an ordered list of steps, each a `(from, event) -> to`
//! transition plus the compensations that undo or redirect it when it fails.
//! [`SagaBuilder`] compiles the steps into a [`Descriptor`](crate::effects::Descriptor);
//! the macros declare the state and event alphabets with minimal boilerplate.

pub mod error;
pub mod macros;
pub mod saga;
pub mod step;

pub use error::{BuildError, StepViolation};
pub use saga::SagaBuilder;
pub use step::SagaStep;
