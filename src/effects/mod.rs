//! The engine: descriptors, the draining state machine and retry policies.
//!
//! Everything that runs user code lives here. Callbacks are async and receive
//! the machine itself, so they can read and change the context and dispatch
//! follow-up actions.
//!
//! # Key Concepts
//!
//! - **Descriptor**: The static `(state, event) -> TransitionSpec` table plus hooks and retry handler
//! - **State Machine**: Owns a context and a FIFO queue and drains it one action at a time
//! - **Reports**: Every drain returns what happened to each action it executed

mod descriptor;
mod error;
mod machine;
mod report;
mod retry;

pub use descriptor::{
    BoxFuture, Compensation, CompensationAction, Descriptor, RetryHandler, Target,
    TransitionHook, TransitionSpec,
};
pub use error::MachineError;
pub use machine::{DispatchResult, Snapshot, StateMachine};
pub use report::{ActionRecord, DrainReport, FailureStage, Outcome};
pub use retry::RetryPolicy;
