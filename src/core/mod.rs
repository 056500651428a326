//! Core state machine types.
//!
//! This module contains the data the engine operates on:
//! - States, events and contexts via the `State`, `Event` and `Context` traits
//! - Actions and their payloads, and the FIFO `ActionQueue`
//! - Faults, fault classifiers and compensation guards
//! - Immutable history tracking
//!
//! Nothing in this module runs transitions; that lives in [`crate::effects`].

mod action;
mod fault;
mod guard;
mod history;
mod queue;
mod state;

pub use action::{Action, Payload};
pub use fault::{Fault, FaultClass, FaultKind};
pub use guard::Guard;
pub use history::{StateHistory, StateTransition, TransitionKind};
pub use queue::ActionQueue;
pub use state::{Context, Event, State};
