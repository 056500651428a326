//! Sagaflow: an async finite state machine engine for saga workflows
//!
//! A machine owns a mutable context and a FIFO queue of actions. Each action
//! is looked up in a static descriptor by `(current state, event)`; the
//! matching transition runs its async action, assigns the next state and
//! fires the descriptor's hooks. Failures are handled by the transition's
//! compensations, first match wins, or handed to a retry handler.
//!
//! # Core Concepts
//!
//! - **State / Event / Context**: Caller-defined alphabets and the record the machine mutates
//! - **Descriptor**: Sparse `(state, event) -> TransitionSpec` table; absent pairs are no-ops
//! - **Dispatch**: Single-flight drain; dispatches made during a drain run afterwards, FIFO
//! - **Compensation**: Fault-triggered alternate transition
//! - **Snapshot / Checkpoint**: In-memory and durable copies of context and queue
//!
//! # Example
//!
//! ```rust
//! use sagaflow::builder::{SagaBuilder, SagaStep};
//! use sagaflow::core::{Context, Fault, FaultClass};
//! use sagaflow::effects::{Compensation, StateMachine};
//! use sagaflow::{event_enum, state_enum};
//!
//! state_enum! {
//!     enum Payment { Pending, Charged, Refunded }
//!     final: [Charged, Refunded]
//! }
//! event_enum! {
//!     enum PaymentEvent { Charge }
//! }
//!
//! #[derive(Default)]
//! struct Invoice {
//!     state: Option<Payment>,
//!     refunds: u32,
//! }
//!
//! impl Context for Invoice {
//!     type State = Payment;
//!     fn state(&self) -> Option<&Payment> { self.state.as_ref() }
//!     fn set_state(&mut self, state: Payment) { self.state = Some(state); }
//! }
//!
//! type Machine = StateMachine<Invoice, PaymentEvent>;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let descriptor = SagaBuilder::new(Payment::Pending)
//!     .step(
//!         SagaStep::to(Payment::Pending, PaymentEvent::Charge, Payment::Charged, |_fsm: &mut Machine, _| {
//!             Box::pin(async move { Err(Fault::fatal("CardDeclined", "insufficient funds")) })
//!         })
//!         .compensate(Compensation::new(
//!             FaultClass::tag("CardDeclined"),
//!             Payment::Refunded,
//!             |fsm: &mut Machine, _| {
//!                 Box::pin(async move {
//!                     fsm.context_mut().refunds += 1;
//!                     Ok(())
//!                 })
//!             },
//!         )),
//!     )
//!     .build();
//!
//! let mut machine = StateMachine::new(descriptor, Invoice::default());
//! machine.dispatch(PaymentEvent::Charge).await.unwrap();
//!
//! assert_eq!(machine.current_state(), Some(&Payment::Refunded));
//! assert_eq!(machine.context().refunds, 1);
//! # }
//! ```

pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod effects;

pub use builder::{BuildError, SagaBuilder, SagaStep};
pub use checkpoint::{Checkpoint, CheckpointError};
pub use crate::core::{Action, Context, Event, Fault, FaultClass, FaultKind, Payload, State};
pub use effects::{
    Compensation, Descriptor, DrainReport, MachineError, Outcome, RetryPolicy, Snapshot,
    StateMachine, TransitionSpec,
};
