//! Checkpoint and resume functionality for state machines.
//!
//! A checkpoint is the durable form of a [`Snapshot`](crate::effects::Snapshot):
//! the context, the queued actions and the transition history, stamped with a
//! format version. It lets a long-running workflow survive a process restart;
//! the descriptor (which holds code, not data) is supplied again on restore.

use crate::core::{Action, Context, Event, StateHistory};
use crate::effects::{Descriptor, StateMachine};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable checkpoint of a machine's context, queue and history.
/// Does NOT include the descriptor (not serializable).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "C: Serialize", deserialize = "C: DeserializeOwned"))]
pub struct Checkpoint<C: Context, E: Event> {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: Uuid,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    /// The machine's context, current state included
    pub context: C,

    /// Queued actions in execution order
    pub queue: Vec<Action<E>>,

    /// Complete transition history
    pub history: StateHistory<C::State>,
}

impl<C, E> Checkpoint<C, E>
where
    C: Context + Serialize + DeserializeOwned,
    E: Event,
{
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Compact binary encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CheckpointError> {
        bincode::serialize(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let checkpoint: Self = bincode::deserialize(bytes)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }
}

impl<C: Context, E: Event> Checkpoint<C, E> {
    /// Check the format version and that the context has a state.
    pub fn validate(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            });
        }

        if self.context.state().is_none() {
            return Err(CheckpointError::MissingState);
        }

        Ok(())
    }
}

impl<C: Context + Clone, E: Event> StateMachine<C, E> {
    /// Capture a checkpoint of the context, queue and history.
    ///
    /// Taken while an action is executing, the queue still holds that action
    /// at its head, so restoring the checkpoint runs it again.
    pub fn checkpoint(&self) -> Checkpoint<C, E> {
        let checkpoint = Checkpoint {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            context: self.context().clone(),
            queue: self.pending(),
            history: self.history().clone(),
        };
        debug!(
            id = %checkpoint.id,
            queued = checkpoint.queue.len(),
            transitions = checkpoint.history.transitions().len(),
            "checkpoint captured"
        );
        checkpoint
    }
}

impl<C: Context, E: Event> StateMachine<C, E> {
    /// Replace the context, queue and history with a checkpoint's.
    ///
    /// The restored queue is not drained; call
    /// [`resume`](StateMachine::resume) to run it.
    pub fn restore_checkpoint(&mut self, checkpoint: Checkpoint<C, E>) -> Result<(), CheckpointError> {
        checkpoint.validate()?;
        debug!(
            id = %checkpoint.id,
            queued = checkpoint.queue.len(),
            "checkpoint restored"
        );
        let Checkpoint {
            context,
            queue,
            history,
            ..
        } = checkpoint;
        self.set_context(context);
        self.restore_backlog(&queue, history);
        Ok(())
    }

    /// Rebuild a machine from a checkpoint and the descriptor it ran with.
    pub fn from_checkpoint(
        descriptor: impl Into<Arc<Descriptor<C, E>>>,
        checkpoint: Checkpoint<C, E>,
    ) -> Result<Self, CheckpointError> {
        checkpoint.validate()?;
        let Checkpoint {
            context,
            queue,
            history,
            ..
        } = checkpoint;
        let mut machine = Self::new(descriptor, context);
        machine.restore_backlog(&queue, history);
        Ok(machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Payload;
    use crate::effects::TransitionSpec;
    use crate::{event_enum, state_enum};

    state_enum! {
        enum Order { Placed, Paid, Shipped }
        final: [Shipped]
    }

    event_enum! {
        enum OrderEvent { Pay, Ship }
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct OrderContext {
        state: Option<Order>,
        amount: u64,
    }

    impl Context for OrderContext {
        type State = Order;

        fn state(&self) -> Option<&Order> {
            self.state.as_ref()
        }

        fn set_state(&mut self, state: Order) {
            self.state = Some(state);
        }
    }

    type Machine = StateMachine<OrderContext, OrderEvent>;

    fn descriptor() -> Arc<Descriptor<OrderContext, OrderEvent>> {
        let pay = TransitionSpec::to(Order::Paid, |fsm: &mut Machine, payload: Option<Payload>| {
            Box::pin(async move {
                let amount = payload.and_then(|p| p.decode::<u64>().ok()).unwrap_or_default();
                fsm.context_mut().amount += amount;
                Ok(())
            })
        });

        Arc::new(
            Descriptor::new(Order::Placed)
                .on(Order::Placed, OrderEvent::Pay, pay)
                .on(Order::Paid, OrderEvent::Ship, TransitionSpec::direct(Order::Shipped)),
        )
    }

    async fn paid_machine() -> Machine {
        let mut machine = Machine::new(descriptor(), OrderContext::default());
        machine
            .dispatch(Action::with_payload(OrderEvent::Pay, serde_json::json!(250)))
            .await
            .unwrap();
        machine.enqueue(OrderEvent::Ship);
        machine
    }

    #[tokio::test]
    async fn json_round_trip_resumes_queue() {
        let machine = paid_machine().await;
        let json = machine.checkpoint().to_json().unwrap();

        let checkpoint = Checkpoint::<OrderContext, OrderEvent>::from_json(&json).unwrap();
        let mut restored = Machine::from_checkpoint(descriptor(), checkpoint).unwrap();

        assert_eq!(restored.context().amount, 250);
        assert_eq!(restored.queue_len(), 1);
        assert_eq!(restored.history().transitions().len(), 1);

        restored.resume().await.unwrap();
        assert_eq!(restored.current_state(), Some(&Order::Shipped));
        assert_eq!(
            restored.history().get_path(),
            vec![&Order::Placed, &Order::Paid, &Order::Shipped]
        );
    }

    #[tokio::test]
    async fn binary_round_trip_preserves_payloads() {
        let mut machine = Machine::new(descriptor(), OrderContext::default());
        machine.enqueue(Action::with_payload(OrderEvent::Pay, serde_json::json!(99)));

        let bytes = machine.checkpoint().to_bytes().unwrap();
        let checkpoint = Checkpoint::<OrderContext, OrderEvent>::from_bytes(&bytes).unwrap();

        assert_eq!(checkpoint.queue, machine.pending());

        let mut restored = Machine::new(descriptor(), OrderContext::default());
        restored.restore_checkpoint(checkpoint).unwrap();
        restored.resume().await.unwrap();
        assert_eq!(restored.context().amount, 99);
    }

    #[tokio::test]
    async fn unsupported_version_is_rejected() {
        let machine = paid_machine().await;
        let mut checkpoint = machine.checkpoint();
        checkpoint.version = CHECKPOINT_VERSION + 1;

        let json = checkpoint.to_json().unwrap();
        let result = Checkpoint::<OrderContext, OrderEvent>::from_json(&json);

        assert!(matches!(
            result,
            Err(CheckpointError::UnsupportedVersion { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn context_without_state_is_rejected() {
        let checkpoint = Checkpoint::<OrderContext, OrderEvent> {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            context: OrderContext::default(),
            queue: Vec::new(),
            history: StateHistory::new(),
        };

        let mut machine = Machine::new(descriptor(), OrderContext::default());
        let result = machine.restore_checkpoint(checkpoint);

        assert!(matches!(result, Err(CheckpointError::MissingState)));
        assert_eq!(machine.current_state(), Some(&Order::Placed));
    }

    #[test]
    fn corrupt_bytes_fail_to_deserialize() {
        let result = Checkpoint::<OrderContext, OrderEvent>::from_bytes(&[1, 2, 3]);
        assert!(matches!(result, Err(CheckpointError::DeserializationFailed(_))));
    }
}
