//! Property-based tests for the queue, snapshots and the drain loop.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use chrono::Utc;
use proptest::prelude::*;
use sagaflow::core::{
    Action, ActionQueue, Context, Fault, Guard, State, StateHistory, StateTransition,
    TransitionKind,
};
use sagaflow::effects::{Descriptor, Outcome, StateMachine, TransitionSpec};
use sagaflow::{event_enum, state_enum};
use serde::{Deserialize, Serialize};

state_enum! {
    enum TestState {
        Initial,
        Processing,
        Complete,
        Failed,
    }
    final: [Complete, Failed]
    error: [Failed]
}

event_enum! {
    enum TestEvent {
        Advance,
        Pause,
        Cancel,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Counter {
    state: Option<TestState>,
    value: i64,
}

impl Context for Counter {
    type State = TestState;

    fn state(&self) -> Option<&TestState> {
        self.state.as_ref()
    }

    fn set_state(&mut self, state: TestState) {
        self.state = Some(state);
    }
}

type Machine = StateMachine<Counter, TestEvent>;

prop_compose! {
    fn arbitrary_state()(variant in 0..4u8) -> TestState {
        match variant {
            0 => TestState::Initial,
            1 => TestState::Processing,
            2 => TestState::Complete,
            _ => TestState::Failed,
        }
    }
}

prop_compose! {
    fn arbitrary_event()(variant in 0..3u8) -> TestEvent {
        match variant {
            0 => TestEvent::Advance,
            1 => TestEvent::Pause,
            _ => TestEvent::Cancel,
        }
    }
}

fn next(state: &TestState) -> TestState {
    match state {
        TestState::Initial => TestState::Processing,
        TestState::Processing => TestState::Complete,
        TestState::Complete => TestState::Failed,
        TestState::Failed => TestState::Initial,
    }
}

/// Every state advances to the next one on `Advance`, counting as it goes.
fn ring() -> Descriptor<Counter, TestEvent> {
    let states = [
        TestState::Initial,
        TestState::Processing,
        TestState::Complete,
        TestState::Failed,
    ];

    states.iter().fold(Descriptor::new(TestState::Initial), |descriptor, state| {
        let advance = TransitionSpec::to(next(state), |fsm: &mut Machine, _payload| {
            Box::pin(async move {
                fsm.context_mut().value += 1;
                Ok(())
            })
        });
        descriptor.on(state.clone(), TestEvent::Advance, advance)
    })
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn queue_preserves_fifo_order(events in prop::collection::vec(arbitrary_event(), 0..20)) {
        let mut queue = ActionQueue::new();
        for event in &events {
            queue.enqueue(Action::new(event.clone()));
        }

        let mut drained = Vec::new();
        while let Some(action) = queue.dequeue() {
            drained.push(action.event);
        }

        prop_assert_eq!(drained, events);
        prop_assert!(queue.is_empty());
    }

    #[test]
    fn restored_queue_is_independent_of_source(
        events in prop::collection::vec(arbitrary_event(), 1..10)
    ) {
        let source: Vec<_> = events.iter().cloned().map(Action::new).collect();
        let mut queue = ActionQueue::new();
        queue.restore_elements(&source);

        queue.dequeue();
        prop_assert_eq!(queue.len(), source.len() - 1);
        prop_assert_eq!(queue.snapshot_elements(), source[1..].to_vec());
    }

    #[test]
    fn snapshot_round_trip_is_identity(
        value in any::<i64>(),
        state in arbitrary_state(),
        events in prop::collection::vec(arbitrary_event(), 0..10)
    ) {
        let context = Counter { state: Some(state), value };
        let mut machine = Machine::new(ring(), context.clone());
        for event in &events {
            machine.enqueue(event.clone());
        }

        let before = machine.snapshot();
        machine.load_snapshot(before.clone());

        prop_assert_eq!(machine.snapshot(), before);
        prop_assert_eq!(machine.context(), &context);
        prop_assert_eq!(machine.queue_len(), events.len());
    }

    #[test]
    fn undefined_events_leave_state_unchanged(
        state in arbitrary_state(),
        events in prop::collection::vec(prop_oneof![Just(TestEvent::Pause), Just(TestEvent::Cancel)], 1..10)
    ) {
        let mut machine = Machine::new(ring(), Counter { state: Some(state.clone()), value: 0 });

        for event in &events {
            let report = block_on(machine.dispatch(event.clone())).unwrap();
            prop_assert_eq!(
                &report.records()[0].outcome,
                &Outcome::Skipped { state: Some(state.clone()) }
            );
        }

        prop_assert_eq!(machine.current_state(), Some(&state));
        prop_assert_eq!(machine.context().value, 0);
        prop_assert!(machine.history().transitions().is_empty());
    }

    #[test]
    fn history_path_follows_dispatch_order(steps in 1usize..12) {
        let mut machine = Machine::new(ring(), Counter::default());
        for _ in 0..steps {
            machine.enqueue(TestEvent::Advance);
        }

        let report = block_on(machine.resume()).unwrap();

        let mut expected = vec![TestState::Initial];
        for _ in 0..steps {
            let last = expected[expected.len() - 1].clone();
            expected.push(next(&last));
        }

        let path: Vec<TestState> = machine.history().get_path().into_iter().cloned().collect();
        prop_assert_eq!(report.len(), steps);
        prop_assert_eq!(machine.context().value, steps as i64);
        prop_assert_eq!(machine.current_state(), expected.last());
        prop_assert_eq!(path, expected);
    }

    #[test]
    fn guard_is_deterministic(state in arbitrary_state(), value in any::<i64>()) {
        let guard = Guard::new(|fault: &Fault, ctx: &Counter| fault.is_retryable() && ctx.value > 0);
        let context = Counter { state: Some(state), value };
        let fault = Fault::retryable("Net", "timeout");

        let result1 = guard.check(&fault, &context);
        let result2 = guard.check(&fault, &context);
        prop_assert_eq!(result1, result2);
        prop_assert_eq!(result1, value > 0);
    }

    #[test]
    fn state_name_is_stable(state in arbitrary_state()) {
        let name1 = state.name();
        let name2 = state.name();
        prop_assert_eq!(name1, name2);
    }

    #[test]
    fn history_record_is_pure(state1 in arbitrary_state(), state2 in arbitrary_state()) {
        let history = StateHistory::new();

        let transition = StateTransition {
            from: state1,
            to: state2,
            event: "Advance".to_string(),
            kind: TransitionKind::Action,
            timestamp: Utc::now(),
            attempt: 1,
        };

        let new_history = history.record(transition);

        // Original history unchanged
        prop_assert_eq!(history.transitions().len(), 0);
        prop_assert_eq!(new_history.transitions().len(), 1);
    }
}
