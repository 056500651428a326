//! Retry delegation: a flaky step is re-dispatched until it succeeds or the
//! attempts run out.

use sagaflow::core::{Action, Context, Fault, FaultClass};
use sagaflow::effects::{
    Compensation, Descriptor, FailureStage, Outcome, RetryPolicy, StateMachine, TransitionSpec,
};
use sagaflow::{event_enum, state_enum};
use std::time::Duration;

state_enum! {
    enum RetryState {
        Start,
        Success,
        Failed,
    }
    final: [Success, Failed]
    error: [Failed]
}

event_enum! {
    enum RetryEvent {
        Process,
        GiveUp,
    }
}

#[derive(Debug)]
struct RetryContext {
    state: Option<RetryState>,
    process_attempts: u32,
    max_attempts: u32,
    fail_until: u32,
    log: Vec<String>,
}

impl RetryContext {
    fn new(max_attempts: u32, fail_until: u32) -> Self {
        Self {
            state: None,
            process_attempts: 0,
            max_attempts,
            fail_until,
            log: Vec::new(),
        }
    }
}

impl Context for RetryContext {
    type State = RetryState;

    fn state(&self) -> Option<&RetryState> {
        self.state.as_ref()
    }

    fn set_state(&mut self, state: RetryState) {
        self.state = Some(state);
    }
}

type Machine = StateMachine<RetryContext, RetryEvent>;

fn process() -> TransitionSpec<RetryContext, RetryEvent> {
    TransitionSpec::to(RetryState::Success, |fsm: &mut Machine, _payload| {
        Box::pin(async move {
            let ctx = fsm.context_mut();
            ctx.process_attempts += 1;
            if ctx.process_attempts <= ctx.fail_until {
                return Err(Fault::retryable(
                    "ProcessingFailed",
                    format!("simulated failure on attempt {}", ctx.process_attempts),
                ));
            }
            Ok(())
        })
    })
}

fn give_up() -> TransitionSpec<RetryContext, RetryEvent> {
    TransitionSpec::to(RetryState::Failed, |fsm: &mut Machine, _payload| {
        Box::pin(async move {
            fsm.context_mut().log.push("gave up".to_string());
            Ok(())
        })
    })
}

/// Retry handler written against the context, without a policy.
fn manual_descriptor() -> Descriptor<RetryContext, RetryEvent> {
    Descriptor::new(RetryState::Start)
        .retry(|fsm: &mut Machine, action: &Action<RetryEvent>, fault: &Fault| {
            Box::pin(async move {
                let entry = format!("retry after: {}", fault.message());
                fsm.context_mut().log.push(entry);

                let ctx = fsm.context();
                if ctx.process_attempts < ctx.max_attempts {
                    fsm.dispatch(action.clone()).await?;
                } else {
                    fsm.dispatch(RetryEvent::GiveUp).await?;
                }
                Ok(())
            })
        })
        .on(RetryState::Start, RetryEvent::Process, process())
        .on(RetryState::Start, RetryEvent::GiveUp, give_up())
        .state(RetryState::Success)
        .state(RetryState::Failed)
}

#[tokio::test]
async fn retry_succeeds_on_last_attempt() {
    let mut machine = Machine::new(manual_descriptor(), RetryContext::new(3, 2));

    let report = machine.dispatch(RetryEvent::Process).await.unwrap();

    assert_eq!(machine.current_state(), Some(&RetryState::Success));
    assert_eq!(machine.context().process_attempts, 3);
    assert_eq!(report.len(), 3);
    assert!(matches!(
        report.records()[0].outcome,
        Outcome::RetryDelegated { .. }
    ));
    assert!(matches!(
        report.records()[2].outcome,
        Outcome::Transitioned {
            to: RetryState::Success,
            ..
        }
    ));
}

#[tokio::test]
async fn retry_gives_up_after_max_attempts() {
    let mut machine = Machine::new(manual_descriptor(), RetryContext::new(3, u32::MAX));

    let report = machine.dispatch(RetryEvent::Process).await.unwrap();

    assert_eq!(machine.current_state(), Some(&RetryState::Failed));
    assert_eq!(machine.context().process_attempts, 3);
    assert_eq!(
        report.events(),
        vec![
            &RetryEvent::Process,
            &RetryEvent::Process,
            &RetryEvent::Process,
            &RetryEvent::GiveUp,
        ]
    );
    assert_eq!(machine.context().log.last().map(String::as_str), Some("gave up"));
}

#[tokio::test]
async fn dispatch_returns_only_after_retries_settle() {
    let mut machine = Machine::new(manual_descriptor(), RetryContext::new(2, u32::MAX));

    machine.dispatch(RetryEvent::Process).await.unwrap();

    assert_eq!(machine.queue_len(), 0);
    assert!(!machine.is_draining());
    assert!(machine.is_final());
}

#[tokio::test]
async fn history_attempt_counts_repeated_executions() {
    let mut machine = Machine::new(manual_descriptor(), RetryContext::new(5, 3));

    machine.dispatch(RetryEvent::Process).await.unwrap();

    let last = machine.history().last().unwrap();
    assert_eq!(last.to, RetryState::Success);
    assert_eq!(last.attempt, 4);
}

#[tokio::test]
async fn policy_handler_drives_same_scenario() {
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    };
    let descriptor = Descriptor::new(RetryState::Start)
        .retry_handler(policy.handler(|ctx: &RetryContext| ctx.process_attempts, RetryEvent::GiveUp))
        .on(RetryState::Start, RetryEvent::Process, process())
        .on(RetryState::Start, RetryEvent::GiveUp, give_up());

    let mut success = Machine::new(descriptor, RetryContext::new(3, 2));
    success.dispatch(RetryEvent::Process).await.unwrap();
    assert_eq!(success.current_state(), Some(&RetryState::Success));
    assert_eq!(success.context().process_attempts, 3);
}

#[tokio::test]
async fn compensation_takes_precedence_over_retry() {
    let spec = process().catch(Compensation::new(
        FaultClass::tag("ProcessingFailed"),
        RetryState::Failed,
        |fsm: &mut Machine, _payload| {
            Box::pin(async move {
                fsm.context_mut().log.push("compensated".to_string());
                Ok(())
            })
        },
    ));
    let descriptor = manual_descriptor().on(RetryState::Start, RetryEvent::Process, spec);
    let mut machine = Machine::new(descriptor, RetryContext::new(3, u32::MAX));

    let report = machine.dispatch(RetryEvent::Process).await.unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(machine.context().process_attempts, 1);
    assert_eq!(machine.context().log, vec!["compensated"]);
    assert_eq!(machine.current_state(), Some(&RetryState::Failed));
}

#[tokio::test]
async fn failing_retry_handler_is_surfaced() {
    let descriptor = Descriptor::new(RetryState::Start)
        .retry(|_fsm: &mut Machine, _action: &Action<RetryEvent>, _fault: &Fault| {
            Box::pin(async move { Err(Fault::fatal("RetryBroken", "no backend")) })
        })
        .on(RetryState::Start, RetryEvent::Process, process());
    let mut machine = Machine::new(descriptor, RetryContext::new(3, u32::MAX));

    let error = machine.dispatch(RetryEvent::Process).await.unwrap_err();

    assert_eq!(error.fault().tag(), "RetryBroken");
    assert_eq!(error.report().len(), 1);
    assert!(matches!(
        error,
        sagaflow::MachineError::Unrecoverable {
            stage: FailureStage::Retry,
            ..
        }
    ));
}

#[tokio::test]
async fn timed_out_backoff_leaves_machine_usable() {
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(10),
        max_delay: Duration::from_secs(10),
    };
    let descriptor = Descriptor::new(RetryState::Start)
        .retry_handler(policy.handler(|ctx: &RetryContext| ctx.process_attempts, RetryEvent::GiveUp))
        .on(RetryState::Start, RetryEvent::Process, process())
        .on(RetryState::Start, RetryEvent::GiveUp, give_up());
    let mut machine = Machine::new(descriptor, RetryContext::new(3, u32::MAX));

    let timed_out = tokio::time::timeout(
        Duration::from_millis(20),
        machine.dispatch(RetryEvent::Process),
    )
    .await;

    assert!(timed_out.is_err());
    assert!(!machine.is_draining());
    assert_eq!(machine.pending(), vec![Action::new(RetryEvent::Process)]);

    let report = machine.abort(RetryEvent::GiveUp).await.unwrap();

    assert!(!report.is_deferred());
    assert_eq!(report.events(), vec![&RetryEvent::GiveUp]);
    assert_eq!(machine.current_state(), Some(&RetryState::Failed));
    assert_eq!(machine.context().process_attempts, 1);
}
