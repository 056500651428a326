//! A processing step that fails twice before succeeding, retried by a
//! `RetryPolicy`, and the same step giving up when it never recovers.
//!
//! Run with `RUST_LOG=debug cargo run --example retry` to see every attempt.

use sagaflow::core::{Context, Fault};
use sagaflow::effects::{Descriptor, RetryPolicy, StateMachine, TransitionSpec};
use sagaflow::{event_enum, state_enum};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

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

struct Job {
    state: Option<RetryState>,
    attempts: u32,
    succeeds_on: Option<u32>,
}

impl Context for Job {
    type State = RetryState;

    fn state(&self) -> Option<&RetryState> {
        self.state.as_ref()
    }

    fn set_state(&mut self, state: RetryState) {
        self.state = Some(state);
    }
}

type Machine = StateMachine<Job, RetryEvent>;

fn descriptor() -> Descriptor<Job, RetryEvent> {
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(1),
    };

    let process = TransitionSpec::to(RetryState::Success, |fsm: &mut Machine, _payload| {
        Box::pin(async move {
            let job = fsm.context_mut();
            job.attempts += 1;
            info!(attempt = job.attempts, "processing");

            match job.succeeds_on {
                Some(n) if job.attempts >= n => Ok(()),
                _ => Err(Fault::retryable(
                    "ProcessingFailed",
                    format!("simulated failure on attempt {}", job.attempts),
                )),
            }
        })
    });

    let give_up = TransitionSpec::to(RetryState::Failed, |fsm: &mut Machine, _payload| {
        Box::pin(async move {
            info!(attempts = fsm.context().attempts, "giving up");
            Ok(())
        })
    });

    Descriptor::new(RetryState::Start)
        .retry_handler(policy.handler(|job: &Job| job.attempts, RetryEvent::GiveUp))
        .on(RetryState::Start, RetryEvent::Process, process)
        .on(RetryState::Start, RetryEvent::GiveUp, give_up)
}

async fn run(label: &str, succeeds_on: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let job = Job {
        state: None,
        attempts: 0,
        succeeds_on,
    };
    let mut machine = Machine::new(descriptor(), job);

    let report = machine.dispatch(RetryEvent::Process).await?;

    info!(
        scenario = label,
        state = ?machine.current_state(),
        attempts = machine.context().attempts,
        actions = report.len(),
        "scenario finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    run("success", Some(3)).await?;
    run("failure", None).await?;
    Ok(())
}
