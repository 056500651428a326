//! Flight reservation saga with compensations, a follow-up transaction
//! dispatched from a compensation and a checkpoint taken mid-saga.
//!
//! Run with `RUST_LOG=debug cargo run --example flight_reservation`.

use sagaflow::builder::{SagaBuilder, SagaStep};
use sagaflow::core::{Action, Context, Event, Fault, FaultClass, Payload};
use sagaflow::effects::{Compensation, Descriptor, StateMachine};
use sagaflow::{event_enum, state_enum, Checkpoint};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

state_enum! {
    enum Reservation {
        Start,
        ReservationCreated,
        ReservationFailed,
        EmailNotSent,
        SeatReserved,
        PaymentFailed,
        ReservationConfirmed,
    }
    final: [ReservationFailed, ReservationConfirmed]
    error: [ReservationFailed]
}

event_enum! {
    enum ReservationEvent {
        CreateReservation,
        SendEmail,
        UpdateInventory,
        ProcessExtraPayment,
        AdditionalPayment,
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Booking {
    flight: String,
    date: String,
    destination: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Trip {
    state: Option<Reservation>,
    email_sent: bool,
    extra_payment_processed: bool,
    booking: Option<Booking>,
}

impl Context for Trip {
    type State = Reservation;

    fn state(&self) -> Option<&Reservation> {
        self.state.as_ref()
    }

    fn set_state(&mut self, state: Reservation) {
        self.state = Some(state);
    }
}

type Machine = StateMachine<Trip, ReservationEvent>;

fn saga() -> Descriptor<Trip, ReservationEvent> {
    SagaBuilder::new(Reservation::Start)
        .after_transition(|fsm: &mut Machine, action: &Action<ReservationEvent>| {
            Box::pin(async move {
                info!(event = %action.event.name(), state = ?fsm.current_state(), "step settled");
                Ok(())
            })
        })
        .step(SagaStep::resolve(
            Reservation::Start,
            ReservationEvent::CreateReservation,
            |created: bool, _trip: &Trip| {
                if created {
                    Reservation::ReservationCreated
                } else {
                    Reservation::ReservationFailed
                }
            },
            |fsm: &mut Machine, payload: Option<Payload>| {
                Box::pin(async move {
                    let booking: Option<Booking> = payload.and_then(|p| p.decode().ok());
                    info!(?booking, "T1: creating reservation");
                    let created = booking.is_some();
                    fsm.context_mut().booking = booking;
                    Ok(created)
                })
            },
        ))
        .step(
            SagaStep::to(
                Reservation::ReservationCreated,
                ReservationEvent::SendEmail,
                Reservation::SeatReserved,
                |_fsm: &mut Machine, _payload| {
                    Box::pin(async move {
                        info!("T2: sending confirmation email");
                        Err(Fault::retryable("EmailUnavailable", "email service not available"))
                    })
                },
            )
            .compensate(Compensation::new(
                FaultClass::tag("EmailUnavailable"),
                Reservation::EmailNotSent,
                |fsm: &mut Machine, _payload| {
                    Box::pin(async move {
                        info!("C2: email failed, continuing without it");
                        fsm.context_mut().email_sent = false;
                        Ok(())
                    })
                },
            )),
        )
        .step(SagaStep::to(
            Reservation::EmailNotSent,
            ReservationEvent::UpdateInventory,
            Reservation::SeatReserved,
            |fsm: &mut Machine, _payload| {
                Box::pin(async move {
                    info!("T3: updating seat inventory");
                    let snapshot = fsm.snapshot();
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                    fsm.load_snapshot(snapshot);
                    info!("T3: resumed from snapshot");
                    Ok(())
                })
            },
        ))
        .step(SagaStep::direct(
            Reservation::ReservationCreated,
            ReservationEvent::UpdateInventory,
            Reservation::SeatReserved,
        ))
        .step(
            SagaStep::to(
                Reservation::SeatReserved,
                ReservationEvent::ProcessExtraPayment,
                Reservation::ReservationConfirmed,
                |_fsm: &mut Machine, payload: Option<Payload>| {
                    Box::pin(async move {
                        info!(extras = ?payload.map(Payload::into_value), "T4: processing extra payment");
                        Err(Fault::fatal("PaymentDeclined", "extra payment processing failed"))
                    })
                },
            )
            .compensate(Compensation::new(
                FaultClass::tag("PaymentDeclined"),
                Reservation::PaymentFailed,
                |fsm: &mut Machine, _payload| {
                    Box::pin(async move {
                        info!("C4: extra payment failed, scheduling additional payment");
                        fsm.dispatch(Action::with_payload(
                            ReservationEvent::AdditionalPayment,
                            json!({ "retry": true }),
                        ))
                        .await?;
                        Ok(())
                    })
                },
            )),
        )
        .step(SagaStep::to(
            Reservation::PaymentFailed,
            ReservationEvent::AdditionalPayment,
            Reservation::ReservationConfirmed,
            |fsm: &mut Machine, _payload| {
                Box::pin(async move {
                    info!("T4a: processing additional payment");
                    fsm.context_mut().extra_payment_processed = true;
                    Ok(())
                })
            },
        ))
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let trip = Trip {
        state: None,
        email_sent: true,
        extra_payment_processed: false,
        booking: None,
    };
    let mut machine = Machine::new(saga(), trip);

    machine
        .dispatch(Action::with_payload(
            ReservationEvent::CreateReservation,
            json!({ "flight": "XY123", "date": "2025-03-01", "destination": "New York" }),
        ))
        .await?;
    if machine.current_state() == Some(&Reservation::ReservationFailed) {
        info!("reservation failed, saga terminated");
        return Ok(());
    }

    machine.dispatch(ReservationEvent::SendEmail).await?;

    // Persist the saga between steps and pick it up in a fresh machine.
    let json = machine.checkpoint().to_json()?;
    let checkpoint = Checkpoint::<Trip, ReservationEvent>::from_json(&json)?;
    let mut machine = Machine::from_checkpoint(saga(), checkpoint)?;

    machine.dispatch(ReservationEvent::UpdateInventory).await?;
    machine
        .dispatch(Action::with_payload(
            ReservationEvent::ProcessExtraPayment,
            json!({ "extras": ["extra legroom", "priority boarding"] }),
        ))
        .await?;

    let trip = machine.context();
    info!(
        state = ?trip.state,
        email_sent = trip.email_sent,
        extra_payment_processed = trip.extra_payment_processed,
        transitions = machine.history().transitions().len(),
        "saga finished"
    );
    Ok(())
}
