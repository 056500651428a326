//! Actions: a requested transition attempt, optionally carrying a payload.

use super::state::Event;
use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arbitrary data attached to an action.
///
/// Payloads are JSON values. Human-readable formats (JSON checkpoints) store
/// the value inline; binary formats store its JSON text, since compact
/// encodings cannot describe a self-typed value.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload(Value);

impl Payload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Encode any serializable value as a payload.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self)
    }

    /// Decode the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.0)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            self.0.serialize(serializer)
        } else {
            serializer.serialize_str(&self.0.to_string())
        }
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            Value::deserialize(deserializer).map(Self)
        } else {
            let text = String::deserialize(deserializer)?;
            serde_json::from_str(&text)
                .map(Self)
                .map_err(serde::de::Error::custom)
        }
    }
}

/// One requested transition attempt.
///
/// Actions are consumed exactly once by a machine: removed from its queue
/// after execution, whether the transition succeeded or not.
///
/// # Example
///
/// ```rust
/// use sagaflow::core::Action;
/// use sagaflow::event_enum;
/// use serde_json::json;
///
/// event_enum! {
///     enum BookingEvent {
///         Reserve,
///     }
/// }
///
/// let action = Action::with_payload(BookingEvent::Reserve, json!({ "flight": "XY123" }));
/// assert_eq!(action.event, BookingEvent::Reserve);
/// assert_eq!(action.payload.unwrap().as_value()["flight"], "XY123");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Action<E: Event> {
    /// The event this action requests.
    pub event: E,
    /// Optional data handed to the transition action.
    #[serde(default)]
    pub payload: Option<Payload>,
}

impl<E: Event> Action<E> {
    pub fn new(event: E) -> Self {
        Self {
            event,
            payload: None,
        }
    }

    pub fn with_payload(event: E, payload: impl Into<Payload>) -> Self {
        Self {
            event,
            payload: Some(payload.into()),
        }
    }
}

impl<E: Event> From<E> for Action<E> {
    fn from(event: E) -> Self {
        Self::new(event)
    }
}
