//! Faults raised by transition actions and hooks, and the classifiers that
//! select compensations for them.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Distinguished fault category.
///
/// Only retryable faults are handed to a descriptor's retry handler; fatal
/// faults go straight to compensation matching and otherwise fail the
/// transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    Retryable,
    Fatal,
}

/// Error value returned by transition actions, compensations and hooks.
///
/// The `tag` names the fault's class within a workflow (for example
/// `"EmailUnavailable"`) and is what [`FaultClass::Tag`] matches on.
///
/// # Example
///
/// ```rust
/// use sagaflow::core::{Fault, FaultKind};
///
/// let fault = Fault::retryable("PaymentGateway", "gateway timed out");
/// assert!(fault.is_retryable());
/// assert_eq!(fault.tag(), "PaymentGateway");
/// assert_eq!(fault.to_string(), "PaymentGateway: gateway timed out");
///
/// let fault = Fault::fatal("InvalidCard", "card rejected");
/// assert_eq!(fault.kind(), FaultKind::Fatal);
/// ```
#[derive(Clone, Debug, Error)]
#[error("{tag}: {message}")]
pub struct Fault {
    kind: FaultKind,
    tag: Cow<'static, str>,
    message: String,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Fault {
    pub fn new(
        kind: FaultKind,
        tag: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            tag: tag.into(),
            message: message.into(),
            source: None,
        }
    }

    /// A fault the retry handler may act on.
    pub fn retryable(tag: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::Retryable, tag, message)
    }

    /// A fault that is never retried.
    pub fn fatal(tag: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::Fatal, tag, message)
    }

    /// Attach the underlying error.
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == FaultKind::Retryable
    }
}

impl PartialEq for Fault {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.tag == other.tag && self.message == other.message
    }
}

/// Classifier deciding whether a compensation applies to a fault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaultClass {
    /// Matches every fault.
    Any,
    /// Matches faults of one kind.
    Kind(FaultKind),
    /// Matches faults carrying this tag.
    Tag(Cow<'static, str>),
}

impl FaultClass {
    pub fn tag(tag: impl Into<Cow<'static, str>>) -> Self {
        Self::Tag(tag.into())
    }

    pub fn matches(&self, fault: &Fault) -> bool {
        match self {
            Self::Any => true,
            Self::Kind(kind) => fault.kind == *kind,
            Self::Tag(tag) => fault.tag == *tag,
        }
    }

    /// Whether every fault this class matches is also matched by `self`.
    pub fn covers(&self, other: &FaultClass) -> bool {
        match (self, other) {
            (Self::Any, _) => true,
            (Self::Kind(a), Self::Kind(b)) => a == b,
            (Self::Tag(a), Self::Tag(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("connection reset")]
    struct NetworkError;

    #[test]
    fn retryable_and_fatal_constructors_set_kind() {
        assert!(Fault::retryable("Net", "down").is_retryable());
        assert!(!Fault::fatal("Net", "down").is_retryable());
    }

    #[test]
    fn display_combines_tag_and_message() {
        let fault = Fault::fatal("EmailUnavailable", "smtp refused");
        assert_eq!(fault.to_string(), "EmailUnavailable: smtp refused");
    }

    #[test]
    fn source_is_exposed() {
        let fault = Fault::retryable("Net", "request failed").with_source(NetworkError);
        let source = fault.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("connection reset"));
    }

    #[test]
    fn any_matches_everything() {
        assert!(FaultClass::Any.matches(&Fault::fatal("A", "x")));
        assert!(FaultClass::Any.matches(&Fault::retryable("B", "y")));
    }

    #[test]
    fn kind_class_matches_only_that_kind() {
        let class = FaultClass::Kind(FaultKind::Retryable);
        assert!(class.matches(&Fault::retryable("A", "x")));
        assert!(!class.matches(&Fault::fatal("A", "x")));
    }

    #[test]
    fn tag_class_matches_only_that_tag() {
        let class = FaultClass::tag("EmailUnavailable");
        assert!(class.matches(&Fault::fatal("EmailUnavailable", "x")));
        assert!(!class.matches(&Fault::fatal("PaymentFailed", "x")));
    }

    #[test]
    fn covers_reflects_class_inclusion() {
        assert!(FaultClass::Any.covers(&FaultClass::tag("A")));
        assert!(FaultClass::tag("A").covers(&FaultClass::tag("A")));
        assert!(!FaultClass::tag("A").covers(&FaultClass::Any));
        assert!(!FaultClass::Kind(FaultKind::Fatal).covers(&FaultClass::tag("A")));
    }
}
