//! Macros for declaring state and event alphabets.
//!
//! Both derive serde's traits, so the calling crate needs `serde` (with the
//! `derive` feature) as a dependency.

/// Generate an enum with a `State` trait implementation.
///
/// # Example
///
/// ```
/// use sagaflow::core::State;
/// use sagaflow::state_enum;
///
/// state_enum! {
///     pub enum BookingState {
///         Start,
///         Reserved,
///         Confirmed,
///         Cancelled,
///     }
///     final: [Confirmed, Cancelled]
///     error: [Cancelled]
/// }
///
/// assert_eq!(BookingState::Reserved.name(), "Reserved");
/// assert!(BookingState::Cancelled.is_error());
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(final: [$($final:ident),* $(,)?])?
        $(error: [$($error:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn is_final(&self) -> bool {
                match self {
                    $($(Self::$final => true,)*)?
                    _ => false,
                }
            }

            fn is_error(&self) -> bool {
                match self {
                    $($(Self::$error => true,)*)?
                    _ => false,
                }
            }
        }
    };
}

/// Generate an enum with an `Event` trait implementation.
///
/// # Example
///
/// ```
/// use sagaflow::core::Event;
/// use sagaflow::event_enum;
///
/// event_enum! {
///     pub enum BookingEvent {
///         Reserve,
///         Confirm,
///     }
/// }
///
/// assert_eq!(BookingEvent::Confirm.name(), "Confirm");
/// ```
#[macro_export]
macro_rules! event_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::Event for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Event, State};
    use std::collections::HashSet;

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
            Begin,
            Abandon,
        }
    }

    #[test]
    fn state_enum_macro_generates_trait() {
        let state = TestState::Initial;
        assert_eq!(state.name(), "Initial");
        assert!(!state.is_final());
        assert!(!state.is_error());

        let complete = TestState::Complete;
        assert!(complete.is_final());
        assert!(!complete.is_error());

        let failed = TestState::Failed;
        assert!(failed.is_final());
        assert!(failed.is_error());
    }

    #[test]
    fn state_enum_supports_visibility() {
        state_enum! {
            pub enum PublicState {
                A,
                B,
            }
            final: [B]
        }

        let _state = PublicState::A;
    }

    #[test]
    fn state_enum_works_without_final_error() {
        state_enum! {
            enum MinimalState {
                One,
                Two,
            }
        }

        let state = MinimalState::One;
        assert!(!state.is_final());
        assert!(!state.is_error());
    }

    #[test]
    fn event_enum_names_variants() {
        assert_eq!(TestEvent::Begin.name(), "Begin");
        assert_eq!(TestEvent::Abandon.name(), "Abandon");
    }

    #[test]
    fn generated_enums_are_hashable() {
        let events: HashSet<_> = [TestEvent::Begin, TestEvent::Begin, TestEvent::Abandon]
            .into_iter()
            .collect();
        assert_eq!(events.len(), 2);

        let states: HashSet<_> = [TestState::Initial, TestState::Failed].into_iter().collect();
        assert!(states.contains(&TestState::Failed));
    }
}
