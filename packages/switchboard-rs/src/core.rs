//! Core traits for effect and event values.
//!
//! # Overview
//!
//! Switchboard separates **intent** from **outcome**:
//! - [`Effect`] = Intent (a request for side work, routed to one handler)
//! - [`Event`] = Outcome (what the handler produced, merged into one stream)
//!
//! Each effect value is one concrete Rust type, and that type is its variant:
//! classification uses the value's `TypeId`, so a value belongs to exactly one
//! variant and dispatch can never be ambiguous. There is no subtype hierarchy
//! to collide across; two registrations collide only when they name the same
//! concrete type.

use std::any::{Any, TypeId};
use std::fmt;

/// A request for side work, dispatched to exactly one registered handler.
///
/// Implement this marker on every concrete effect type you register:
///
/// ```ignore
/// #[derive(Debug, Clone)]
/// struct SaveUser {
///     user_id: Uuid,
/// }
/// impl Effect for SaveUser {}
/// ```
///
/// The effect's variant identifier is its `TypeId`. A router input stream
/// carries effects type-erased as `Box<dyn AnyEffect>`; the blanket
/// [`AnyEffect`] impl takes care of the erasure.
pub trait Effect: Any + fmt::Debug + Send + Sync + 'static {}

/// Type-erased effect, the item type of a router's input stream.
///
/// Automatically implemented for every [`Effect`]; you never implement this
/// yourself. Heterogeneous effects are boxed into `Box<dyn AnyEffect>` before
/// entering the router:
///
/// ```ignore
/// let effect: Box<dyn AnyEffect> = Box::new(SaveUser { user_id });
/// tx.unbounded_send(effect)?;
/// ```
pub trait AnyEffect: fmt::Debug + Send + Sync {
    /// Returns the `TypeId` identifying this effect's variant.
    fn effect_type_id(&self) -> TypeId;

    /// Human-readable type name for errors and logging.
    fn effect_type_name(&self) -> &'static str;

    /// Downcast to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Downcast to the concrete type (boxed).
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<F: Effect> AnyEffect for F {
    fn effect_type_id(&self) -> TypeId {
        TypeId::of::<F>()
    }

    fn effect_type_name(&self) -> &'static str {
        std::any::type_name::<F>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// The outcome of an effect, fed back into the surrounding decision logic.
///
/// **Note**: This trait is automatically implemented for any type that is
/// `Send + Sync + 'static`. You don't need to implement it manually.
///
/// A router is generic over a single event type; handlers for every variant
/// produce values of that one type (typically a domain enum):
///
/// ```ignore
/// #[derive(Debug, Clone)]
/// enum UserEvent {
///     Saved { user_id: Uuid },
///     Fetched { user: User },
/// }
/// // Event is automatically implemented!
/// ```
pub trait Event: Any + Send + Sync + 'static {}

// Blanket implementation for any type that meets the requirements
impl<T: Send + Sync + 'static> Event for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping {
        id: u64,
    }
    impl Effect for Ping {}

    #[derive(Debug, Clone)]
    struct Pong;
    impl Effect for Pong {}

    #[test]
    fn test_effect_type_id_matches_concrete_type() {
        let effect: Box<dyn AnyEffect> = Box::new(Ping { id: 7 });
        assert_eq!(effect.effect_type_id(), TypeId::of::<Ping>());
        assert_ne!(effect.effect_type_id(), TypeId::of::<Pong>());
    }

    #[test]
    fn test_effect_type_name_is_readable() {
        let effect: Box<dyn AnyEffect> = Box::new(Pong);
        assert!(effect.effect_type_name().contains("Pong"));
    }

    #[test]
    fn test_as_any_downcast() {
        let effect: Box<dyn AnyEffect> = Box::new(Ping { id: 42 });
        let ping = effect.as_any().downcast_ref::<Ping>().unwrap();
        assert_eq!(ping.id, 42);
    }

    #[test]
    fn test_into_any_downcast() {
        let effect: Box<dyn AnyEffect> = Box::new(Ping { id: 99 });
        let ping = effect.into_any().downcast::<Ping>().unwrap();
        assert_eq!(*ping, Ping { id: 99 });
    }
}
