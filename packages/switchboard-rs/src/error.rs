//! Structured error types for registration and dispatch.
//!
//! `RouterError` provides pattern-matchable errors instead of generic
//! `anyhow::Error`.
//!
//! # The Error Boundary Rule
//!
//! - `RouterError` covers the router's own failure modes (collision at
//!   registration time, unknown effect at dispatch time).
//! - Handler failures are **not** wrapped: whatever `anyhow::Error` a handler
//!   returned (or the panic it raised, converted) is propagated verbatim as
//!   the terminal error of the merged output stream.
//!
//! # Example
//!
//! ```ignore
//! use switchboard::RouterError;
//!
//! while let Some(item) = events.next().await {
//!     match item {
//!         Ok(event) => apply(event),
//!         Err(e) => {
//!             if let Some(RouterError::UnknownEffect(effect)) = e.downcast_ref() {
//!                 eprintln!("no handler for {:?}", effect);
//!             }
//!             break;
//!         }
//!     }
//! }
//! ```

use thiserror::Error;

use crate::core::AnyEffect;

/// Structured error type for router operations.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A dispatched effect matched no registered variant.
    ///
    /// Wraps exactly the instance that failed to classify. Terminal for the
    /// subscription that saw it; never retried.
    #[error("no handler registered for effect {0:?}")]
    UnknownEffect(Box<dyn AnyEffect>),

    /// A handler is already registered for this effect type.
    ///
    /// Raised synchronously by registration; the registry is left unchanged.
    /// Always a configuration bug at setup time.
    #[error("effect handler collision: {type_name} is already registered")]
    HandlerCollision {
        /// The effect type both registrations named.
        type_name: &'static str,
    },

    /// Effect type mismatch during dispatch (internal invariant breach).
    #[error("effect type mismatch: expected {expected}")]
    EffectTypeMismatch {
        /// Expected type name.
        expected: &'static str,
    },
}

impl RouterError {
    /// The unmatched effect instance, if this is an `UnknownEffect` error.
    pub fn unknown_effect(&self) -> Option<&dyn AnyEffect> {
        match self {
            RouterError::UnknownEffect(effect) => Some(effect.as_ref()),
            _ => None,
        }
    }
}
