//! Fatal-error hook - observe handler failures before they terminate the
//! output.
//!
//! The hook is a factory: given a description of the router being subscribed,
//! it returns the observer callback for that subscription. The observer is
//! built once per subscription and invoked synchronously with the first
//! handler failure, before the failure is propagated. Observation never
//! suppresses propagation - the merged output always terminates with the same
//! error the observer saw.
//!
//! # Example
//!
//! ```ignore
//! use switchboard::{FatalErrorHook, FatalObserver, RouterBuilder, RouterDescription};
//!
//! let builder = RouterBuilder::<MyEvent>::new()
//!     .with_fatal_error_hook(|router: &RouterDescription| -> FatalObserver {
//!         let scope = format!("router[{}]", router.handler_count());
//!         Box::new(move |err| {
//!             tracing::error!(%scope, error = ?err, "handler failure");
//!         })
//!     });
//! ```

use crate::router::RouterDescription;

/// Observer callback for one subscription's fatal handler failures.
pub type FatalObserver = Box<dyn Fn(&anyhow::Error) + Send + Sync>;

/// Factory for fatal-error observers.
///
/// Implemented for free by any
/// `Fn(&RouterDescription) -> FatalObserver + Send + Sync + 'static` closure;
/// implement it manually when the hook needs its own state.
pub trait FatalErrorHook: Send + Sync + 'static {
    /// Build the observer for a subscription of the described router.
    fn observer(&self, router: &RouterDescription) -> FatalObserver;
}

impl<H> FatalErrorHook for H
where
    H: Fn(&RouterDescription) -> FatalObserver + Send + Sync + 'static,
{
    fn observer(&self, router: &RouterDescription) -> FatalObserver {
        self(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_hook_builds_observer() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let invocations_in = invocations.clone();

        let hook = move |_router: &RouterDescription| -> FatalObserver {
            let invocations = invocations_in.clone();
            Box::new(move |_err| {
                invocations.fetch_add(1, Ordering::SeqCst);
            })
        };

        let description = RouterDescription::empty();
        let observer = hook.observer(&description);

        observer(&anyhow::anyhow!("boom"));
        observer(&anyhow::anyhow!("boom again"));
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hook_receives_description() {
        let hook = |router: &RouterDescription| -> FatalObserver {
            assert_eq!(router.handler_count(), 0);
            Box::new(|_err| {})
        };

        let _observer = hook.observer(&RouterDescription::empty());
    }
}
