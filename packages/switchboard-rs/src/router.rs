//! Registration and the immutable router snapshot.
//!
//! The [`RouterBuilder`] is a mutable accumulator used single-threaded during
//! setup: register one handler per effect type, optionally configure a
//! fatal-error hook, then call [`RouterBuilder::build`] to freeze a
//! [`Router`]. Building copies the current entries, so a snapshot is
//! immutable: later builder mutation is invisible to routers built earlier,
//! and one builder may produce several different snapshots over time.
//!
//! Registration rejects collisions: because every effect value carries exactly
//! one `TypeId`, two registrations collide exactly when they name the same
//! concrete type, and the check is a duplicate-tag scan. A rejected `add`
//! leaves the registry unchanged.
//!
//! # Example
//!
//! ```ignore
//! let router = RouterBuilder::<UserEvent>::new()
//!     .add::<SaveUser, _>(SaveUserHandler { db })
//!     .add_consumer::<LogLine, _>(|line: LogLine| println!("{}", line.text))
//!     .add_action::<Beep, _>(|| beep())
//!     .build();
//!
//! let events = router.route(effects);
//! ```

use std::any::TypeId;
use std::sync::Arc;

use crate::core::{Effect, Event};
use crate::error::RouterError;
use crate::fatal::FatalErrorHook;
use crate::handler::{ActionHandler, AnyHandler, ConsumerHandler, Handler, HandlerWrapper};

/// One registered (effect type, handler) pair.
pub(crate) struct RegistryEntry<Ev: Event> {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) handler: Arc<dyn AnyHandler<Ev>>,
}

impl<Ev: Event> Clone for RegistryEntry<Ev> {
    fn clone(&self) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            handler: self.handler.clone(),
        }
    }
}

/// Insertion-ordered registry with pairwise-distinct effect types.
///
/// Order is preserved for iteration only; after the collision check at most
/// one entry can ever classify a given effect, so order never affects
/// dispatch outcomes.
pub(crate) struct Registry<Ev: Event> {
    entries: Vec<RegistryEntry<Ev>>,
}

impl<Ev: Event> Registry<Ev> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn insert<F: Effect>(&mut self, handler: Arc<dyn AnyHandler<Ev>>) -> Result<(), RouterError> {
        let type_id = TypeId::of::<F>();
        if self.entries.iter().any(|entry| entry.type_id == type_id) {
            return Err(RouterError::HandlerCollision {
                type_name: std::any::type_name::<F>(),
            });
        }
        self.entries.push(RegistryEntry {
            type_id,
            type_name: std::any::type_name::<F>(),
            handler,
        });
        Ok(())
    }

    fn contains(&self, type_id: TypeId) -> bool {
        self.entries.iter().any(|entry| entry.type_id == type_id)
    }

    fn entries(&self) -> &[RegistryEntry<Ev>] {
        &self.entries
    }
}

/// Description of a router, handed to the fatal-error hook factory.
#[derive(Debug, Clone)]
pub struct RouterDescription {
    effect_types: Vec<&'static str>,
}

impl RouterDescription {
    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self {
            effect_types: Vec::new(),
        }
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.effect_types.len()
    }

    /// Type names of the registered effect variants, in registration order.
    pub fn effect_types(&self) -> &[&'static str] {
        &self.effect_types
    }
}

/// Builder for [`Router`] - registration plus the fatal-error-hook slot.
pub struct RouterBuilder<Ev: Event> {
    registry: Registry<Ev>,
    fatal_hook: Option<Arc<dyn FatalErrorHook>>,
}

impl<Ev: Event> RouterBuilder<Ev> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            fatal_hook: None,
        }
    }

    /// Register a handler for an effect type.
    ///
    /// # Panics
    ///
    /// Panics if a handler is already registered for this effect type.
    /// Use [`RouterBuilder::try_add`] for a non-panicking version.
    pub fn add<F, H>(mut self, handler: H) -> Self
    where
        F: Effect,
        H: Handler<F, Ev>,
    {
        if let Err(e) = self.try_add::<F, H>(handler) {
            panic!("{}", e);
        }
        self
    }

    /// Register a handler for an effect type, returning an error on collision.
    ///
    /// On `Err` the registry is unchanged; the builder stays usable.
    pub fn try_add<F, H>(&mut self, handler: H) -> Result<&mut Self, RouterError>
    where
        F: Effect,
        H: Handler<F, Ev>,
    {
        self.registry
            .insert::<F>(Arc::new(HandlerWrapper::new(handler)))?;
        Ok(self)
    }

    /// Register a consumer for an effect type: invoked once per matching
    /// effect, produces no events.
    ///
    /// # Panics
    ///
    /// Panics if a handler is already registered for this effect type.
    pub fn add_consumer<F, C>(self, consumer: C) -> Self
    where
        F: Effect,
        C: Fn(F) + Send + Sync + 'static,
    {
        self.add::<F, _>(ConsumerHandler::new(consumer))
    }

    /// Non-panicking variant of [`RouterBuilder::add_consumer`].
    pub fn try_add_consumer<F, C>(&mut self, consumer: C) -> Result<&mut Self, RouterError>
    where
        F: Effect,
        C: Fn(F) + Send + Sync + 'static,
    {
        self.try_add::<F, _>(ConsumerHandler::new(consumer))
    }

    /// Register an action for an effect type: run once per matching effect,
    /// ignoring the payload, producing no events.
    ///
    /// # Panics
    ///
    /// Panics if a handler is already registered for this effect type.
    pub fn add_action<F, A>(self, action: A) -> Self
    where
        F: Effect,
        A: Fn() + Send + Sync + 'static,
    {
        self.add::<F, _>(ActionHandler::new(action))
    }

    /// Non-panicking variant of [`RouterBuilder::add_action`].
    pub fn try_add_action<F, A>(&mut self, action: A) -> Result<&mut Self, RouterError>
    where
        F: Effect,
        A: Fn() + Send + Sync + 'static,
    {
        self.try_add::<F, _>(ActionHandler::new(action))
    }

    /// Configure the fatal-error hook, replacing any previous one.
    ///
    /// At most one hook is active per builder at `build()` time. See
    /// [`FatalErrorHook`] for the observer contract.
    pub fn with_fatal_error_hook<H: FatalErrorHook>(mut self, hook: H) -> Self {
        self.fatal_hook = Some(Arc::new(hook));
        self
    }

    /// Check if a handler is registered for an effect type.
    pub fn has_handler<F: Effect>(&self) -> bool {
        self.registry.contains(TypeId::of::<F>())
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.registry.entries().len()
    }

    /// Freeze the current registration into an immutable [`Router`].
    ///
    /// The snapshot copies the entries and hook as they are right now.
    /// Subsequent `add`/`with_fatal_error_hook` calls on this builder have no
    /// effect on routers already built; building again later may yield a
    /// snapshot with a different entry set.
    pub fn build(&self) -> Router<Ev> {
        let entries = self.registry.entries().to_vec();
        let description = RouterDescription {
            effect_types: entries.iter().map(|entry| entry.type_name).collect(),
        };
        Router {
            inner: Arc::new(RouterInner {
                entries,
                fatal_hook: self.fatal_hook.clone(),
                description,
            }),
        }
    }
}

impl<Ev: Event> Default for RouterBuilder<Ev> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ev: Event> std::fmt::Debug for RouterBuilder<Ev> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("handler_count", &self.handler_count())
            .field("has_fatal_hook", &self.fatal_hook.is_some())
            .finish_non_exhaustive()
    }
}

pub(crate) struct RouterInner<Ev: Event> {
    pub(crate) entries: Vec<RegistryEntry<Ev>>,
    pub(crate) fatal_hook: Option<Arc<dyn FatalErrorHook>>,
    pub(crate) description: RouterDescription,
}

/// Immutable effect router - a frozen snapshot of one builder's registration.
///
/// Cheap to clone and safe to share: a single router may be applied to any
/// number of independent effect streams via [`Router::route`] (defined in the
/// engine module); each application gets fully isolated branch state.
pub struct Router<Ev: Event> {
    pub(crate) inner: Arc<RouterInner<Ev>>,
}

impl<Ev: Event> Router<Ev> {
    /// Description of this snapshot's registration.
    pub fn description(&self) -> &RouterDescription {
        &self.inner.description
    }

    /// Check if this snapshot holds a handler for an effect type.
    pub fn has_handler<F: Effect>(&self) -> bool {
        let type_id = TypeId::of::<F>();
        self.inner.entries.iter().any(|entry| entry.type_id == type_id)
    }

    /// Returns the number of handlers in this snapshot.
    pub fn handler_count(&self) -> usize {
        self.inner.entries.len()
    }
}

impl<Ev: Event> Clone for Router<Ev> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Ev: Event> std::fmt::Debug for Router<Ev> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("handler_count", &self.handler_count())
            .finish_non_exhaustive()
    }
}
