//! Handler trait, event sink, and the shape adapters.
//!
//! Handlers perform the side work an effect describes and report outcomes as
//! events. Three shapes are supported, all normalized to the first:
//!
//! 1. **Transform** — implement [`Handler`]: called once per matching effect,
//!    in arrival order, emitting zero or more events through the sink.
//! 2. **Consumer** — a plain `Fn(F)` closure: observes each matching effect,
//!    produces no events.
//! 3. **Action** — a plain `Fn()` closure: runs once per matching effect,
//!    ignores the payload, produces no events.
//!
//! # Key Properties
//!
//! - **One effect = one `handle` call** on its branch, in order
//! - **Zero or more events per effect** via [`EventSink`]
//! - **Failures are fatal**: returning `Err` (or panicking) terminates the
//!   whole merged output, after optional observation by the fatal-error hook

use std::any::Any;
use std::marker::PhantomData;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::{Effect, Event};
use crate::error::RouterError;

/// Outlet through which a handler reports events.
///
/// `EventSink` is **immutable and cheap to clone**; emitting never blocks and
/// never fails from the handler's point of view. If the subscription that owns
/// the sink has already terminated, emitted events are silently discarded.
pub struct EventSink<Ev> {
    tx: mpsc::UnboundedSender<Result<Ev, anyhow::Error>>,
}

impl<Ev> EventSink<Ev> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Result<Ev, anyhow::Error>>) -> Self {
        Self { tx }
    }

    /// Emit an event into the merged output stream.
    ///
    /// Events from one branch are delivered in emission order; interleaving
    /// with other branches' events is unspecified.
    pub fn emit(&self, event: Ev) {
        let _ = self.tx.send(Ok(event));
    }
}

impl<Ev> Clone for EventSink<Ev> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<Ev> std::fmt::Debug for EventSink<Ev> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

/// Handler for effects of one variant.
///
/// The router calls `handle` once per matching effect, sequentially per
/// branch, so a handler sees its variant's effects in arrival order. Handlers
/// for different variants run concurrently with each other.
///
/// # Example
///
/// ```ignore
/// struct SaveUserHandler {
///     db: Pool,
/// }
///
/// #[async_trait]
/// impl Handler<SaveUser, UserEvent> for SaveUserHandler {
///     async fn handle(&self, effect: SaveUser, events: &EventSink<UserEvent>) -> Result<()> {
///         let user = self.db.save(effect.user_id).await?;
///         events.emit(UserEvent::Saved { user_id: user.id });
///         Ok(())
///     }
/// }
/// ```
///
/// # Errors
///
/// Return `Err` if the effect cannot be performed. The error terminates the
/// merged output stream verbatim; there is no retry.
#[async_trait]
pub trait Handler<F: Effect, Ev: Event>: Send + Sync + 'static {
    /// Perform one effect, emitting any resulting events through the sink.
    async fn handle(&self, effect: F, events: &EventSink<Ev>) -> Result<()>;
}

/// Shape (ii) adapter: a consumer closure normalized to a [`Handler`] that
/// emits nothing.
pub(crate) struct ConsumerHandler<F, C> {
    consumer: C,
    _marker: PhantomData<fn(F)>,
}

impl<F, C> ConsumerHandler<F, C> {
    pub(crate) fn new(consumer: C) -> Self {
        Self {
            consumer,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Ev, C> Handler<F, Ev> for ConsumerHandler<F, C>
where
    F: Effect,
    Ev: Event,
    C: Fn(F) + Send + Sync + 'static,
{
    async fn handle(&self, effect: F, _events: &EventSink<Ev>) -> Result<()> {
        (self.consumer)(effect);
        Ok(())
    }
}

/// Shape (iii) adapter: an action closure normalized to a [`Handler`] that
/// ignores the payload and emits nothing.
pub(crate) struct ActionHandler<F, A> {
    action: A,
    _marker: PhantomData<fn(F)>,
}

impl<F, A> ActionHandler<F, A> {
    pub(crate) fn new(action: A) -> Self {
        Self {
            action,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Ev, A> Handler<F, Ev> for ActionHandler<F, A>
where
    F: Effect,
    Ev: Event,
    A: Fn() + Send + Sync + 'static,
{
    async fn handle(&self, _effect: F, _events: &EventSink<Ev>) -> Result<()> {
        (self.action)();
        Ok(())
    }
}

/// Type-erased handler trait for internal use.
#[async_trait]
pub(crate) trait AnyHandler<Ev: Event>: Send + Sync {
    /// Perform one type-erased effect.
    async fn handle_any(
        &self,
        effect: Box<dyn Any + Send + Sync>,
        events: &EventSink<Ev>,
    ) -> Result<()>;
}

/// Wrapper to make concrete handlers implement AnyHandler.
pub(crate) struct HandlerWrapper<H, F, Ev>
where
    H: Handler<F, Ev>,
    F: Effect,
    Ev: Event,
{
    handler: H,
    _marker: PhantomData<fn(F) -> Ev>,
}

impl<H, F, Ev> HandlerWrapper<H, F, Ev>
where
    H: Handler<F, Ev>,
    F: Effect,
    Ev: Event,
{
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<H, F, Ev> AnyHandler<Ev> for HandlerWrapper<H, F, Ev>
where
    H: Handler<F, Ev>,
    F: Effect,
    Ev: Event,
{
    async fn handle_any(
        &self,
        effect: Box<dyn Any + Send + Sync>,
        events: &EventSink<Ev>,
    ) -> Result<()> {
        let effect = effect
            .downcast::<F>()
            .map_err(|_| RouterError::EffectTypeMismatch {
                expected: std::any::type_name::<F>(),
            })?;
        self.handler.handle(*effect, events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Bump {
        by: i32,
    }
    impl Effect for Bump {}

    #[derive(Debug, Clone, PartialEq)]
    struct Bumped {
        total: i32,
    }

    struct BumpHandler;

    #[async_trait]
    impl Handler<Bump, Bumped> for BumpHandler {
        async fn handle(&self, effect: Bump, events: &EventSink<Bumped>) -> Result<()> {
            events.emit(Bumped { total: effect.by });
            Ok(())
        }
    }

    fn sink_pair<Ev>() -> (
        EventSink<Ev>,
        mpsc::UnboundedReceiver<Result<Ev, anyhow::Error>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSink::new(tx), rx)
    }

    #[tokio::test]
    async fn test_handler_emits_through_sink() {
        let (sink, mut rx) = sink_pair();

        BumpHandler.handle(Bump { by: 3 }, &sink).await.unwrap();

        let event = rx.recv().await.unwrap().unwrap();
        assert_eq!(event, Bumped { total: 3 });
    }

    #[tokio::test]
    async fn test_consumer_handler_sees_effect_and_emits_nothing() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_in = seen.clone();
        let handler = ConsumerHandler::new(move |effect: Bump| {
            seen_in.lock().unwrap().push(effect);
        });

        let (sink, mut rx) = sink_pair::<Bumped>();
        Handler::<Bump, Bumped>::handle(&handler, Bump { by: 9 }, &sink)
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), &[Bump { by: 9 }]);
        drop(sink);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_action_handler_runs_and_ignores_payload() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_in = runs.clone();
        let handler = ActionHandler::new(move || {
            runs_in.fetch_add(1, Ordering::Relaxed);
        });

        let (sink, mut rx) = sink_pair::<Bumped>();
        Handler::<Bump, Bumped>::handle(&handler, Bump { by: 1 }, &sink)
            .await
            .unwrap();
        Handler::<Bump, Bumped>::handle(&handler, Bump { by: 2 }, &sink)
            .await
            .unwrap();

        assert_eq!(runs.load(Ordering::Relaxed), 2);
        drop(sink);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_wrapper_downcasts_and_delegates() {
        let wrapper = HandlerWrapper::new(BumpHandler);
        let (sink, mut rx) = sink_pair();

        let effect: Box<dyn Any + Send + Sync> = Box::new(Bump { by: 5 });
        wrapper.handle_any(effect, &sink).await.unwrap();

        let event = rx.recv().await.unwrap().unwrap();
        assert_eq!(event, Bumped { total: 5 });
    }

    #[tokio::test]
    async fn test_wrapper_wrong_effect_type() {
        #[derive(Debug, Clone)]
        struct Other;
        impl Effect for Other {}

        let wrapper = HandlerWrapper::new(BumpHandler);
        let (sink, _rx) = sink_pair();

        let effect: Box<dyn Any + Send + Sync> = Box::new(Other);
        let result = wrapper.handle_any(effect, &sink).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("type mismatch"));
    }

    #[tokio::test]
    async fn test_sink_emit_after_receiver_dropped_is_silent() {
        let (sink, rx) = sink_pair();
        drop(rx);

        // Must not panic or error
        sink.emit(Bumped { total: 1 });
    }
}
