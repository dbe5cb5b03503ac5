//! Dispatch/merge engine - the runtime behavior of a built [`Router`].
//!
//! Applying a router to an effect stream fans the input out into one branch
//! per registered variant and fans the branches' events back into a single
//! output stream:
//!
//! ```text
//! effects ──► classifier ──┬─► branch A ─► handler A ──┐
//!   (input)   (by TypeId)  ├─► branch B ─► handler B ──┼─► merged events
//!                          └─► branch C ─► handler C ──┘      (output)
//! ```
//!
//! # Guarantees
//!
//! - **Exactly-once dispatch**: each effect instance reaches at most one
//!   branch, selected by its `TypeId`; an instance matching no branch fails
//!   the whole output with [`RouterError::UnknownEffect`].
//! - **Per-branch ordering**: a branch performs its effects sequentially in
//!   arrival order; interleaving across branches is unspecified.
//! - **First error wins**: the output delivers at most one terminal error;
//!   the losing branches are cancelled, and nothing is delivered after the
//!   terminal item.
//! - **Completion**: the output ends normally only once the input stream has
//!   completed and every branch has drained its already-dispatched effects.
//! - **Isolation**: every [`Router::route`] call builds fresh branch state;
//!   concurrent subscriptions share nothing but the immutable snapshot.
//!
//! Dropping the returned [`EventStream`] aborts the classifier and all
//! branches, so no further handler work runs for that subscription.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use anyhow::anyhow;
use futures::stream::Stream;
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, error};

use crate::core::{AnyEffect, Event};
use crate::error::RouterError;
use crate::fatal::FatalObserver;
use crate::handler::{AnyHandler, EventSink};
use crate::router::Router;

type OutputSender<Ev> = mpsc::UnboundedSender<Result<Ev, anyhow::Error>>;
type BranchSender = mpsc::UnboundedSender<Box<dyn Any + Send + Sync>>;

/// Shared terminal-state gate for one subscription.
///
/// The first failure (from any branch or the classifier) flips `terminated`,
/// delivers the terminal error, and tears the rest of the subscription down.
/// Later failures are suppressed entirely.
struct Terminator<Ev> {
    output: OutputSender<Ev>,
    terminated: AtomicBool,
    branch_aborts: Mutex<Vec<AbortHandle>>,
    stop: Notify,
    observer: Option<FatalObserver>,
}

impl<Ev: Event> Terminator<Ev> {
    fn new(output: OutputSender<Ev>, observer: Option<FatalObserver>) -> Self {
        Self {
            output,
            terminated: AtomicBool::new(false),
            branch_aborts: Mutex::new(Vec::new()),
            stop: Notify::new(),
            observer,
        }
    }

    /// Terminate with a handler failure: observe, then propagate verbatim.
    fn fail_handler(&self, err: anyhow::Error) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        // Observation happens synchronously before propagation and can never
        // suppress it.
        if let Some(observer) = &self.observer {
            observer(&err);
        }
        let _ = self.output.send(Err(err));
        self.shutdown();
    }

    /// Terminate with a classification failure (unknown effect).
    fn fail_unmatched(&self, err: anyhow::Error) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.output.send(Err(err));
        self.shutdown();
    }

    fn shutdown(&self) {
        self.stop.notify_one();
        for handle in self.branch_aborts.lock().unwrap().drain(..) {
            handle.abort();
        }
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

impl<Ev: Event> Router<Ev> {
    /// Apply this router to an effect stream, producing the merged event
    /// stream for one subscription.
    ///
    /// Must be called within a tokio runtime: each registered variant gets its
    /// own branch task, plus one classifier task reading the input. All tasks
    /// are owned by the returned [`EventStream`] and aborted when it is
    /// dropped.
    ///
    /// A router may be applied any number of times; subscriptions are fully
    /// independent.
    pub fn route<S>(&self, effects: S) -> EventStream<Ev>
    where
        S: Stream<Item = Box<dyn AnyEffect>> + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        // The observer is built once per subscription, eagerly, from the
        // configured factory.
        let observer = self
            .inner
            .fatal_hook
            .as_ref()
            .map(|hook| hook.observer(&self.inner.description));

        let terminator = Arc::new(Terminator::new(out_tx.clone(), observer));
        let mut tasks = JoinSet::new();

        // Fan-out: one channel + worker per registry entry. Branch abort
        // handles are all registered before the classifier starts, so any
        // failure can tear every branch down.
        let mut branches: HashMap<TypeId, BranchSender> = HashMap::new();
        for entry in &self.inner.entries {
            let (branch_tx, branch_rx) = mpsc::unbounded_channel();
            branches.insert(entry.type_id, branch_tx);

            let handle = tasks.spawn(branch_loop(
                entry.type_name,
                entry.handler.clone(),
                branch_rx,
                EventSink::new(out_tx.clone()),
                terminator.clone(),
            ));
            terminator.branch_aborts.lock().unwrap().push(handle);
        }
        drop(out_tx);

        debug!(
            handler_count = self.inner.entries.len(),
            "effect router subscription starting"
        );
        tasks.spawn(classify_loop(effects, branches, terminator));

        EventStream {
            rx: out_rx,
            _tasks: tasks,
            done: false,
        }
    }
}

/// Classifier: routes each incoming effect to the single branch whose
/// `TypeId` it carries, or fails the subscription if there is none.
async fn classify_loop<Ev, S>(
    effects: S,
    branches: HashMap<TypeId, BranchSender>,
    terminator: Arc<Terminator<Ev>>,
) where
    Ev: Event,
    S: Stream<Item = Box<dyn AnyEffect>> + Send + 'static,
{
    let mut effects = Box::pin(effects);

    loop {
        let next = tokio::select! {
            _ = terminator.stop.notified() => break,
            next = effects.next() => next,
        };

        let Some(effect) = next else {
            // Upstream complete: dropping the branch senders lets every
            // branch drain its queue and finish.
            break;
        };
        if terminator.is_terminated() {
            break;
        }

        match branches.get(&effect.effect_type_id()) {
            Some(branch_tx) => {
                if branch_tx.send(effect.into_any()).is_err() {
                    // Branch is gone: the subscription is terminating.
                    break;
                }
            }
            None => {
                error!(effect = ?effect, "effect matched no registered handler");
                terminator.fail_unmatched(RouterError::UnknownEffect(effect).into());
                break;
            }
        }
    }

    debug!("effect classifier finished");
}

/// Branch worker: performs its variant's effects sequentially, in arrival
/// order, until its queue closes or a failure terminates the subscription.
async fn branch_loop<Ev: Event>(
    type_name: &'static str,
    handler: Arc<dyn AnyHandler<Ev>>,
    mut effects: mpsc::UnboundedReceiver<Box<dyn Any + Send + Sync>>,
    sink: EventSink<Ev>,
    terminator: Arc<Terminator<Ev>>,
) {
    while let Some(effect) = effects.recv().await {
        // AssertUnwindSafe is required because handler/sink are not
        // UnwindSafe; neither is touched again after a panic.
        let result = AssertUnwindSafe(handler.handle_any(effect, &sink))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(handler = type_name, error = ?err, "effect handler failed");
                terminator.fail_handler(err);
                return;
            }
            Err(panic_info) => {
                let panic_msg = panic_message(&panic_info);
                error!(handler = type_name, panic = %panic_msg, "effect handler panicked");
                terminator.fail_handler(anyhow!("effect handler panicked: {}", panic_msg));
                return;
            }
        }
    }
}

/// Extract a human-readable message from a panic payload.
fn panic_message(panic_info: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Merged event output of one router subscription.
///
/// Yields `Ok(event)` items as branches produce them, then terminates:
/// - normally (`None`) once the input completed and all branches drained, or
/// - with a single `Err` item - the unknown-effect error or the first handler
///   failure - after which the stream is fused and yields `None` forever.
///
/// Dropping the stream cancels the subscription: the classifier and all
/// branch tasks are aborted, and no further handler work runs.
pub struct EventStream<Ev> {
    rx: mpsc::UnboundedReceiver<Result<Ev, anyhow::Error>>,
    /// Owns the subscription's tasks; aborts them all on drop.
    _tasks: JoinSet<()>,
    done: bool,
}

impl<Ev: Event> Stream for EventStream<Ev> {
    type Item = Result<Ev, anyhow::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Err(err))) => {
                // Terminal: nothing is delivered after the first error.
                this.done = true;
                this.rx.close();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(Some(Ok(event))) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<Ev> std::fmt::Debug for EventStream<Ev> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
