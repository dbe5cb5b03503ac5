//! Testing utilities for effect routers.
//!
//! Fixtures for asserting how a router drives handlers: a recording consumer,
//! a counting action, and an always-failing handler.
//!
//! # Feature Flag
//!
//! This module is only available with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! switchboard = { version = "0.1", features = ["testing"] }
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use switchboard::testing::{CountingAction, RecordingConsumer};
//!
//! let consumer = RecordingConsumer::new();
//! let action = CountingAction::new();
//!
//! let router = RouterBuilder::<MyEvent>::new()
//!     .add_consumer::<Notify, _>(consumer.record())
//!     .add_action::<Beep, _>(action.run())
//!     .build();
//!
//! // ... route effects ...
//!
//! assert_eq!(consumer.latest(), Some(Notify { id: 7 }));
//! assert_eq!(action.run_count(), 3);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::core::{Effect, Event};
use crate::handler::{EventSink, Handler};

/// Consumer fixture that records every effect it observes.
pub struct RecordingConsumer<F> {
    values: Arc<Mutex<Vec<F>>>,
}

impl<F: Send + 'static> RecordingConsumer<F> {
    /// Create a consumer with an empty record.
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The closure to register via `add_consumer`.
    pub fn record(&self) -> impl Fn(F) + Send + Sync + 'static {
        let values = self.values.clone();
        move |effect| {
            values.lock().unwrap().push(effect);
        }
    }

    /// The most recently observed effect, if any.
    pub fn latest(&self) -> Option<F>
    where
        F: Clone,
    {
        self.values.lock().unwrap().last().cloned()
    }

    /// All observed effects, in observation order.
    pub fn values(&self) -> Vec<F>
    where
        F: Clone,
    {
        self.values.lock().unwrap().clone()
    }

    /// Number of effects observed so far.
    pub fn observed_count(&self) -> usize {
        self.values.lock().unwrap().len()
    }
}

impl<F: Send + 'static> Default for RecordingConsumer<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Action fixture that counts how many times it ran.
pub struct CountingAction {
    runs: Arc<AtomicUsize>,
}

impl CountingAction {
    /// Create an action with a zero run count.
    pub fn new() -> Self {
        Self {
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The closure to register via `add_action`.
    pub fn run(&self) -> impl Fn() + Send + Sync + 'static {
        let runs = self.runs.clone();
        move || {
            runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Number of times the action has run.
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Default for CountingAction {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler fixture that fails every effect with a fixed message.
pub struct FailingHandler {
    message: &'static str,
}

impl FailingHandler {
    /// Create a handler that fails with the given message.
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[async_trait]
impl<F: Effect, Ev: Event> Handler<F, Ev> for FailingHandler {
    async fn handle(&self, _effect: F, _events: &EventSink<Ev>) -> Result<()> {
        Err(anyhow!(self.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_consumer_records_in_order() {
        let consumer = RecordingConsumer::new();
        let record = consumer.record();

        record(1u32);
        record(2u32);
        record(3u32);

        assert_eq!(consumer.values(), vec![1, 2, 3]);
        assert_eq!(consumer.latest(), Some(3));
        assert_eq!(consumer.observed_count(), 3);
    }

    #[test]
    fn test_counting_action_counts() {
        let action = CountingAction::new();
        let run = action.run();

        run();
        run();

        assert_eq!(action.run_count(), 2);
    }
}
