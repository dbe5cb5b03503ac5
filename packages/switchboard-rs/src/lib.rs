//! # Switchboard
//!
//! An in-process effect router: each effect is dispatched to exactly one
//! registered handler, and all handlers' events merge into a single output
//! stream.
//!
//! ## Core Concepts
//!
//! Switchboard separates **intent** from **outcome**:
//! - [`Effect`] = Intent (a request for side work, routed to one handler)
//! - [`Event`] = Outcome (what the handler produced, fed back to the caller)
//!
//! The key principle: **One Effect = One Variant = One Handler**. Every
//! effect value is a concrete Rust type; that type is its variant, so a value
//! can never belong to two branches and registration collisions reduce to a
//! duplicate-type check.
//!
//! ## Architecture
//!
//! ```text
//! effect stream
//!     │
//!     ▼ route()
//! Classifier (by TypeId) ──► no match? ──► Err(UnknownEffect), all torn down
//!     │
//!     ├─► Branch A ─► Handler A ──┐
//!     │                           │
//!     ├─► Branch B ─► Handler B ──┼─► merged EventStream
//!     │                           │
//!     └─► Branch C ─► Handler C ──┘
//!                 │
//!                 └─► Err? ─► fatal-error observer, then Err terminates all
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Exactly-once dispatch** - each effect instance reaches at most one
//!    branch
//! 2. **Collisions rejected at registration** - never discovered at dispatch
//! 3. **Snapshots are immutable** - builder mutation after `build()` is
//!    invisible to existing routers
//! 4. **Per-branch ordering** - one variant's effects are performed in order;
//!    cross-branch interleaving is unspecified
//! 5. **First error wins** - at most one terminal error, siblings cancelled
//! 6. **Fail fast** - no retries anywhere; every failure signals
//!    misconfiguration or a handler fault
//!
//! ## Example
//!
//! ```ignore
//! use switchboard::{async_trait, Effect, EventSink, Handler, RouterBuilder};
//!
//! // 1. Define effects (intent), one type per variant
//! #[derive(Debug, Clone)]
//! struct SaveUser { user_id: Uuid }
//! impl Effect for SaveUser {}
//!
//! #[derive(Debug, Clone)]
//! struct LogLine { text: String }
//! impl Effect for LogLine {}
//!
//! // 2. Define the event type (outcome)
//! #[derive(Debug, Clone)]
//! enum UserEvent {
//!     Saved { user_id: Uuid },
//! }
//!
//! // 3. Define handlers
//! struct SaveUserHandler { db: Pool }
//!
//! #[async_trait]
//! impl Handler<SaveUser, UserEvent> for SaveUserHandler {
//!     async fn handle(&self, effect: SaveUser, events: &EventSink<UserEvent>) -> anyhow::Result<()> {
//!         self.db.save(effect.user_id).await?;
//!         events.emit(UserEvent::Saved { user_id: effect.user_id });
//!         Ok(())
//!     }
//! }
//!
//! // 4. Register and build the immutable router
//! let router = RouterBuilder::<UserEvent>::new()
//!     .add::<SaveUser, _>(SaveUserHandler { db })
//!     .add_consumer::<LogLine, _>(|line: LogLine| println!("{}", line.text))
//!     .build();
//!
//! // 5. Apply it to an effect stream (any number of times)
//! let mut events = router.route(effect_stream);
//! while let Some(event) = events.next().await {
//!     match event {
//!         Ok(event) => feed_back(event),
//!         Err(fatal) => break,
//!     }
//! }
//! ```
//!
//! ## What This Is Not
//!
//! Switchboard is **not**:
//! - The surrounding effect-handling loop (it neither produces effects nor
//!   consumes events)
//! - A job system (no retries, no persistence, no scheduling)
//! - A message broker (no delivery guarantees across processes)
//!
//! Switchboard **is**:
//! > The dispatch/demultiplex engine of a unidirectional effect-handling
//! > architecture: classify, route to exactly one handler, merge, fail fast.

// Core modules
mod core;
mod engine;
mod error;
mod fatal;
mod handler;
mod router;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;


// Re-export core traits
pub use crate::core::{AnyEffect, Effect, Event};

// Re-export error types
pub use crate::error::RouterError;

// Re-export handler types
pub use crate::handler::{EventSink, Handler};

// Re-export router types (primary entry point)
pub use crate::router::{Router, RouterBuilder, RouterDescription};

// Re-export engine types
pub use crate::engine::EventStream;

// Re-export fatal-error hook types
pub use crate::fatal::{FatalErrorHook, FatalObserver};

// Re-export commonly used external types
pub use async_trait::async_trait;
