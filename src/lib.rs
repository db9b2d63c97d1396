//! # serialvisor
//!
//! **Serialvisor** is a serial, condition-gated task scheduler for tokio.
//!
//! It multiplexes any number of independently gated work sources ("providers")
//! onto one strictly serialized execution stream. Each provider waits for its own
//! condition (a timer, an external signal, or any async predicate); the scheduler
//! races all conditions, runs the winner's work to completion, then re-arms or drops
//! the provider depending on how that cycle went.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Provider   │   │   Provider   │   │   Provider   │
//!     │  every(10ms) │   │  on_signal   │   │   from_fn    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ schedule         │ schedule         │ schedule
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scheduler                                                        │
//! │  - JoinSet of evaluations (conditions run concurrently)           │
//! │  - slots: Ticket → (Provider, CancellationToken)                  │
//! │  - Bus (broadcast events) ──► SubscriberSet (optional)            │
//! └───────────────────────────────┬───────────────────────────────────┘
//!                                 │ process(): first evaluation to resolve
//!                                 ▼
//!                       ┌────────────────────┐
//!                       │  work (serial,     │──► reschedule / drop
//!                       │  one per process)  │
//!                       └────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! schedule(provider, token) ──► evaluate(token) spawned
//!
//! loop {                         (driver: Scheduler::run or your own loop)
//!   process(token)
//!     ├─ condition faulted   ─► drop, Err(Condition)
//!     ├─ token cancelled     ─► drop, Err(Canceled)
//!     ├─ not ready           ─► drop, Ok
//!     └─ ready ─► work(token) ─► reschedule (always) ─► Ok / Err(Work)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Scheduling**    | Race conditions, run work serially, reschedule or drop.      | [`Scheduler`]                              |
//! | **Providers**     | Custom, fixed-delay and signal-gated work sources.           | [`Provider`], [`Condition`], [`Work`]      |
//! | **Signals**       | Reusable wakeup primitive with generational rearm.          | [`Gate`], [`Signal`]                       |
//! | **Errors**        | Typed errors for cycles and user code.                       | [`ProcessError`], [`TaskError`]            |
//! | **Subscriber API**| Hook into scheduler events (logging, metrics).               | [`Subscribe`], [`Event`]                   |
//! | **Configuration** | Scheduler name and event bus sizing.                         | [`SchedulerConfig`]                        |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] that renders events via `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use serialvisor::{Provider, Scheduler};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), serialvisor::ProcessError> {
//!     let mut scheduler = Scheduler::new();
//!     let token = CancellationToken::new();
//!
//!     let polls = Arc::new(AtomicU32::new(0));
//!     let p = Arc::clone(&polls);
//!     let poll = Provider::every("poll", move |_ctx: CancellationToken| {
//!         let p = Arc::clone(&p);
//!         async move {
//!             p.fetch_add(1, Ordering::SeqCst);
//!             Ok(())
//!         }
//!     }, Duration::from_millis(5));
//!
//!     scheduler.schedule(poll.clone(), token.clone());
//!     for _ in 0..3 {
//!         scheduler.process(&token).await?;
//!     }
//!     assert_eq!(polls.load(Ordering::SeqCst), 3);
//!
//!     // Invalidated providers are dropped at their next evaluation, which ends the loop.
//!     poll.invalidate();
//!     scheduler.run(&token).await?;
//!     assert!(scheduler.is_empty());
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod gate;
mod providers;
mod subscribers;

// ---- Public re-exports ----

pub use core::{Scheduler, SchedulerBuilder, SchedulerConfig};
pub use error::{ProcessError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use gate::{Gate, Signal};
pub use providers::{
    BoxWaitFuture, BoxWorkFuture, Condition, ConditionFn, Delay, GateCondition, Outcome,
    Provider, ProviderId, ProviderRef, Wait, Work, WorkFn, WorkRef,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
