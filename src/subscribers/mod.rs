//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] that fans
//! scheduler events out to every subscriber through its own bounded queue.
//!
//! ## Architecture
//! ```text
//! Scheduler ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet::emit
//!                                                                 ┌──────┼──────┐
//!                                                                 ▼      ▼      ▼
//!                                                            LogWriter Metrics Custom
//! ```
//!
//! ## Built-in subscribers
//! - `LogWriter` (feature `logging`) renders events as `tracing` records.

mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
mod embedded;

pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
