//! Scheduler core: pending evaluations, serial execution and configuration.
//!
//! The only public API from this module is [`Scheduler`] with its
//! [`SchedulerBuilder`] and [`SchedulerConfig`].
//!
//! Internal modules:
//! - [`scheduler`]: races evaluations, runs work, applies the drop/reschedule policy;
//! - [`slot`]: tickets and the per-evaluation bookkeeping;
//! - [`builder`]: wires the event bus and subscribers;
//! - [`config`]: scheduler settings.

mod builder;
mod config;
mod scheduler;
mod slot;

pub use builder::SchedulerBuilder;
pub use config::SchedulerConfig;
pub use scheduler::Scheduler;
