//! # Scheduler configuration.
//!
//! Provides [`SchedulerConfig`] centralized settings for a [`Scheduler`](crate::Scheduler).
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by [`SchedulerConfig::bus_capacity_clamped`]

use std::borrow::Cow;

/// Configuration of one scheduler instance.
///
/// ## Field semantics
/// - `name`: label attached to the scheduler's `tracing` records
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Name of the scheduler, used in log records.
    pub name: Cow<'static, str>,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,
}

impl SchedulerConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a copy with a different name.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `name = "scheduler"`
    /// - `bus_capacity = 1024` (good baseline)
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("scheduler"),
            bus_capacity: 1024,
        }
    }
}
