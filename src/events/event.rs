//! # Runtime events emitted by the scheduler.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Cycle events**: one provider's path through `schedule`/`process`
//! - **Terminal events**: the provider left the scheduler (dropped, cancelled, faulted)
//! - **Subscriber events**: delivery problems of the fan-out itself
//!
//! The [`Event`] struct carries additional metadata such as timestamps, provider name,
//! cycle number and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use serialvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WorkFailed)
//!     .with_provider("poll-status")
//!     .with_reason("boom")
//!     .with_cycle(3);
//!
//! assert_eq!(ev.kind, EventKind::WorkFailed);
//! assert_eq!(ev.provider.as_deref(), Some("poll-status"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::providers::Provider;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `provider`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `provider`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Cycle events ===
    /// A provider was registered and its evaluation started.
    ///
    /// Sets:
    /// - `provider`, `provider_id`
    /// - `cycle`: cycle number this evaluation belongs to (1-based)
    ProviderScheduled,

    /// A provider's condition was satisfied and its work is about to run.
    ///
    /// Sets: `provider`, `provider_id`, `cycle`
    ProviderReady,

    /// Work finished successfully.
    ///
    /// Sets: `provider`, `provider_id`, `cycle`
    WorkCompleted,

    /// Work returned an error or panicked. The provider is rescheduled anyway.
    ///
    /// Sets: `provider`, `provider_id`, `cycle`, `reason`
    WorkFailed,

    /// The provider was put back for another cycle after its work ran.
    ///
    /// Sets: `provider`, `provider_id`, `cycle` (the next one)
    ProviderRescheduled,

    // === Terminal events ===
    /// The provider's condition failed or panicked; the provider was dropped.
    ///
    /// Sets: `provider`, `provider_id`, `cycle`, `reason`
    ConditionFailed,

    /// The provider's schedule token was cancelled; the provider was dropped.
    ///
    /// Sets: `provider`, `provider_id`, `cycle`
    ProviderCanceled,

    /// The provider resolved to "not ready" (invalidated or stopped) and was dropped.
    ///
    /// Sets: `provider`, `provider_id`, `cycle`, `reason` ("invalidated" or "stopped")
    ProviderDropped,

    /// All pending evaluations were aborted by `Scheduler::clear`.
    ///
    /// Sets: `reason` (number of aborted evaluations)
    SchedulerCleared,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the provider (or subscriber), if applicable.
    pub provider: Option<Arc<str>>,
    /// Numeric provider identity, if applicable.
    pub provider_id: Option<u64>,
    /// Cycle number of the provider (starting from 1).
    pub cycle: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            provider: None,
            provider_id: None,
            cycle: None,
            reason: None,
        }
    }

    /// Creates an event describing `provider`.
    pub(crate) fn for_provider(kind: EventKind, provider: &Provider, cycle: u64) -> Self {
        Event::new(kind)
            .with_provider(provider.name())
            .with_provider_id(provider.id().get())
            .with_cycle(cycle)
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a provider name.
    #[inline]
    pub fn with_provider(mut self, provider: impl Into<Arc<str>>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attaches a provider identity.
    #[inline]
    pub fn with_provider_id(mut self, id: u64) -> Self {
        self.provider_id = Some(id);
        self
    }

    /// Attaches a cycle number.
    #[inline]
    pub fn with_cycle(mut self, n: u64) -> Self {
        self.cycle = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_provider(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_provider(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// Returns `true` for events after which the provider is no longer scheduled.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ConditionFailed | EventKind::ProviderCanceled | EventKind::ProviderDropped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::ProviderScheduled);
        let b = Event::new(EventKind::ProviderReady);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn subscriber_helpers_fill_fields() {
        let ev = Event::subscriber_overflow("metrics", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.provider.as_deref(), Some("metrics"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=metrics reason=full"));
        assert!(!ev.is_terminal());
    }

    #[test]
    fn terminal_kinds() {
        assert!(Event::new(EventKind::ProviderDropped).is_terminal());
        assert!(Event::new(EventKind::ProviderCanceled).is_terminal());
        assert!(Event::new(EventKind::ConditionFailed).is_terminal());
        assert!(!Event::new(EventKind::WorkFailed).is_terminal());
    }
}
