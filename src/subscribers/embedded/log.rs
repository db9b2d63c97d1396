//! # LogWriter: events as `tracing` records
//!
//! A minimal subscriber that forwards incoming [`Event`]s to `tracing`. Install any
//! `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output
//! ```text
//! DEBUG serialvisor: scheduled provider="poll" id=3 cycle=1
//!  INFO serialvisor: ready provider="poll" id=3 cycle=1
//!  WARN serialvisor: work failed provider="poll" id=3 cycle=1 reason="execution failed: refused"
//! DEBUG serialvisor: rescheduled provider="poll" id=3 cycle=2
//!  INFO serialvisor: dropped provider="drain" id=4 cycle=5 reason="invalidated"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let provider = e.provider.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        let (id, cycle) = (e.provider_id.unwrap_or(0), e.cycle.unwrap_or(0));

        match e.kind {
            EventKind::ProviderScheduled => {
                debug!(target: "serialvisor", seq = e.seq, provider, id, cycle, "scheduled");
            }
            EventKind::ProviderReady => {
                info!(target: "serialvisor", seq = e.seq, provider, id, cycle, "ready");
            }
            EventKind::WorkCompleted => {
                debug!(target: "serialvisor", seq = e.seq, provider, id, cycle, "work completed");
            }
            EventKind::WorkFailed => {
                warn!(target: "serialvisor", seq = e.seq, provider, id, cycle, reason, "work failed");
            }
            EventKind::ProviderRescheduled => {
                debug!(target: "serialvisor", seq = e.seq, provider, id, cycle, "rescheduled");
            }
            EventKind::ConditionFailed => {
                warn!(target: "serialvisor", seq = e.seq, provider, id, cycle, reason, "condition failed");
            }
            EventKind::ProviderCanceled => {
                info!(target: "serialvisor", seq = e.seq, provider, id, cycle, "cancelled");
            }
            EventKind::ProviderDropped => {
                info!(target: "serialvisor", seq = e.seq, provider, id, cycle, reason, "dropped");
            }
            EventKind::SchedulerCleared => {
                info!(target: "serialvisor", seq = e.seq, reason, "cleared");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "serialvisor", seq = e.seq, subscriber = provider, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                warn!(target: "serialvisor", seq = e.seq, subscriber = provider, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
