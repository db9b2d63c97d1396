//! Pending evaluation bookkeeping.
//!
//! Every evaluation runs as its own task on the scheduler's `JoinSet` and returns the
//! [`Ticket`] it was started with, so the winner of `join_next` maps straight back to
//! its [`Slot`].

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::providers::{Outcome, ProviderRef};

/// Identity of one pending evaluation (unique per scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Ticket(pub(crate) u64);

/// What an evaluation task hands back to the scheduler.
pub(crate) type Resolved = (Ticket, Result<Outcome, TaskError>);

/// One in-flight evaluation.
pub(crate) struct Slot {
    pub(crate) provider: ProviderRef,
    /// Token given to `schedule`; reused verbatim on reschedule.
    pub(crate) token: CancellationToken,
    /// 1-based cycle number of the provider within this scheduler.
    pub(crate) cycle: u64,
}

/// Evaluates `provider`, turning a panic in its condition into [`TaskError::Panicked`].
pub(crate) async fn evaluate(
    ticket: Ticket,
    provider: ProviderRef,
    token: CancellationToken,
) -> Resolved {
    let res = AssertUnwindSafe(provider.evaluate(token))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(TaskError::from_panic(panic)));
    (ticket, res)
}
