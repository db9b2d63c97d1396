//! # Readiness conditions.
//!
//! A [`Condition`] is armed once per evaluation and answers with a [`Wait`]:
//! - [`Wait::Continue`] carries the future to await before the work may run;
//! - [`Wait::Stop`] means there is nothing left to wait for and the provider is finished.
//!
//! Built-in conditions:
//! - [`ConditionFn`]: any closure `Fn(CancellationToken) -> Wait`;
//! - [`Delay`]: sleep for a fixed duration;
//! - [`GateCondition`]: wait for a [`Gate`] notification, then rearm the gate.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::gate::Gate;

/// Boxed future a condition resolves through.
pub type BoxWaitFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

/// Answer of [`Condition::arm`].
pub enum Wait {
    /// Await this future; `Ok(())` means the work may run.
    Continue(BoxWaitFuture),
    /// No further waiting is possible; the provider is finished.
    Stop,
}

impl Wait {
    /// Boxes `fut` into [`Wait::Continue`].
    pub fn until<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Wait::Continue(Box::pin(fut))
    }

    /// A condition that is satisfied immediately.
    pub fn ready() -> Self {
        Wait::until(std::future::ready(Ok(())))
    }
}

impl std::fmt::Debug for Wait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Wait::Continue(_) => f.write_str("Wait::Continue(..)"),
            Wait::Stop => f.write_str("Wait::Stop"),
        }
    }
}

/// Readiness condition of a provider.
pub trait Condition: Send + Sync + 'static {
    /// Arms the condition for one evaluation.
    ///
    /// `ctx` is the token the provider was scheduled with. The scheduler already
    /// races the returned future against it, so honoring it here is optional.
    fn arm(&self, ctx: CancellationToken) -> Wait;
}

/// Closure-backed condition.
#[derive(Debug)]
pub struct ConditionFn<F> {
    f: F,
}

impl<F> ConditionFn<F>
where
    F: Fn(CancellationToken) -> Wait + Send + Sync + 'static,
{
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Condition for ConditionFn<F>
where
    F: Fn(CancellationToken) -> Wait + Send + Sync + 'static,
{
    fn arm(&self, ctx: CancellationToken) -> Wait {
        (self.f)(ctx)
    }
}

/// Fixed-delay condition: ready `delay` after being armed.
#[derive(Debug, Clone, Copy)]
pub struct Delay {
    delay: Duration,
}

impl Delay {
    /// Creates a delay condition.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// The configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Condition for Delay {
    fn arm(&self, _ctx: CancellationToken) -> Wait {
        let delay = self.delay;
        Wait::until(async move {
            tokio::time::sleep(delay).await;
            Ok(())
        })
    }
}

/// Signal-driven condition: ready once its [`Gate`] is notified.
///
/// Cancellation of `ctx` ends the wait with [`TaskError::Canceled`] and takes priority
/// over a notification observed at the same time. The gate is rearmed as soon as the
/// wait ends, i.e. *before* the work runs, so a notification arriving while the work
/// executes triggers the next cycle. A wait that is dropped before it ends leaves the
/// gate as it was.
pub struct GateCondition {
    gate: Arc<Gate>,
}

impl GateCondition {
    /// Creates a condition over `gate`.
    pub fn new(gate: Arc<Gate>) -> Self {
        Self { gate }
    }
}

impl Condition for GateCondition {
    fn arm(&self, ctx: CancellationToken) -> Wait {
        let gate = Arc::clone(&self.gate);
        Wait::until(async move {
            let res = tokio::select! {
                biased;
                _ = ctx.cancelled() => Err(TaskError::Canceled),
                _ = gate.wait() => Ok(()),
            };
            gate.reset();
            res
        })
    }
}
