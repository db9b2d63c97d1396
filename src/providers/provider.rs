//! # Provider: a condition paired with a unit of work.
//!
//! A [`Provider`] is evaluated repeatedly by the [`Scheduler`](crate::Scheduler):
//!
//! ```text
//! evaluate(token)
//!   ├─ invalidated?        ─► Ok(NotReady)          (condition not touched)
//!   ├─ token cancelled?    ─► Err(Canceled)
//!   ├─ condition.arm(token)
//!   │     ├─ Wait::Stop    ─► Ok(NotReady)
//!   │     └─ Wait::Continue(fut)
//!   │            select! { token.cancelled() ─► Err(Canceled),
//!   │                      fut              ─► Ok(()) ─► Ok(Ready(work))
//!   │                                          Err(e) ─► Err(e) }
//! ```
//!
//! ## Construction
//! - [`Provider::new`] / [`Provider::from_fn`]: custom condition;
//! - [`Provider::every`]: fixed delay, repeats every `delay`;
//! - [`Provider::on_signal`]: gated by a [`Signal`] handed back to the caller.
//!
//! ## Rules
//! - Identity is the [`ProviderId`] assigned at construction; names are for humans.
//! - [`Provider::invalidate`] is one-way. It does not interrupt an evaluation already
//!   in flight; every later evaluation resolves to [`Outcome::NotReady`].

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::gate::{Gate, Signal};
use crate::providers::condition::{Condition, ConditionFn, Delay, GateCondition, Wait};
use crate::providers::work::{WorkFn, WorkRef};

/// Global counter for provider identities.
static PROVIDER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Shared handle to a provider.
pub type ProviderRef = Arc<Provider>;

/// Process-unique provider identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(u64);

impl ProviderId {
    fn next() -> Self {
        Self(PROVIDER_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of a successful evaluation.
pub enum Outcome {
    /// The condition is satisfied; run this work.
    Ready(WorkRef),
    /// Nothing to do: the provider was invalidated or its condition stopped.
    NotReady,
}

impl Outcome {
    /// Returns `true` for [`Outcome::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ready(_) => f.write_str("Ready(..)"),
            Outcome::NotReady => f.write_str("NotReady"),
        }
    }
}

/// A readiness condition paired with a unit of work.
pub struct Provider {
    id: ProviderId,
    name: Cow<'static, str>,
    work: WorkRef,
    condition: Arc<dyn Condition>,
    valid: AtomicBool,
}

impl Provider {
    /// Creates a provider from a work handle and a condition.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        work: WorkRef,
        condition: Arc<dyn Condition>,
    ) -> ProviderRef {
        Arc::new(Self {
            id: ProviderId::next(),
            name: name.into(),
            work,
            condition,
            valid: AtomicBool::new(true),
        })
    }

    /// Creates a provider from two closures.
    ///
    /// The condition answers [`Wait::Stop`] once the provider has nothing left to do.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use tokio_util::sync::CancellationToken;
    /// use serialvisor::{Provider, Wait};
    ///
    /// // Runs three times, then stops.
    /// let left = Arc::new(AtomicU32::new(3));
    /// let provider = Provider::from_fn(
    ///     "three-shots",
    ///     |_ctx: CancellationToken| async { Ok(()) },
    ///     move |_ctx: CancellationToken| {
    ///         if left.fetch_sub(1, Ordering::SeqCst) > 0 { Wait::ready() } else { Wait::Stop }
    ///     },
    /// );
    /// assert!(provider.is_valid());
    /// ```
    pub fn from_fn<W, Fut, C>(name: impl Into<Cow<'static, str>>, work: W, condition: C) -> ProviderRef
    where
        W: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
        C: Fn(CancellationToken) -> Wait + Send + Sync + 'static,
    {
        Self::new(name, WorkFn::arc(work), Arc::new(ConditionFn::new(condition)))
    }

    /// Creates a periodic provider: its work runs every `delay` until invalidated,
    /// cancelled or dropped.
    ///
    /// The delay starts when the provider is (re)scheduled, i.e. after the previous
    /// run finished.
    pub fn every<W, Fut>(name: impl Into<Cow<'static, str>>, work: W, delay: Duration) -> ProviderRef
    where
        W: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::new(name, WorkFn::arc(work), Arc::new(Delay::new(delay)))
    }

    /// Creates a signal-gated provider and returns it with its wakeup handle.
    ///
    /// The work runs once per served notification; notifications arriving before the
    /// provider is served collapse into one run.
    ///
    /// # Example
    /// ```
    /// use tokio_util::sync::CancellationToken;
    /// use serialvisor::Provider;
    ///
    /// let (provider, signal) = Provider::on_signal("drain", |_ctx: CancellationToken| async { Ok(()) });
    /// signal.notify();
    /// assert!(signal.is_pending());
    /// # let _ = provider;
    /// ```
    pub fn on_signal<W, Fut>(name: impl Into<Cow<'static, str>>, work: W) -> (ProviderRef, Signal)
    where
        W: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let gate = Arc::new(Gate::new());
        let signal = Signal::new(Arc::clone(&gate));
        let provider = Self::new(name, WorkFn::arc(work), Arc::new(GateCondition::new(gate)));
        (provider, signal)
    }

    /// Process-unique identity.
    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the provider has not been invalidated.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Permanently disables the provider. Idempotent.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    /// Waits for the condition under `ctx`.
    ///
    /// Returns `Err` when the condition fails or `ctx` is cancelled; never maps
    /// either of those to [`Outcome::NotReady`].
    pub async fn evaluate(&self, ctx: CancellationToken) -> Result<Outcome, TaskError> {
        if !self.is_valid() {
            return Ok(Outcome::NotReady);
        }
        if ctx.is_cancelled() {
            return Err(TaskError::Canceled);
        }

        let fut = match self.condition.arm(ctx.clone()) {
            Wait::Continue(fut) => fut,
            Wait::Stop => return Ok(Outcome::NotReady),
        };

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(TaskError::Canceled),
            res = fut => res.map(|()| Outcome::Ready(Arc::clone(&self.work))),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("valid", &self.is_valid())
            .finish()
    }
}
