//! # Scheduler: races provider conditions, runs their work one at a time.
//!
//! The [`Scheduler`] owns the table of pending evaluations. Each evaluation runs as a
//! task on an internal `JoinSet`, so conditions make progress concurrently with each
//! other and with the work currently executing. Work itself only ever runs inside
//! [`Scheduler::process`], one run per call.
//!
//! ## Cycle
//! ```text
//! schedule(provider, token)
//!   └─► JoinSet.spawn(provider.evaluate(token)) ──► slots[ticket] = (provider, token)
//!
//! process(token)
//!   ├─ no slots ─────────────────────────────────────► Ok(())
//!   ├─ join_next()  (first evaluation to resolve wins)
//!   │     ├─ Err(Canceled) / Ready with token cancelled ─► drop,  Err(Canceled)
//!   │     ├─ Err(e) / condition panic ───────────────────► drop,  Err(Condition)
//!   │     ├─ Ok(NotReady) ───────────────────────────────► drop,  Ok(())
//!   │     └─ Ok(Ready(work))
//!   │            ├─► work.spawn(token).await   (serial, panics caught)
//!   │            └─► cleanup (always): reschedule with the schedule token
//!   │                  ├─ work Ok  ─► Ok(())
//!   │                  └─ work Err ─► Err(Work)
//!   └─ token cancelled while racing ─────────────────► Err(Interrupted)
//! ```
//!
//! ## Rules
//! - At most one pending evaluation per provider; a second `schedule` returns `false`.
//! - Work never overlaps: `process` takes `&mut self` and awaits the work to the end.
//! - Bookkeeping is settled before `process` returns, error or not.
//! - No fairness: a provider whose condition is always satisfied can starve others.
//! - No backoff: a provider that is always ready and always fails is retried in a tight
//!   loop. Guard against it in the caller, e.g. by invalidating it after N failures.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace, warn};

use crate::core::builder::SchedulerBuilder;
use crate::core::config::SchedulerConfig;
use crate::core::slot::{self, Resolved, Slot, Ticket};
use crate::error::{ProcessError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::providers::{Outcome, ProviderId, ProviderRef, WorkRef};

/// Serial, condition-gated task scheduler.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use serialvisor::{Provider, Scheduler};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), serialvisor::ProcessError> {
/// let mut scheduler = Scheduler::new();
/// let token = CancellationToken::new();
///
/// let (provider, signal) = Provider::on_signal("drain", |_ctx: CancellationToken| async {
///     println!("drained");
///     Ok(())
/// });
/// assert!(scheduler.schedule(provider.clone(), token.clone()));
///
/// signal.notify();
/// scheduler.process(&token).await?; // runs the work once
///
/// // An evaluation that is already armed may serve this notify; the one after it
/// // resolves "not ready" and the provider is dropped, which ends `run`.
/// provider.invalidate();
/// signal.notify();
/// scheduler.run(&token).await?;
/// assert!(scheduler.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct Scheduler {
    cfg: SchedulerConfig,
    bus: Bus,
    evaluations: JoinSet<Resolved>,
    slots: HashMap<Ticket, Slot>,
    tracked: HashSet<ProviderId>,
    next_ticket: u64,
    /// Stops the subscriber listener (if any) when the scheduler goes away.
    _listener: Option<DropGuard>,
}

impl Scheduler {
    /// Creates a scheduler with default configuration and no subscribers.
    pub fn new() -> Self {
        SchedulerBuilder::new(SchedulerConfig::default()).build()
    }

    /// Returns a builder to attach configuration and subscribers.
    pub fn builder(cfg: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(cfg)
    }

    pub(crate) fn from_parts(cfg: SchedulerConfig, bus: Bus, listener: Option<CancellationToken>) -> Self {
        Self {
            cfg,
            bus,
            evaluations: JoinSet::new(),
            slots: HashMap::new(),
            tracked: HashSet::new(),
            next_ticket: 0,
            _listener: listener.map(CancellationToken::drop_guard),
        }
    }

    /// Configuration this scheduler was built with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    /// Subscribes to the events this scheduler publishes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// `true` iff nothing is pending and no provider is tracked.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.tracked.is_empty()
    }

    /// Number of pending evaluations.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether `provider` is currently scheduled here.
    pub fn is_scheduled(&self, provider: &ProviderRef) -> bool {
        self.tracked.contains(&provider.id())
    }

    /// Sorted names of the providers with a pending evaluation.
    pub fn pending(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .values()
            .map(|s| s.provider.name().to_string())
            .collect();
        names.sort_unstable();
        names
    }

    /// Registers `provider` and starts evaluating it under `token`.
    ///
    /// Returns `false` (and does nothing) if the provider already has a pending
    /// evaluation here. Invalidated providers are accepted; they are dropped by the
    /// next [`process`](Self::process) that picks them up.
    ///
    /// # Panics
    /// When called outside of a tokio runtime.
    pub fn schedule(&mut self, provider: ProviderRef, token: CancellationToken) -> bool {
        if !self.tracked.insert(provider.id()) {
            debug!(
                scheduler = %self.cfg.name,
                provider = provider.name(),
                id = %provider.id(),
                "provider already scheduled"
            );
            return false;
        }
        self.bus
            .publish(Event::for_provider(EventKind::ProviderScheduled, &provider, 1));
        self.start(&Handle::current(), Slot {
            provider,
            token,
            cycle: 1,
        });
        true
    }

    /// Advances one scheduling cycle.
    ///
    /// Waits for the first pending evaluation to resolve, then either drops the
    /// provider or runs its work to completion and reschedules it. See the module docs
    /// for the full decision table.
    ///
    /// `token` is handed to the work. Cancelling it while no evaluation has resolved
    /// yet returns [`ProcessError::Interrupted`] without touching any state; once the
    /// work started, `process` waits for it.
    ///
    /// If the returned future is dropped while the work runs, the provider is still
    /// rescheduled.
    pub async fn process(&mut self, token: &CancellationToken) -> Result<(), ProcessError> {
        let (slot, res) = loop {
            if self.slots.is_empty() {
                return Ok(());
            }
            let joined = tokio::select! {
                biased;
                joined = self.evaluations.join_next() => joined,
                _ = token.cancelled() => return Err(ProcessError::Interrupted),
            };
            let (ticket, res) = match joined {
                Some(Ok(resolved)) => resolved,
                Some(Err(err)) => {
                    // Only aborted evaluations end up here; panics are caught in `slot::evaluate`.
                    warn!(scheduler = %self.cfg.name, error = %err, "evaluation task did not finish");
                    continue;
                }
                None => return Ok(()),
            };
            match self.slots.remove(&ticket) {
                Some(slot) => break (slot, res),
                None => continue,
            }
        };

        let provider = Arc::clone(&slot.provider);
        let cycle = slot.cycle;
        let name: Arc<str> = Arc::from(provider.name());

        let work = match res {
            Ok(Outcome::Ready(_)) if slot.token.is_cancelled() => {
                return Err(self.drop_canceled(&slot));
            }
            Err(TaskError::Canceled) => return Err(self.drop_canceled(&slot)),
            Err(source) => {
                debug!(
                    scheduler = %self.cfg.name,
                    provider = %name,
                    id = %provider.id(),
                    cycle,
                    error = %source,
                    "condition failed, dropping provider"
                );
                self.forget(&slot);
                self.bus.publish(
                    Event::for_provider(EventKind::ConditionFailed, &provider, cycle)
                        .with_reason(source.to_string()),
                );
                return Err(ProcessError::Condition {
                    provider: name,
                    source,
                });
            }
            Ok(Outcome::NotReady) => {
                let reason = if provider.is_valid() { "stopped" } else { "invalidated" };
                trace!(
                    scheduler = %self.cfg.name,
                    provider = %name,
                    id = %provider.id(),
                    cycle,
                    reason,
                    "provider not ready, dropping"
                );
                self.forget(&slot);
                self.bus.publish(
                    Event::for_provider(EventKind::ProviderDropped, &provider, cycle).with_reason(reason),
                );
                return Ok(());
            }
            Ok(Outcome::Ready(work)) => work,
        };

        self.bus
            .publish(Event::for_provider(EventKind::ProviderReady, &provider, cycle));
        trace!(scheduler = %self.cfg.name, provider = %name, id = %provider.id(), cycle, "running work");

        let guard = Rearm {
            scheduler: self,
            slot: Some(slot),
        };
        let res = run_work(work, token.clone()).await;

        match &res {
            Ok(()) => guard
                .scheduler
                .bus
                .publish(Event::for_provider(EventKind::WorkCompleted, &provider, cycle)),
            Err(err) => {
                debug!(
                    scheduler = %guard.scheduler.cfg.name,
                    provider = %name,
                    id = %provider.id(),
                    cycle,
                    error = %err,
                    "work failed, rescheduling anyway"
                );
                guard.scheduler.bus.publish(
                    Event::for_provider(EventKind::WorkFailed, &provider, cycle)
                        .with_reason(err.to_string()),
                );
            }
        }
        drop(guard);

        res.map_err(|source| ProcessError::Work {
            provider: name,
            source,
        })
    }

    /// Drives the scheduler until `token` is cancelled or nothing is left to do.
    ///
    /// Cancellations ([`ProcessError::Canceled`], [`ProcessError::Interrupted`]) end
    /// the loop with `Ok(())`; any other error is returned and ends the loop too.
    pub async fn run(&mut self, token: &CancellationToken) -> Result<(), ProcessError> {
        while !token.is_cancelled() && !self.is_empty() {
            match self.process(token).await {
                Ok(()) => {}
                Err(err) if err.is_cancellation() => {
                    debug!(scheduler = %self.cfg.name, reason = err.as_label(), "driver loop stopped");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Aborts every pending evaluation and forgets all providers.
    pub fn clear(&mut self) {
        let aborted = self.slots.len();
        // Dropping the old set aborts its tasks.
        self.evaluations = JoinSet::new();
        self.slots.clear();
        self.tracked.clear();
        debug!(scheduler = %self.cfg.name, aborted, "scheduler cleared");
        self.bus.publish(
            Event::new(EventKind::SchedulerCleared).with_reason(format!("aborted={aborted}")),
        );
    }

    fn start(&mut self, handle: &Handle, slot: Slot) {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.evaluations.spawn_on(
            slot::evaluate(ticket, Arc::clone(&slot.provider), slot.token.clone()),
            handle,
        );
        self.slots.insert(ticket, slot);
    }

    /// Puts a provider whose work just ran back into the race.
    fn reschedule(&mut self, slot: Slot) {
        let next = Slot {
            cycle: slot.cycle + 1,
            ..slot
        };
        match Handle::try_current() {
            Ok(handle) => {
                self.bus.publish(Event::for_provider(
                    EventKind::ProviderRescheduled,
                    &next.provider,
                    next.cycle,
                ));
                self.start(&handle, next);
            }
            Err(_) => {
                warn!(
                    scheduler = %self.cfg.name,
                    provider = next.provider.name(),
                    "no runtime to reschedule on, dropping provider"
                );
                self.forget(&next);
            }
        }
    }

    fn drop_canceled(&mut self, slot: &Slot) -> ProcessError {
        debug!(
            scheduler = %self.cfg.name,
            provider = slot.provider.name(),
            id = %slot.provider.id(),
            cycle = slot.cycle,
            "provider cancelled, dropping"
        );
        self.forget(slot);
        self.bus.publish(Event::for_provider(
            EventKind::ProviderCanceled,
            &slot.provider,
            slot.cycle,
        ));
        ProcessError::Canceled {
            provider: Arc::from(slot.provider.name()),
        }
    }

    fn forget(&mut self, slot: &Slot) {
        self.tracked.remove(&slot.provider.id());
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.cfg.name)
            .field("pending", &self.slots.len())
            .field("tracked", &self.tracked.len())
            .finish()
    }
}

/// Runs one work future, turning a panic into [`TaskError::Panicked`].
async fn run_work(work: WorkRef, token: CancellationToken) -> Result<(), TaskError> {
    AssertUnwindSafe(async move { work.spawn(token).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(TaskError::from_panic(panic)))
}

/// Reschedules the provider whose work is running once it is dropped, including when
/// the `process` future itself is dropped mid-work.
struct Rearm<'a> {
    scheduler: &'a mut Scheduler,
    slot: Option<Slot>,
}

impl Drop for Rearm<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.scheduler.reschedule(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Provider, Wait};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting(name: &'static str, runs: &Arc<AtomicUsize>) -> (ProviderRef, crate::Signal) {
        let runs = Arc::clone(runs);
        Provider::on_signal(name, move |_ctx: CancellationToken| {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn process_on_empty_scheduler_is_noop() {
        let mut sched = Scheduler::new();
        assert!(sched.is_empty());
        sched.process(&CancellationToken::new()).await.unwrap();
        assert!(sched.is_empty());
    }

    #[tokio::test]
    async fn duplicate_schedule_is_rejected() {
        let mut sched = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let (provider, _signal) = counting("p", &runs);
        let token = CancellationToken::new();

        assert!(sched.schedule(Arc::clone(&provider), token.clone()));
        assert!(!sched.schedule(Arc::clone(&provider), token));
        assert_eq!(sched.len(), 1);
        assert!(sched.is_scheduled(&provider));
        assert_eq!(sched.pending(), vec!["p".to_string()]);
    }

    #[tokio::test]
    async fn ready_provider_runs_and_is_rescheduled() {
        let mut sched = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let (provider, signal) = counting("p", &runs);
        let token = CancellationToken::new();
        sched.schedule(Arc::clone(&provider), token.clone());

        signal.notify();
        sched.process(&token).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(sched.len(), 1);
        assert!(sched.is_scheduled(&provider));
    }

    #[tokio::test]
    async fn stopped_condition_drops_silently() {
        let mut sched = Scheduler::new();
        let mut events = sched.subscribe();
        let provider = Provider::from_fn(
            "once",
            |_ctx: CancellationToken| async { Ok(()) },
            |_ctx: CancellationToken| Wait::Stop,
        );
        sched.schedule(provider, CancellationToken::new());

        sched.process(&CancellationToken::new()).await.unwrap();
        assert!(sched.is_empty());

        assert_eq!(events.recv().await.unwrap().kind, EventKind::ProviderScheduled);
        let dropped = events.recv().await.unwrap();
        assert_eq!(dropped.kind, EventKind::ProviderDropped);
        assert_eq!(dropped.reason.as_deref(), Some("stopped"));
    }

    #[tokio::test]
    async fn condition_failure_drops_and_propagates() {
        let mut sched = Scheduler::new();
        let provider = Provider::from_fn(
            "probe",
            |_ctx: CancellationToken| async { Ok(()) },
            |_ctx: CancellationToken| Wait::until(async { Err(TaskError::fail("io")) }),
        );
        sched.schedule(provider, CancellationToken::new());

        let err = sched.process(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ProcessError::Condition { ref source, .. } if *source == TaskError::fail("io")));
        assert_eq!(err.provider(), Some("probe"));
        assert!(sched.is_empty());
    }

    #[tokio::test]
    async fn work_panic_is_reported_and_rescheduled() {
        let mut sched = Scheduler::new();
        let provider = Provider::from_fn(
            "panicky",
            |_ctx: CancellationToken| async { panic!("work bug") },
            |_ctx: CancellationToken| Wait::ready(),
        );
        sched.schedule(Arc::clone(&provider), CancellationToken::new());

        let err = sched.process(&CancellationToken::new()).await.unwrap_err();
        match err {
            ProcessError::Work { source, .. } => assert_eq!(
                source,
                TaskError::Panicked {
                    info: "work bug".into()
                }
            ),
            other => panic!("unexpected {other:?}"),
        }
        assert!(sched.is_scheduled(&provider));
    }

    #[tokio::test]
    async fn ready_but_cancelled_never_runs_work() {
        let mut sched = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        // Ignores its token and is ready right away.
        let provider = Provider::from_fn(
            "eager",
            move |_ctx: CancellationToken| {
                let r = Arc::clone(&r);
                async move {
                    r.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            |_ctx: CancellationToken| Wait::ready(),
        );
        let token = CancellationToken::new();
        sched.schedule(provider, token.clone());
        tokio::task::yield_now().await;
        token.cancel();

        let err = sched.process(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ProcessError::Canceled { .. }));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(sched.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_process_keeps_state() {
        let mut sched = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let (provider, _signal) = counting("p", &runs);
        sched.schedule(provider, CancellationToken::new());

        let driver = CancellationToken::new();
        let d = driver.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            d.cancel();
        });

        let err = sched.process(&driver).await.unwrap_err();
        assert!(matches!(err, ProcessError::Interrupted));
        assert_eq!(sched.len(), 1);
    }

    #[tokio::test]
    async fn dropped_process_future_still_reschedules() {
        let mut sched = Scheduler::new();
        let (provider, signal) = Provider::on_signal("slow", |_ctx: CancellationToken| async {
            std::future::pending::<()>().await;
            Ok(())
        });
        sched.schedule(Arc::clone(&provider), CancellationToken::new());
        signal.notify();

        let token = CancellationToken::new();
        {
            let fut = sched.process(&token);
            tokio::pin!(fut);
            // Drive until the work is running, then abandon it.
            for _ in 0..10 {
                assert!(futures::poll!(fut.as_mut()).is_pending());
                tokio::task::yield_now().await;
            }
        }

        assert!(sched.is_scheduled(&provider));
        assert_eq!(sched.len(), 1);
    }

    #[tokio::test]
    async fn clear_aborts_everything() {
        let mut sched = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let (a, _sa) = counting("a", &runs);
        let (b, sb) = counting("b", &runs);
        let token = CancellationToken::new();
        sched.schedule(a, token.clone());
        sched.schedule(b, token.clone());

        sched.clear();
        assert!(sched.is_empty());

        sb.notify();
        sched.process(&token).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
