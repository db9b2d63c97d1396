//! # Gate: reusable single-shot wakeup with generational rearm.
//!
//! A [`Gate`] holds one *generation* at a time. A generation is a completion marker
//! that can be notified exactly once; waiters that grabbed the generation complete
//! as soon as it is notified.
//!
//! ```text
//!   wait()  ──► clone current generation ──► await until notified
//!   notify() ─► complete current generation (no-op if already complete)
//!   reset() ──► if current is complete: install a fresh generation
//!               otherwise: keep it (a pending notify is never discarded)
//! ```
//!
//! ## Rules
//! - `notify` and `reset` are serialized by the gate's lock, so a notify that races a
//!   reset either lands on the old generation *before* it is replaced (and is then
//!   redundant) or on the new one (and wakes the next waiter).
//! - Redundant notifies before the next `reset` produce a single wakeup.
//! - The gate never fails; waiting only blocks while nobody notifies.
//!
//! [`Signal`] is the cloneable, notify-only handle given to external code.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// One generation of a [`Gate`].
#[derive(Default)]
struct Generation {
    fired: AtomicBool,
    notify: Notify,
}

impl Generation {
    fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Marks the generation complete; returns `false` if it already was.
    fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    async fn fired(&self) {
        loop {
            // Register before checking the flag: `notify_waiters` wakes every
            // `Notified` created before the call, polled or not.
            let notified = self.notify.notified();
            if self.is_fired() {
                return;
            }
            notified.await;
        }
    }
}

/// Thread-safe single-notification-per-generation wakeup primitive.
///
/// # Example
/// ```
/// use serialvisor::Gate;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let gate = Gate::new();
/// let waiter = gate.wait();
///
/// gate.notify();
/// gate.notify(); // redundant, same generation
/// waiter.await;
///
/// gate.reset();
/// assert!(!gate.is_notified());
/// # }
/// ```
#[derive(Default)]
pub struct Gate {
    current: Mutex<Arc<Generation>>,
}

impl Gate {
    /// Creates a gate with a fresh, not yet notified generation.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Arc<Generation>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a future that completes once the generation current *now* is notified.
    ///
    /// The future owns its generation: a later [`reset`](Self::reset) does not affect it.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let generation = Arc::clone(&self.lock());
        async move { generation.fired().await }
    }

    /// Completes the current generation. No-op if it is already complete.
    pub fn notify(&self) {
        let current = self.lock();
        current.fire();
    }

    /// Installs a fresh generation if (and only if) the current one is complete.
    pub fn reset(&self) {
        let mut current = self.lock();
        if current.is_fired() {
            *current = Arc::new(Generation::default());
        }
    }

    /// Returns whether the current generation has been notified.
    pub fn is_notified(&self) -> bool {
        self.lock().is_fired()
    }
}

/// External wakeup handle of a signal-gated provider.
///
/// Cheap to clone and safe to use from any thread.
#[derive(Clone)]
pub struct Signal {
    gate: Arc<Gate>,
}

impl Signal {
    pub(crate) fn new(gate: Arc<Gate>) -> Self {
        Self { gate }
    }

    /// Wakes the provider. Several calls before it is served count as one.
    pub fn notify(&self) {
        self.gate.notify();
    }

    /// Returns whether a notification is waiting to be served.
    pub fn is_pending(&self) -> bool {
        self.gate.is_notified()
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("pending", &self.is_pending())
            .finish()
    }
}
