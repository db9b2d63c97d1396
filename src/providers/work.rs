//! # Work abstraction and function-backed work implementation.
//!
//! [`Work`] is the unit a provider runs once its condition is satisfied. The common
//! handle type is [`WorkRef`], an `Arc<dyn Work>` that the scheduler hands back out of
//! a ready evaluation.
//!
//! [`WorkFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`, producing a fresh
//! future per run. No state is shared between runs; if you need it, capture an
//! `Arc<...>` explicitly.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use serialvisor::{TaskError, WorkFn, WorkRef};
//!
//! let w: WorkRef = WorkFn::arc(|ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     // do work...
//!     Ok(())
//! });
//! # let _ = w;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Boxed future produced by one run of a [`Work`].
pub type BoxWorkFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

/// Shared handle to a unit of work.
pub type WorkRef = Arc<dyn Work>;

/// # Asynchronous, cancelable unit of work.
///
/// The token passed to [`spawn`](Work::spawn) is the one given to
/// [`Scheduler::process`](crate::Scheduler::process); implementations should check it
/// and return early when the driver is shutting down.
pub trait Work: Send + Sync + 'static {
    /// Creates the future for one run.
    fn spawn(&self, ctx: CancellationToken) -> BoxWorkFuture;
}

/// Function-backed work.
#[derive(Debug)]
pub struct WorkFn<F> {
    f: F,
}

impl<F> WorkFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> Work for WorkFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn spawn(&self, ctx: CancellationToken) -> BoxWorkFuture {
        Box::pin((self.f)(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn each_spawn_runs_the_closure_again() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let work: WorkRef = WorkFn::arc(move |_ctx: CancellationToken| {
            let r = Arc::clone(&r);
            async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let first = work.spawn(CancellationToken::new());
        let second = work.spawn(CancellationToken::new());
        assert_eq!(runs.load(Ordering::SeqCst), 0, "futures are lazy");

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_is_forwarded() {
        let work = WorkFn::new(|ctx: CancellationToken| async move {
            if ctx.is_cancelled() {
                Err(TaskError::Canceled)
            } else {
                Ok(())
            }
        });
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(work.spawn(token).await, Err(TaskError::Canceled));
    }
}
