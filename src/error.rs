//! Error types used by the scheduler, its providers and their work.
//!
//! This module defines two main error enums:
//!
//! - [`TaskError`]: errors returned by user conditions and work functions.
//! - [`ProcessError`]: the outcome of a failed [`Scheduler::process`](crate::Scheduler::process) cycle.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::fmt::Display;
use std::sync::Arc;

use thiserror::Error;

/// # Errors produced by conditions and work.
///
/// A condition or a work function returns `Err(TaskError)` to signal that it could not
/// complete. The scheduler decides what to do with the provider from *where* the error
/// came from, not from its variant (see [`ProcessError`]).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The cancellation token handed to the condition or work was cancelled.
    #[error("context cancelled")]
    Canceled,

    /// The condition or work panicked; the panic was caught by the scheduler.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use serialvisor::TaskError;
    ///
    /// let err = TaskError::fail("connection refused");
    /// assert_eq!(err.to_string(), "execution failed: connection refused");
    /// ```
    pub fn fail(error: impl Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "context cancelled".to_string(),
            TaskError::Panicked { info } => format!("panic: {info}"),
        }
    }

    /// Returns `true` for [`TaskError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    /// Builds [`TaskError::Panicked`] from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let info = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        TaskError::Panicked { info }
    }
}

/// # Errors produced by one scheduling cycle.
///
/// [`Scheduler::process`](crate::Scheduler::process) returns at most one of these per call,
/// always *after* the scheduler has dropped or rescheduled the provider involved:
///
/// | Variant       | Provider afterwards |
/// |---------------|---------------------|
/// | `Condition`   | dropped             |
/// | `Canceled`    | dropped             |
/// | `Work`        | rescheduled         |
/// | `Interrupted` | untouched           |
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ProcessError {
    /// The provider's condition failed or panicked; the provider was dropped.
    #[error("condition of provider {provider:?} failed: {source}")]
    Condition {
        /// Name of the dropped provider.
        provider: Arc<str>,
        /// Error returned by the condition.
        source: TaskError,
    },

    /// The provider's work failed or panicked; the provider was rescheduled regardless.
    #[error("work of provider {provider:?} failed: {source}")]
    Work {
        /// Name of the rescheduled provider.
        provider: Arc<str>,
        /// Error returned by the work.
        source: TaskError,
    },

    /// The token passed to `schedule` was cancelled; the provider was dropped.
    #[error("provider {provider:?} cancelled")]
    Canceled {
        /// Name of the dropped provider.
        provider: Arc<str>,
    },

    /// The token passed to `process` was cancelled before any evaluation resolved.
    #[error("process interrupted")]
    Interrupted,
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use serialvisor::ProcessError;
    ///
    /// let err = ProcessError::Canceled { provider: "poll".into() };
    /// assert_eq!(err.as_label(), "process_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::Condition { .. } => "process_condition_failed",
            ProcessError::Work { .. } => "process_work_failed",
            ProcessError::Canceled { .. } => "process_canceled",
            ProcessError::Interrupted => "process_interrupted",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ProcessError::Condition { provider, source } => {
                format!("condition failed: provider={provider} {}", source.as_message())
            }
            ProcessError::Work { provider, source } => {
                format!("work failed: provider={provider} {}", source.as_message())
            }
            ProcessError::Canceled { provider } => format!("cancelled: provider={provider}"),
            ProcessError::Interrupted => "process interrupted".to_string(),
        }
    }

    /// Indicates a cancellation rather than a failure.
    ///
    /// Returns `true` for [`ProcessError::Canceled`] and [`ProcessError::Interrupted`].
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ProcessError::Canceled { .. } | ProcessError::Interrupted
        )
    }

    /// Name of the provider involved, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            ProcessError::Condition { provider, .. }
            | ProcessError::Work { provider, .. }
            | ProcessError::Canceled { provider } => Some(provider),
            ProcessError::Interrupted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_rendered() {
        let err = TaskError::from_panic(Box::new("boom"));
        assert_eq!(
            err,
            TaskError::Panicked {
                info: "boom".into()
            }
        );

        let err = TaskError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err.as_message(), "panic: owned boom");

        let err = TaskError::from_panic(Box::new(42_u32));
        assert_eq!(err.as_label(), "task_panicked");
        assert_eq!(err.as_message(), "panic: unknown panic");
    }

    #[test]
    fn cancellation_classification() {
        assert!(ProcessError::Interrupted.is_cancellation());
        assert!(ProcessError::Canceled { provider: "p".into() }.is_cancellation());

        let work = ProcessError::Work {
            provider: "p".into(),
            source: TaskError::fail("x"),
        };
        assert!(!work.is_cancellation());
        assert_eq!(work.provider(), Some("p"));
        assert_eq!(ProcessError::Interrupted.provider(), None);
    }

    #[test]
    fn labels_are_stable() {
        let cond = ProcessError::Condition {
            provider: "p".into(),
            source: TaskError::Canceled,
        };
        assert_eq!(cond.as_label(), "process_condition_failed");
        assert_eq!(cond.as_message(), "condition failed: provider=p context cancelled");
        assert_eq!(TaskError::fail("x").as_label(), "task_failed");
        assert!(TaskError::Canceled.is_canceled());
    }
}
