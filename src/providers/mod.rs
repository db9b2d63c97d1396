//! # Providers: work gated by readiness conditions.
//!
//! This module provides the provider-related types:
//! - [`Provider`] - a condition paired with work, shared as [`ProviderRef`]
//! - [`Condition`] - trait for readiness conditions, answering [`Wait`]
//! - [`Work`] - trait for the unit of work, with the closure adapter [`WorkFn`]

mod condition;
mod provider;
mod work;

pub use condition::{BoxWaitFuture, Condition, ConditionFn, Delay, GateCondition, Wait};
pub use provider::{Outcome, Provider, ProviderId, ProviderRef};
pub use work::{BoxWorkFuture, Work, WorkFn, WorkRef};
