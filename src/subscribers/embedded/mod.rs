//! # Built-in subscribers
//!
//! These are small, self-contained implementations useful for demos and debugging.
//!
//! - [`LogWriter`]: renders events as `tracing` records.

mod log;

pub use log::LogWriter;
