//! Runner Module
//!
//! Concurrency-limited execution of async jobs.

mod bounded;
mod job;

pub use bounded::{JobRunner, DEFAULT_MAX_JOBS};
pub use job::JobHandle;
