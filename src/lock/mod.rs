//! Lock Module
//!
//! Keyed mutual exclusion with lock/unlock notifications.

mod resource;

pub use resource::{LockEvent, LockEventKind, ResourceLock};
