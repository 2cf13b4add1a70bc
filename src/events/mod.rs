//! Events Module
//!
//! Typed publish/subscribe used by the cache and the resource lock to announce
//! lifecycle changes to observers.

mod notifier;

pub use notifier::{handler, Event, Handler, Notifier, Subscription};
