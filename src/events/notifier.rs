//! Notifier Module
//!
//! Synchronous multi-subscriber dispatcher keyed by event kind.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

// == Event Trait ==
/// A payload that can be dispatched through a [`Notifier`].
///
/// `Kind` is the finite key subscribers register under; every event reports
/// which kind it belongs to.
pub trait Event {
    /// Discriminant used as the subscription key
    type Kind: Copy + Eq + Hash + Debug;

    /// Returns the kind of this event.
    fn kind(&self) -> Self::Kind;
}

/// Subscriber callback. Identity is the `Arc` allocation, so subscribing a
/// clone of the same handler twice registers it once.
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Wraps a closure into a [`Handler`].
pub fn handler<E, F>(f: F) -> Handler<E>
where
    F: Fn(&E) + Send + Sync + 'static,
{
    Arc::new(f)
}

type Registry<E> = Mutex<HashMap<<E as Event>::Kind, Vec<Handler<E>>>>;

// == Notifier ==
/// Mapping from event kind to an ordered set of handlers.
pub struct Notifier<E: Event> {
    registry: Arc<Registry<E>>,
}

impl<E: Event> Notifier<E> {
    // == Constructor ==
    /// Creates a notifier with no subscribers.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // == Subscribe ==
    /// Registers `handler` under `kind`.
    ///
    /// Re-registering the identical handler is a no-op. The returned
    /// [`Subscription`] can be used to unsubscribe later; dropping it keeps
    /// the handler registered.
    pub fn subscribe(&self, kind: E::Kind, handler: Handler<E>) -> Subscription<E> {
        {
            let mut registry = self.registry.lock();
            let handlers = registry.entry(kind).or_default();
            if !handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
                handlers.push(Arc::clone(&handler));
            }
        }

        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            handler,
        }
    }

    // == Unsubscribe ==
    /// Removes `handler` from `kind` if present.
    pub fn unsubscribe(&self, kind: E::Kind, handler: &Handler<E>) {
        remove_handler(&self.registry, kind, handler);
    }

    // == Emit ==
    /// Invokes every handler subscribed under the event's kind, in
    /// subscription order, and returns how many were called.
    ///
    /// Handlers are snapshotted first; a handler may subscribe or unsubscribe
    /// without affecting the current pass.
    pub fn emit(&self, event: &E) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler<E>> = self
            .registry
            .lock()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        trace!("Emitting {:?} to {} subscriber(s)", kind, handlers.len());

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    // == Clear ==
    /// Removes every handler registered under `kind`.
    pub fn clear(&self, kind: E::Kind) {
        self.registry.lock().remove(&kind);
    }

    /// Number of handlers currently registered under `kind`.
    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.registry.lock().get(&kind).map_or(0, Vec::len)
    }
}

impl<E: Event> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        let mut map = f.debug_map();
        for (kind, handlers) in registry.iter() {
            map.entry(kind, &handlers.len());
        }
        map.finish()
    }
}

// == Subscription ==
/// Handle returned by [`Notifier::subscribe`].
pub struct Subscription<E: Event> {
    registry: Weak<Registry<E>>,
    kind: E::Kind,
    handler: Handler<E>,
}

impl<E: Event> Subscription<E> {
    /// Same as calling [`Notifier::unsubscribe`] with the original arguments.
    /// Does nothing if the notifier is gone.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            remove_handler(&registry, self.kind, &self.handler);
        }
    }

    /// The handler this subscription registered.
    pub fn handler(&self) -> &Handler<E> {
        &self.handler
    }
}

impl<E: Event> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

fn remove_handler<E: Event>(registry: &Registry<E>, kind: E::Kind, handler: &Handler<E>) {
    let mut registry = registry.lock();
    if let Some(handlers) = registry.get_mut(&kind) {
        handlers.retain(|h| !Arc::ptr_eq(h, handler));
        if handlers.is_empty() {
            registry.remove(&kind);
        }
    }
}
