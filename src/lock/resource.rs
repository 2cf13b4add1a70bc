//! Resource Lock Module
//!
//! Per-key mutual exclusion for async operations. A key is locked from the
//! moment an operation is admitted for it until that operation settles.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::events::{Event, Notifier};
use crate::runner::JobHandle;

// == Lock Events ==
/// Emitted by [`ResourceLock`] when a key changes state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent<K, R> {
    Locked { id: K, resource: R },
    Unlocked { id: K, resource: R },
}

/// Subscription key for [`LockEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockEventKind {
    Locked,
    Unlocked,
}

impl<K, R> Event for LockEvent<K, R> {
    type Kind = LockEventKind;

    fn kind(&self) -> LockEventKind {
        match self {
            LockEvent::Locked { .. } => LockEventKind::Locked,
            LockEvent::Unlocked { .. } => LockEventKind::Unlocked,
        }
    }
}

struct Inner<K, R> {
    locked: Mutex<HashMap<K, R>>,
    events: Notifier<LockEvent<K, R>>,
}

/// Unlocks its key when the guarded operation settles, whatever the outcome.
struct LockGuard<K: Eq + Hash + Clone + Debug, R: Clone> {
    inner: Arc<Inner<K, R>>,
    id: K,
    resource: R,
}

impl<K: Eq + Hash + Clone + Debug, R: Clone> Drop for LockGuard<K, R> {
    fn drop(&mut self) {
        self.inner.locked.lock().remove(&self.id);
        debug!("Unlocked {:?}", self.id);
        self.inner.events.emit(&LockEvent::Unlocked {
            id: self.id.clone(),
            resource: self.resource.clone(),
        });
    }
}

// == Resource Lock ==
/// Associates a caller-supplied resource tag with a key while an operation
/// for that key runs, and refuses a second operation on the same key.
///
/// The resource is never inspected: admission depends on the key alone.
/// Clones share the same lock table.
pub struct ResourceLock<K, R> {
    inner: Arc<Inner<K, R>>,
}

impl<K, R> ResourceLock<K, R>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a lock table with nothing locked.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                locked: Mutex::new(HashMap::new()),
                events: Notifier::new(),
            }),
        }
    }

    /// Locked/unlocked notifications.
    pub fn events(&self) -> &Notifier<LockEvent<K, R>> {
        &self.inner.events
    }

    // == Run ==
    /// Locks `id` with `resource`, invokes `operation` once and spawns it.
    ///
    /// Returns `None` without invoking `operation` when `id` is already
    /// locked; the existing resource is left as is. The lock is released and
    /// an unlocked event emitted when the operation settles, including on
    /// failure or panic.
    ///
    /// # Panics
    /// Panics when an operation is admitted outside a Tokio runtime.
    pub fn run<F, Fut>(&self, id: K, resource: R, operation: F) -> Option<JobHandle<Fut::Output>>
    where
        F: FnOnce() -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        {
            let mut locked = self.inner.locked.lock();
            if locked.contains_key(&id) {
                debug!("{:?} is locked, run not admitted", id);
                return None;
            }
            locked.insert(id.clone(), resource.clone());
        }

        debug!("Locked {:?}", id);
        let guard = LockGuard {
            inner: Arc::clone(&self.inner),
            id: id.clone(),
            resource: resource.clone(),
        };
        self.inner.events.emit(&LockEvent::Locked { id, resource });

        let job = operation();
        Some(JobHandle::spawn(async move {
            let _lock = guard;
            job.await
        }))
    }

    // == Introspection ==
    /// Returns whether `id` is currently locked.
    pub fn is_locked(&self, id: &K) -> bool {
        self.inner.locked.lock().contains_key(id)
    }

    /// Returns the resource `id` is locked with, if any.
    pub fn locked_resource(&self, id: &K) -> Option<R> {
        self.inner.locked.lock().get(id).cloned()
    }

    /// Returns the number of currently locked keys.
    pub fn locked_count(&self) -> usize {
        self.inner.locked.lock().len()
    }

    /// Snapshot of the currently locked keys, in no particular order.
    pub fn locked_ids(&self) -> Vec<K> {
        self.inner.locked.lock().keys().cloned().collect()
    }
}

impl<K, R> Default for ResourceLock<K, R>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, R> Clone for ResourceLock<K, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, R> fmt::Debug for ResourceLock<K, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLock")
            .field("locked", &self.inner.locked.lock().len())
            .finish()
    }
}
