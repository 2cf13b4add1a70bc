//! Cache lifecycle events.

use crate::events::Event;

/// Emitted by [`MapCache`](super::MapCache) on every store and removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent<K, V> {
    /// A value was stored, by `set` or by a completed fetch
    Set { id: K, data: V, expire_at: u64 },
    /// An entry was removed, explicitly or because it had expired
    Delete { id: K },
}

/// Subscription key for [`CacheEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEventKind {
    Set,
    Delete,
}

impl<K, V> Event for CacheEvent<K, V> {
    type Kind = CacheEventKind;

    fn kind(&self) -> CacheEventKind {
        match self {
            CacheEvent::Set { .. } => CacheEventKind::Set,
            CacheEvent::Delete { .. } => CacheEventKind::Delete,
        }
    }
}
