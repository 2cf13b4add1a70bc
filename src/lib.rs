//! Fetchguard - concurrency-control primitives for async workloads
//!
//! Provides a bounded job runner, a deduplicating TTL cache with
//! stale-while-revalidate reads and a keyed resource lock, all reporting
//! through a small typed pub/sub notifier. A demo HTTP service in [`api`]
//! puts them in front of a slow upstream.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod models;
pub mod runner;

pub use api::AppState;
pub use cache::{CacheConfig, MapCache};
pub use config::Config;
pub use error::{ApiError, Error};
pub use events::Notifier;
pub use lock::ResourceLock;
pub use runner::{JobHandle, JobRunner};
