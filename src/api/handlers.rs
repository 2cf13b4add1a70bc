//! API Handlers
//!
//! HTTP request handlers for the demo service. Reads go through the cache
//! with the simulated upstream as fallback, writes and refreshes are
//! serialized per id by the resource lock, and sweeps run on a bounded runner.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, info};

use super::upstream::{Item, ItemSource, Upstream, UpstreamError};
use crate::cache::{
    current_timestamp_ms, CacheConfig, CacheEvent, CacheEventKind, FetchOutcome, MapCache,
};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::events::handler;
use crate::lock::{LockEvent, LockEventKind, ResourceLock};
use crate::models::{
    DeleteResponse, HealthResponse, ItemResponse, SetItemRequest, SetResponse, StatsResponse,
    SweepResponse,
};
use crate::runner::JobRunner;

type Load = BoxFuture<'static, std::result::Result<Option<Item>, UpstreamError>>;

/// Why an id is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockPurpose {
    Refresh,
    Write,
}

/// Application state shared across all handlers.
///
/// Every member is a cheap handle onto shared storage, so cloning the state
/// per request is fine.
#[derive(Clone)]
pub struct AppState {
    pub cache: MapCache<String, Item, UpstreamError>,
    pub locks: ResourceLock<String, LockPurpose>,
    /// Runs [`MapCache::clean`] under a concurrency limit
    pub sweeper: JobRunner<usize>,
    pub upstream: Arc<Upstream>,
}

impl AppState {
    /// Creates a new AppState around the given upstream.
    pub fn new(cache_config: CacheConfig, max_sweep_jobs: usize, upstream: Upstream) -> Self {
        let cache = MapCache::with_config(cache_config);
        let sweep_cache = cache.clone();
        let sweeper = JobRunner::new(move || {
            let cache = sweep_cache.clone();
            async move { cache.clean() }
        })
        .with_max_jobs(max_sweep_jobs);

        Self {
            cache,
            locks: ResourceLock::new(),
            sweeper,
            upstream: Arc::new(upstream),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.cache_config(),
            config.max_sweep_jobs,
            Upstream::new(config.upstream_latency()),
        )
    }

    /// Logs cache and lock events through `tracing`.
    pub fn install_event_logging(&self) {
        self.cache.events().subscribe(
            CacheEventKind::Set,
            handler(|ev: &CacheEvent<String, Item>| {
                if let CacheEvent::Set { id, expire_at, .. } = ev {
                    info!("Cached '{}' until {}", id, expire_at);
                }
            }),
        );
        self.cache.events().subscribe(
            CacheEventKind::Delete,
            handler(|ev: &CacheEvent<String, Item>| {
                if let CacheEvent::Delete { id } = ev {
                    info!("Evicted '{}'", id);
                }
            }),
        );
        self.locks.events().subscribe(
            LockEventKind::Locked,
            handler(|ev: &LockEvent<String, LockPurpose>| {
                if let LockEvent::Locked { id, resource } = ev {
                    debug!("'{}' locked for {:?}", id, resource);
                }
            }),
        );
        self.locks.events().subscribe(
            LockEventKind::Unlocked,
            handler(|ev: &LockEvent<String, LockPurpose>| {
                if let LockEvent::Unlocked { id, resource } = ev {
                    debug!("'{}' released after {:?}", id, resource);
                }
            }),
        );
    }

    /// Fallback loading `id` from the upstream source.
    fn loader(&self, id: String) -> impl FnOnce() -> Load {
        let upstream = Arc::clone(&self.upstream);
        move || async move { upstream.load(id).await }.boxed()
    }
}

/// Maps a fetch outcome onto the item or the matching API error.
fn settle(id: String, outcome: FetchOutcome<Item, UpstreamError>) -> Result<Item> {
    match outcome {
        Ok(Ok(Some(item))) => Ok(item),
        Ok(Ok(None)) => Err(ApiError::NotFound(id)),
        Ok(Err(err)) => Err(ApiError::Upstream(err.to_string())),
        Err(err) => Err(err.into()),
    }
}

/// Handler for GET /items/:id
///
/// Serves the cached item, loading it from upstream when absent. An expired
/// item is served with `stale: true` while it is refreshed in the background.
pub async fn get_item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>> {
    let (served, stale) = state
        .cache
        .get_with_staleness(id.clone(), state.loader(id.clone()));
    let outcome = served.await;
    let item = settle(id, outcome)?;

    Ok(Json(ItemResponse { item, stale }))
}

/// Handler for PUT /items/:id
///
/// Stores a value for `id` unless another write or refresh holds it.
pub async fn set_item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetItemRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let expire_at = req
        .ttl_ms
        .map(|ttl| current_timestamp_ms().saturating_add(ttl));
    let item = Item::new(id.clone(), req.value, ItemSource::Manual);
    let cache = state.cache.clone();
    let key = id.clone();

    let write = state
        .locks
        .run(id.clone(), LockPurpose::Write, move || async move {
            cache.set(key, item, expire_at)
        })
        .ok_or_else(|| ApiError::Conflict(id.clone()))?;
    write.await?;

    Ok(Json(SetResponse::new(id)))
}

/// Handler for DELETE /items/:id
pub async fn delete_item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if state.locks.is_locked(&id) {
        return Err(ApiError::Conflict(id));
    }
    state.cache.remove(&id);

    Ok(Json(DeleteResponse::new(id)))
}

/// Handler for POST /items/:id/refresh
///
/// Reloads `id` from upstream, bypassing any stored value. Refused while
/// another write or refresh holds the id.
pub async fn refresh_item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>> {
    let cache = state.cache.clone();
    let fallback = state.loader(id.clone());
    let key = id.clone();

    let refresh = state
        .locks
        .run(id.clone(), LockPurpose::Refresh, move || {
            cache.fetch(key, fallback)
        })
        .ok_or_else(|| ApiError::Conflict(id.clone()))?;
    let item = settle(id, refresh.await?)?;

    Ok(Json(ItemResponse { item, stale: false }))
}

/// Handler for POST /sweep
///
/// Removes expired entries, unless the sweep limit is already reached.
pub async fn sweep_handler(State(state): State<AppState>) -> Result<Json<SweepResponse>> {
    let sweep = state
        .sweeper
        .run()
        .ok_or_else(|| ApiError::Busy("sweep limit reached".to_string()))?;
    let removed = sweep.await?;

    Ok(Json(SweepResponse { removed }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.stats();
    let mut locked = state.locks.locked_ids();
    locked.sort();

    Json(StatsResponse {
        hit_rate: cache.hit_rate(),
        cache,
        active_sweeps: state.sweeper.active_job_count(),
        max_sweeps: state.sweeper.max_jobs(),
        locked,
        upstream_loads: state.upstream.load_count(),
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn test_state() -> AppState {
        AppState::new(CacheConfig::default(), 1, Upstream::new(Duration::ZERO))
    }

    fn set_request(value: serde_json::Value) -> SetItemRequest {
        SetItemRequest {
            value,
            ttl_ms: None,
        }
    }

    #[tokio::test]
    async fn test_get_loads_once_then_serves_cached() {
        let state = test_state();

        let first = get_item_handler(State(state.clone()), Path("a".to_string()))
            .await
            .unwrap();
        let second = get_item_handler(State(state.clone()), Path("a".to_string()))
            .await
            .unwrap();

        assert_eq!(first.item.source, ItemSource::Upstream);
        assert_eq!(first.item, second.item);
        assert!(!second.stale);
        assert_eq!(state.upstream.load_count(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_and_broken() {
        let state = test_state();

        let missing = get_item_handler(State(state.clone()), Path("missing-x".to_string())).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));

        let broken = get_item_handler(State(state.clone()), Path("broken-x".to_string())).await;
        assert!(matches!(broken, Err(ApiError::Upstream(_))));

        assert!(state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_set_then_get_manual_item() {
        let state = test_state();

        set_item_handler(
            State(state.clone()),
            Path("k".to_string()),
            Json(set_request(json!({"name": "hello"}))),
        )
        .await
        .unwrap();

        let response = get_item_handler(State(state.clone()), Path("k".to_string()))
            .await
            .unwrap();
        assert_eq!(response.item.source, ItemSource::Manual);
        assert_eq!(response.item.payload, json!({"name": "hello"}));
        assert_eq!(state.upstream.load_count(), 0);
        assert!(!state.locks.is_locked(&"k".to_string()));
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state();

        let result = set_item_handler(
            State(state),
            Path("k".to_string()),
            Json(set_request(serde_json::Value::Null)),
        )
        .await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_set_refused_while_locked() {
        let state = test_state();
        let _held = state.locks.run(
            "k".to_string(),
            LockPurpose::Refresh,
            std::future::pending::<()>,
        );

        let result = set_item_handler(
            State(state.clone()),
            Path("k".to_string()),
            Json(set_request(json!(1))),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));

        let result = delete_item_handler(State(state.clone()), Path("k".to_string())).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_expired_item_served_stale() {
        let state = test_state();
        state.cache.set(
            "k".to_string(),
            Item::new("k", json!("old"), ItemSource::Manual),
            Some(0),
        );

        let response = get_item_handler(State(state.clone()), Path("k".to_string()))
            .await
            .unwrap();

        assert!(response.stale);
        assert_eq!(response.item.payload, json!("old"));
        assert!(state.cache.is_fetching(&"k".to_string()));
    }

    #[tokio::test]
    async fn test_refresh_replaces_value() {
        let state = test_state();
        state.cache.set(
            "k".to_string(),
            Item::new("k", json!("old"), ItemSource::Manual),
            None,
        );

        let response = refresh_item_handler(State(state.clone()), Path("k".to_string()))
            .await
            .unwrap();

        assert_eq!(response.item.source, ItemSource::Upstream);
        assert_eq!(
            state.cache.get_immediate(&"k".to_string()),
            Some(response.item.clone())
        );
        assert!(!state.locks.is_locked(&"k".to_string()));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state();
        get_item_handler(State(state.clone()), Path("k".to_string()))
            .await
            .unwrap();

        delete_item_handler(State(state.clone()), Path("k".to_string()))
            .await
            .unwrap();

        assert!(state.cache.get_immediate(&"k".to_string()).is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_expired() {
        let state = test_state();
        let item = Item::new("k", json!(1), ItemSource::Manual);
        state.cache.set("old".to_string(), item.clone(), Some(0));
        state.cache.set("fresh".to_string(), item, None);

        let response = sweep_handler(State(state.clone())).await.unwrap();

        assert_eq!(response.removed, 1);
        assert_eq!(state.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_busy_at_limit() {
        let state = test_state();
        let _running = state.sweeper.run();

        let result = sweep_handler(State(state)).await;
        assert!(matches!(result, Err(ApiError::Busy(_))));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();
        get_item_handler(State(state.clone()), Path("a".to_string()))
            .await
            .unwrap();
        get_item_handler(State(state.clone()), Path("a".to_string()))
            .await
            .unwrap();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.cache.hits, 1);
        assert_eq!(response.cache.misses, 1);
        assert_eq!(response.cache.total_entries, 1);
        assert_eq!(response.max_sweeps, 1);
        assert_eq!(response.upstream_loads, 1);
        assert!(response.locked.is_empty());
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
