//! API Handlers
//!
//! HTTP request handlers for the read-mostly diagnostic endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use regex::Regex;

use crate::cache::{EntryInfo, KeyListing, MetricsSnapshot, QueryCache, DEFAULT_LIST_LIMIT};
use crate::config::{CacheConfig, CacheConfigUpdate};
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, HealthResponse, InvalidateRequest, InvalidateResponse,
    ListKeysQuery,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache handle
    pub cache: QueryCache,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: QueryCache) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(QueryCache::new(config.cache.clone()))
    }
}

/// Handler for GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.cache.get_metrics().await)
}

/// Handler for GET /keys
///
/// Lists live keys, most accessed first, optionally filtered by `pattern`.
pub async fn list_keys_handler(
    State(state): State<AppState>,
    Query(query): Query<ListKeysQuery>,
) -> Result<Json<Vec<KeyListing>>> {
    let pattern = query.regex()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);

    Ok(Json(state.cache.list_keys(pattern.as_ref(), limit).await))
}

/// Handler for GET /keys/:key
pub async fn key_info_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<EntryInfo>> {
    state
        .cache
        .get_key_info(&key)
        .await
        .map(Json)
        .ok_or(CacheError::NotFound(key))
}

/// Handler for DELETE /keys/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if state.cache.delete(&key).await {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for DELETE /keys
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let store = state.cache.store();
    let mut store = store.write().await;
    let cleared = store.len();
    store.clear();

    Json(ClearResponse::new(cleared))
}

/// Handler for POST /invalidate
///
/// Removes entries matching any of the given tags and/or the key pattern.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    // Compile before touching the cache so a bad pattern removes nothing
    let pattern = req.pattern.as_deref().map(Regex::new).transpose()?;

    let mut invalidated = 0;
    if !req.tags.is_empty() {
        let tags: Vec<&str> = req.tags.iter().map(String::as_str).collect();
        invalidated += state.cache.invalidate_by_tags(&tags).await;
    }
    if let Some(pattern) = pattern {
        invalidated += state.cache.invalidate_by_pattern(&pattern).await;
    }

    Ok(Json(InvalidateResponse { invalidated }))
}

/// Handler for PUT /config
///
/// Applies a partial configuration and returns the effective one.
pub async fn config_handler(
    State(state): State<AppState>,
    Json(update): Json<CacheConfigUpdate>,
) -> Json<CacheConfig> {
    Json(state.cache.configure(update).await)
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(QueryCache::default())
    }

    #[tokio::test]
    async fn test_key_info_handler() {
        let state = state();
        state.cache.set("user:1", "alice", None, &["users"]).await.unwrap();

        let info = key_info_handler(State(state.clone()), Path("user:1".to_string()))
            .await
            .unwrap();
        assert_eq!(info.key, "user:1");
        assert_eq!(info.tags, vec!["users".to_string()]);

        let missing = key_info_handler(State(state), Path("nope".to_string())).await;
        assert!(matches!(missing, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = state();
        state.cache.set("to_delete", "value", None, &[]).await.unwrap();

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = delete_handler(State(state), Path("to_delete".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalidate_handler_tags_and_pattern() {
        let state = state();
        state.cache.set("user:1", "a", None, &["users"]).await.unwrap();
        state.cache.set("invoice:1", "b", None, &[]).await.unwrap();
        state.cache.set("other", "c", None, &[]).await.unwrap();

        let req = InvalidateRequest {
            tags: vec!["users".to_string()],
            pattern: Some("^invoice:".to_string()),
        };
        let response = invalidate_handler(State(state.clone()), Json(req))
            .await
            .unwrap();

        assert_eq!(response.invalidated, 2);
        assert!(state.cache.has("other").await);
    }

    #[tokio::test]
    async fn test_invalidate_handler_bad_pattern_removes_nothing() {
        let state = state();
        state.cache.set("user:1", "a", None, &["users"]).await.unwrap();

        let req = InvalidateRequest {
            tags: vec!["users".to_string()],
            pattern: Some("(".to_string()),
        };
        let result = invalidate_handler(State(state.clone()), Json(req)).await;

        assert!(matches!(result, Err(CacheError::InvalidPattern(_))));
        assert!(state.cache.has("user:1").await);
    }

    #[tokio::test]
    async fn test_clear_handler() {
        let state = state();
        state.cache.set("a", "1", None, &[]).await.unwrap();
        state.cache.set("b", "2", None, &[]).await.unwrap();

        let response = clear_handler(State(state.clone())).await;

        assert_eq!(response.cleared, 2);
        assert_eq!(state.cache.get_metrics().await.total_keys, 0);
    }

    #[tokio::test]
    async fn test_config_handler() {
        let state = state();

        let update = CacheConfigUpdate {
            max_keys: Some(5),
            ..Default::default()
        };
        let response = config_handler(State(state.clone()), Json(update)).await;

        assert_eq!(response.max_keys, 5);
        assert_eq!(state.cache.config().await.max_keys, 5);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
