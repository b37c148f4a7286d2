//! HTTP surface for worker operations.
//!
//! Axum handlers and routing for liveness/readiness probes, stream
//! monitoring, Prometheus scraping, and DLQ administration. Worker binaries
//! mount [`full_admin_router`] on their operations port.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dlq::DlqManager;
use crate::metrics;

/// Caps `limit`/`count` query parameters on DLQ endpoints.
const PAGE_CAP: usize = 100;

/// Error half of every handler: a status code plus a JSON body.
type ApiError = (StatusCode, Json<Value>);

/// Shared state behind every handler in this module.
#[derive(Clone)]
pub struct HealthState {
    redis: Arc<ConnectionManager>,
    name: String,
    version: String,
    stream: String,
    dlq_stream: String,
}

impl HealthState {
    /// The DLQ name follows the `{stream}:dlq` convention.
    pub fn new(
        redis: Arc<ConnectionManager>,
        name: impl Into<String>,
        version: impl Into<String>,
        stream: impl Into<String>,
    ) -> Self {
        let stream = stream.into();
        Self {
            redis,
            name: name.into(),
            version: version.into(),
            dlq_stream: format!("{stream}:dlq"),
            stream,
        }
    }

    fn dlq_manager(&self) -> DlqManager {
        DlqManager::new(self.redis.clone(), &self.stream, &self.dlq_stream)
    }

    fn conn(&self) -> ConnectionManager {
        (*self.redis).clone()
    }
}

fn internal_error(err: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
}

fn entry_not_found(message_id: String) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Entry not found in DLQ",
            "message_id": message_id,
        })),
    )
}

#[derive(Debug, Serialize)]
struct LiveReply {
    status: &'static str,
    name: String,
    version: String,
}

/// Liveness probe. Answers as long as the process is serving requests.
async fn live(State(state): State<HealthState>) -> Json<LiveReply> {
    Json(LiveReply {
        status: "healthy",
        name: state.name,
        version: state.version,
    })
}

/// Readiness probe. Ready means Redis answers PING.
async fn ready(
    State(state): State<HealthState>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut conn = state.conn();
    let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;

    let redis_check = match pong {
        Ok(reply) if reply == "PONG" => Ok("ok".to_string()),
        Ok(reply) => Err(format!("unexpected response: {reply}")),
        Err(e) => Err(format!("error: {e}")),
    };

    match redis_check {
        Ok(status) => Ok((
            StatusCode::OK,
            Json(json!({ "status": "ready", "checks": { "redis": status } })),
        )),
        Err(status) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "checks": { "redis": status } })),
        )),
    }
}

/// Reports stream length, entry id range, and consumer groups.
///
/// A stream that has never seen a message does not exist in Redis; that
/// case reports length 0 instead of an error.
async fn stream_info(State(state): State<HealthState>) -> Result<Json<Value>, ApiError> {
    let mut conn = state.conn();

    let info: Result<redis::streams::StreamInfoStreamReply, _> = redis::cmd("XINFO")
        .arg("STREAM")
        .arg(&state.stream)
        .query_async(&mut conn)
        .await;

    match info {
        Ok(info) => Ok(Json(json!({
            "stream": state.stream,
            "length": info.length,
            "first_entry_id": info.first_entry.id,
            "last_entry_id": info.last_entry.id,
            "radix_tree_keys": info.radix_tree_keys,
            "groups": info.groups,
        }))),
        Err(e) if e.to_string().contains("no such key") || e.to_string().contains("ERR") => {
            Ok(Json(json!({
                "stream": state.stream,
                "length": 0,
                "first_entry_id": null,
                "last_entry_id": null,
                "message": "Stream does not exist yet (no messages queued)",
            })))
        }
        Err(e) => Err(internal_error(format!("Failed to get stream info: {e}"))),
    }
}

/// Prometheus scrape endpoint.
async fn scrape_metrics() -> impl IntoResponse {
    let content_type = [(header::CONTENT_TYPE, "text/plain; charset=utf-8")];
    match metrics::prometheus_handle() {
        Some(handle) => (StatusCode::OK, content_type, handle.render()).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            content_type,
            "No metrics recorder; call metrics::init_metrics() during startup".to_string(),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default = "default_page_size")]
    limit: usize,
    /// Entry id to resume from; omit to start at the oldest.
    #[serde(default)]
    start: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequeueParams {
    #[serde(default = "default_page_size")]
    count: usize,
}

fn default_page_size() -> usize {
    10
}

/// `GET /admin/dlq/stats`
async fn dlq_stats(State(state): State<HealthState>) -> Result<impl IntoResponse, ApiError> {
    state
        .dlq_manager()
        .stats()
        .await
        .map(Json)
        .map_err(internal_error)
}

/// `GET /admin/dlq/messages?limit=10&start=1700000000000-0`
///
/// Pages oldest-first. The response's `next_start` feeds the next
/// request's `start`.
async fn dlq_messages(
    State(state): State<HealthState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.min(PAGE_CAP);

    let entries = state
        .dlq_manager()
        .list(limit, params.start.as_deref())
        .await
        .map_err(internal_error)?;

    // Exclusive range start for the next page
    let next_start = entries.last().map(|(id, _)| format!("({id}"));
    let messages: Vec<Value> = entries
        .into_iter()
        .map(|(id, entry)| json!({ "dlq_id": id, "entry": entry }))
        .collect();

    Ok(Json(json!({
        "messages": messages,
        "limit": limit,
        "count": messages.len(),
        "next_start": next_start,
    })))
}

/// `POST /admin/dlq/reprocess/{id}`
async fn requeue_entry(
    State(state): State<HealthState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.dlq_manager().requeue(&id).await {
        Ok(true) => Ok(Json(json!({
            "success": true,
            "message_id": id,
            "message": "Entry requeued for processing",
        }))),
        Ok(false) => Err(entry_not_found(id)),
        Err(e) => Err(internal_error(e)),
    }
}

/// `POST /admin/dlq/reprocess?count=10`
async fn requeue_batch(
    State(state): State<HealthState>,
    Query(params): Query<RequeueParams>,
) -> Result<impl IntoResponse, ApiError> {
    let count = params.count.min(PAGE_CAP);

    let requeued = state
        .dlq_manager()
        .requeue_oldest(count)
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({ "success": true, "requeued_count": requeued })))
}

/// `DELETE /admin/dlq/{id}`
async fn archive_entry(
    State(state): State<HealthState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.dlq_manager().delete(&id).await {
        Ok(true) => Ok(Json(json!({
            "success": true,
            "message_id": id,
            "message": "Entry archived (deleted from DLQ)",
        }))),
        Ok(false) => Err(entry_not_found(id)),
        Err(e) => Err(internal_error(e)),
    }
}

/// `DELETE /admin/dlq/all`
async fn archive_all(State(state): State<HealthState>) -> Result<impl IntoResponse, ApiError> {
    let archived = state.dlq_manager().purge().await.map_err(internal_error)?;

    Ok(Json(json!({
        "success": true,
        "archived_count": archived,
        "message": "All DLQ entries archived",
    })))
}

/// Probes, stream monitoring, metrics, and DLQ administration in one router.
///
/// `/admin/dlq/all` is registered alongside `/admin/dlq/{id}`; axum gives the
/// static segment priority, so "all" never parses as an entry id.
pub fn full_admin_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(live))
        .route("/healthz", get(live))
        .route("/ready", get(ready))
        .route("/readyz", get(ready))
        .route("/stream/info", get(stream_info))
        .route("/metrics", get(scrape_metrics))
        .route("/admin/dlq/stats", get(dlq_stats))
        .route("/admin/dlq/messages", get(dlq_messages))
        .route("/admin/dlq/reprocess/{id}", post(requeue_entry))
        .route("/admin/dlq/reprocess", post(requeue_batch))
        .route("/admin/dlq/all", delete(archive_all))
        .route("/admin/dlq/{id}", delete(archive_entry))
        .with_state(state)
}
