use super::service::SearchService;
use super::types::{
    ErrorResponse, HealthResponse, Readiness, SearchRequest, SearchResponse,
};
use crate::embedding::Embedder;
use crate::error::SearchError;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;
use std::time::Instant;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
}

pub async fn handle_healthz() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

pub async fn handle_ready(Extension(service): Extension<Arc<SearchService>>) -> Json<Readiness> {
    Json(service.readiness())
}

pub async fn handle_search(
    Extension(service): Extension<Arc<SearchService>>,
    Extension(embedder): Extension<Arc<dyn Embedder>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!("[/search] rejected body: {}", rejection);
        api_error(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text())
    })?;

    let request_id = uuid::Uuid::new_v4();
    let top_k = requested_top_k(req.top_k, service.settings().default_top_k);
    let top_k = service.clamp_top_k(top_k);
    let started = Instant::now();

    let query = match (req.vector, req.q.as_deref()) {
        (Some(vector), _) => {
            tracing::info!(
                "[/search] id={} vector(dim={}) top_k={}",
                request_id,
                vector.len(),
                top_k
            );
            vector
        }
        (None, Some(q)) if !q.trim().is_empty() => {
            tracing::info!("[/search] id={} q={:?} top_k={}", request_id, q, top_k);
            let vector = embedder.embed(q).await.map_err(|e| {
                tracing::error!("[/search] id={} embedding failed: {}", request_id, e);
                api_error(StatusCode::BAD_GATEWAY, format!("Embedding failed: {}", e))
            })?;
            tracing::info!(
                "[/search] id={} embed done in {:.2}s",
                request_id,
                started.elapsed().as_secs_f64()
            );
            vector
        }
        (None, _) => return Err(api_error(StatusCode::BAD_REQUEST, "Empty query")),
    };

    let search_started = Instant::now();
    let results = tokio::task::spawn_blocking(move || service.search(&query, top_k))
        .await
        .map_err(|e| {
            tracing::error!("[/search] id={} search task failed: {}", request_id, e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Search task failed")
        })?
        .map_err(|e| {
            let status = search_error_status(&e);
            if status.is_server_error() {
                tracing::error!("[/search] id={} error: {}", request_id, e);
            } else {
                tracing::warn!("[/search] id={} rejected: {}", request_id, e);
            }
            api_error(status, e.to_string())
        })?;

    tracing::info!(
        "[/search] id={} index+mapping in {:.2}s (total {:.2}s), {} results",
        request_id,
        search_started.elapsed().as_secs_f64(),
        started.elapsed().as_secs_f64(),
        results.len()
    );

    Ok(Json(SearchResponse { results }))
}

/// Requested count as a `usize`; missing means `default`, non-positive means 0
/// (which the service clamps up to 1).
fn requested_top_k(requested: Option<i64>, default: usize) -> usize {
    match requested {
        None => default,
        Some(n) => usize::try_from(n).unwrap_or(0),
    }
}

fn search_error_status(err: &SearchError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
