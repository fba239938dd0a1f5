use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::offline::{
    OfflineApplyRequest, OfflineApplyResponse, OfflineConflictView, OfflineResolveRequest,
    OfflineSubmitRequest, OfflineSubmitResponse,
};
use crate::services::offline_service;

/// POST /api/offline/submit — queue one or more client-originated actions.
pub async fn submit_endpoint(
    State(pool): State<DbPool>,
    Json(request): Json<OfflineSubmitRequest>,
) -> AppResult<(StatusCode, Json<OfflineSubmitResponse>)> {
    let response = offline_service::submit(&pool, request).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// POST /api/offline/apply — replay a client's queued actions against the
/// core services, grouped by client_txn_id.
pub async fn apply_endpoint(
    State(pool): State<DbPool>,
    Json(request): Json<OfflineApplyRequest>,
) -> AppResult<Json<OfflineApplyResponse>> {
    let response = offline_service::apply(&pool, request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ConflictsQuery {
    pub resolved: Option<bool>,
}

/// GET /api/offline/conflicts
pub async fn list_conflicts_endpoint(
    State(pool): State<DbPool>,
    QueryParams(query): QueryParams<ConflictsQuery>,
) -> AppResult<Json<Vec<OfflineConflictView>>> {
    let response = offline_service::list_conflicts(&pool, query.resolved).await?;
    Ok(Json(response))
}

/// POST /api/offline/:id/resolve
pub async fn resolve_endpoint(
    State(pool): State<DbPool>,
    Path(offline_queue_id): Path<i64>,
    Json(request): Json<OfflineResolveRequest>,
) -> AppResult<StatusCode> {
    offline_service::resolve(&pool, offline_queue_id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}
