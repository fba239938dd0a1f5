use axum::{extract::State, http::StatusCode, Json};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::aging::{
    AgingReleaseRequest, AgingReleaseResponse, AgingStartRequest, AgingStartResponse,
};
use crate::services::aging_service;

/// POST /api/aging/start
pub async fn start_aging_endpoint(
    State(pool): State<DbPool>,
    Json(request): Json<AgingStartRequest>,
) -> AppResult<(StatusCode, Json<AgingStartResponse>)> {
    let response = aging_service::start_aging(&pool, request).await?;
    Ok((StatusCode::OK, Json(response)))
}

/// POST /api/aging/release
pub async fn release_aging_endpoint(
    State(pool): State<DbPool>,
    Json(request): Json<AgingReleaseRequest>,
) -> AppResult<(StatusCode, Json<AgingReleaseResponse>)> {
    let response = aging_service::release_aging(&pool, request).await?;
    Ok((StatusCode::OK, Json(response)))
}
