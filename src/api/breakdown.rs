use axum::{extract::State, http::StatusCode, Json};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::breakdown::{BreakdownRequest, BreakdownResponse};
use crate::services::breakdown_service;

/// POST /api/breakdown — split one input lot into typed output lots and
/// recorded losses.
pub async fn breakdown_endpoint(
    State(pool): State<DbPool>,
    Json(request): Json<BreakdownRequest>,
) -> AppResult<(StatusCode, Json<BreakdownResponse>)> {
    let response = breakdown_service::breakdown(&pool, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
