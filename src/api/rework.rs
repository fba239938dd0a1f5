use axum::{extract::State, http::StatusCode, Json};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::rework::{ReworkRequest, ReworkResponse};
use crate::services::rework_service;

/// POST /api/rework — reprocess an off-spec lot into a salvage output plus
/// an optional remainder lot.
pub async fn rework_endpoint(
    State(pool): State<DbPool>,
    Json(request): Json<ReworkRequest>,
) -> AppResult<(StatusCode, Json<ReworkResponse>)> {
    let response = rework_service::rework(&pool, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
