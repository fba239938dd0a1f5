use axum::{extract::State, http::StatusCode, Json};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::receiving::{ReceivingRequest, ReceivingResponse};
use crate::services::receiving_service;

/// POST /api/receiving — record incoming material as a new lot.
pub async fn create_lot_endpoint(
    State(pool): State<DbPool>,
    Json(request): Json<ReceivingRequest>,
) -> AppResult<(StatusCode, Json<ReceivingResponse>)> {
    let response = receiving_service::create_lot(&pool, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
