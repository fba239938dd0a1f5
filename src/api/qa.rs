use axum::{extract::State, http::StatusCode, Json};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::qa::{QaCheckRequest, QaCheckResponse};
use crate::services::qa_service;

/// POST /api/qa-checks — record a full pass/fail check or a partial
/// pass/fail split.
pub async fn qa_check_endpoint(
    State(pool): State<DbPool>,
    Json(request): Json<QaCheckRequest>,
) -> AppResult<(StatusCode, Json<QaCheckResponse>)> {
    let response = qa_service::qa_check(&pool, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
