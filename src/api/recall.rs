use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::recall::{
    QuarantineForwardRequest, QuarantineForwardResponse, RecallReportResponse,
};
use crate::services::recall_service;

/// GET /api/recall/:lotId/report — backward/forward genealogy and affected
/// customers for a lot, read-only.
pub async fn recall_report_endpoint(
    State(pool): State<DbPool>,
    Path(lot_id): Path<i64>,
) -> AppResult<Json<RecallReportResponse>> {
    let response = recall_service::recall_report(&pool, lot_id).await?;
    Ok(Json(response))
}

/// POST /api/recall/:lotId/quarantine-forward — quarantine every descendant
/// of a lot in one transaction.
pub async fn quarantine_forward_endpoint(
    State(pool): State<DbPool>,
    Path(lot_id): Path<i64>,
    Json(request): Json<QuarantineForwardRequest>,
) -> AppResult<(StatusCode, Json<QuarantineForwardResponse>)> {
    let response = recall_service::quarantine_forward(&pool, lot_id, request).await?;
    Ok((StatusCode::OK, Json(response)))
}
