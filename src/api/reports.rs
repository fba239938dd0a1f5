use axum::{
    extract::{Path, Query as QueryParams, State},
    Json,
};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::reports::{
    AtRiskQuery, AtRiskResponse, LotDetailResponse, StockQuery, StockResponse,
};
use crate::services::reports_service;

/// GET /api/lots/:lotId
pub async fn lot_detail_endpoint(
    State(pool): State<DbPool>,
    Path(lot_id): Path<i64>,
) -> AppResult<Json<LotDetailResponse>> {
    let response = reports_service::lot_detail(&pool, lot_id).await?;
    Ok(Json(response))
}

/// GET /api/reports/at-risk
pub async fn at_risk_endpoint(
    State(pool): State<DbPool>,
    QueryParams(query): QueryParams<AtRiskQuery>,
) -> AppResult<Json<AtRiskResponse>> {
    let response = reports_service::at_risk(&pool, query).await?;
    Ok(Json(response))
}

/// GET /api/reports/stock
pub async fn stock_endpoint(
    State(pool): State<DbPool>,
    QueryParams(query): QueryParams<StockQuery>,
) -> AppResult<Json<StockResponse>> {
    let response = reports_service::stock(&pool, query).await?;
    Ok(Json(response))
}
