use axum::{extract::State, http::StatusCode, Json};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::sale::{SaleCreateRequest, SaleCreateResponse};
use crate::services::sales_service;

/// POST /api/sales — sell one or more lots to a customer in a single
/// transaction.
pub async fn create_sale_endpoint(
    State(pool): State<DbPool>,
    Json(request): Json<SaleCreateRequest>,
) -> AppResult<(StatusCode, Json<SaleCreateResponse>)> {
    let response = sales_service::create_sale(&pool, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
