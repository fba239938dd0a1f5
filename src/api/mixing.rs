use axum::{extract::State, http::StatusCode, Json};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::mixing::{MixRequest, MixResponse};
use crate::services::mixing_service;

/// POST /api/mixing — combine multiple released lots into one output lot.
pub async fn mix_endpoint(
    State(pool): State<DbPool>,
    Json(request): Json<MixRequest>,
) -> AppResult<(StatusCode, Json<MixResponse>)> {
    let response = mixing_service::mix(&pool, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
