use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    Json,
};

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::reservation::{
    ReservationCancelRequest, ReservationCancelResponse, ReservationCreateRequest,
    ReservationCreateResponse, ReservationListQuery, ReservationView,
};
use crate::services::reservation_service;

/// POST /api/reservations
pub async fn create_reservation_endpoint(
    State(pool): State<DbPool>,
    Json(request): Json<ReservationCreateRequest>,
) -> AppResult<(StatusCode, Json<ReservationCreateResponse>)> {
    let response = reservation_service::create_reservation(&pool, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/reservations/:id/cancel
pub async fn cancel_reservation_endpoint(
    State(pool): State<DbPool>,
    Path(reservation_id): Path<i64>,
    Json(request): Json<ReservationCancelRequest>,
) -> AppResult<Json<ReservationCancelResponse>> {
    let response = reservation_service::cancel_reservation(&pool, reservation_id, request).await?;
    Ok(Json(response))
}

/// GET /api/reservations
pub async fn list_reservations_endpoint(
    State(pool): State<DbPool>,
    QueryParams(query): QueryParams<ReservationListQuery>,
) -> AppResult<Json<Vec<ReservationView>>> {
    let response = reservation_service::list_reservations(&pool, query).await?;
    Ok(Json(response))
}
