use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Application error types.
///
/// Variants map onto the five error kinds of the core's error handling design:
/// Validation, BusinessInvariant, AuditInvariant, Concurrency, Integrity — plus
/// NotFound and Database/InternalError for infrastructure passthroughs.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input: unknown id, empty list, wrong mode, negative quantity.
    #[error("{0}")]
    Validation(String),

    /// Eligibility gate or mass-balance failure. The message is a stable
    /// substring surface — the offline reconciler's conflict classifier
    /// pattern-matches against it, so wording changes here are not cosmetic.
    #[error("{0}")]
    BusinessInvariant(String),

    /// The Audit Guard trigger aborted the transaction: a lifecycle column
    /// changed without a matching same-transaction LotEvent. Always a
    /// programmer error in this codebase, never a caller mistake.
    #[error("Audit invariant violated: {0}")]
    AuditInvariant(String),

    /// Lock wait timeout or serialization failure.
    #[error("Concurrency conflict: {0}")]
    Concurrency(String),

    /// Unique-constraint violation outside the benign offline-submit path.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn to_parts(&self) -> (StatusCode, String, Option<serde_json::Value>) {
        match self {
            AppError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR".to_string(), None)
            }
            AppError::BusinessInvariant(_) => (
                StatusCode::BAD_REQUEST,
                "BUSINESS_INVARIANT_VIOLATION".to_string(),
                None,
            ),
            AppError::AuditInvariant(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUDIT_INVARIANT_VIOLATION".to_string(),
                None,
            ),
            AppError::Concurrency(_) => (
                StatusCode::CONFLICT,
                "CONCURRENCY_CONFLICT".to_string(),
                None,
            ),
            AppError::Integrity(_) => {
                (StatusCode::CONFLICT, "INTEGRITY_VIOLATION".to_string(), None)
            }
            AppError::NotFound(entity) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND".to_string(),
                Some(serde_json::json!({ "entity": entity })),
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DB_QUERY_FAILED".to_string(),
                None,
            ),
            AppError::TransactionFailed(phase) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DB_TRANSACTION_FAILED".to_string(),
                Some(serde_json::json!({ "failedPhase": phase })),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                None,
            ),
        }
    }

    /// Whether the offline reconciler's classifier should treat this as a
    /// `conflict` (vs `rejected`) outcome. Grounded on the conflict-signal
    /// substring list: the message carries the classification, not the
    /// error variant, because the underlying system expresses every gate
    /// failure as a plain string.
    pub fn is_conflict_signal(message: &str) -> bool {
        const SIGNALS: &[&str] = &[
            "Insufficient available",
            "Insufficient reservable",
            "not released",
            "not ready",
            "quarantined",
            "Weight mismatch",
            "must consume full available",
            "Invalid",
            "already used",
        ];
        SIGNALS.iter().any(|s| message.contains(s))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4().to_string();
        let message = self.to_string();
        let (status, code, details) = self.to_parts();

        tracing::error!(
            correlation_id = %correlation_id,
            error_code = %code,
            error = %message,
            "Request failed"
        );

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code,
                message,
                correlation_id,
                details,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<tiberius::error::Error> for AppError {
    fn from(err: tiberius::error::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<bb8::RunError<tiberius::error::Error>> for AppError {
    fn from(err: bb8::RunError<tiberius::error::Error>) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<bb8::RunError<bb8_tiberius::Error>> for AppError {
    fn from(err: bb8::RunError<bb8_tiberius::Error>) -> Self {
        AppError::Database(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
