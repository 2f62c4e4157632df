use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::analysis::scoring::ScoringError;
use crate::analysis::validation::ValidationError;
use crate::extraction::ExtractionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed request input (empty text, missing multipart field).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A candidate analysis broke the analysis contract.
    #[error("Analysis failed validation: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(#[from] ExtractionError),

    /// The scorer kept answering with something that is not an analysis.
    #[error("Scoring reply rejected: {0}")]
    MalformedCandidate(String),

    #[error("Scoring unavailable: {0}")]
    ScoringUnavailable(ScoringError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Not implemented")]
    NotImplemented,
}

impl From<ScoringError> for AppError {
    fn from(e: ScoringError) -> Self {
        match e {
            ScoringError::Malformed(_) => AppError::MalformedCandidate(e.to_string()),
            other => AppError::ScoringUnavailable(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details: Option<Value> = None;

        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::ValidationFailed(e) => {
                details = serde_json::to_value(e).ok();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "ANALYSIS_INVALID",
                    e.to_string(),
                )
            }
            AppError::ExtractionFailed(e @ ExtractionError::UnsupportedFormat(_)) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_FORMAT",
                e.to_string(),
            ),
            AppError::ExtractionFailed(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "EXTRACTION_FAILED",
                e.to_string(),
            ),
            AppError::MalformedCandidate(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "ANALYSIS_MALFORMED",
                msg.clone(),
            ),
            AppError::ScoringUnavailable(e) => {
                tracing::error!("Scoring error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SCORING_UNAVAILABLE",
                    "The scoring service is currently unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
            AppError::NotImplemented => (
                StatusCode::NOT_IMPLEMENTED,
                "NOT_IMPLEMENTED",
                "This endpoint is not available with the configured scorer".to_string(),
            ),
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
