use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::domain::expense::repository::SheetError;
use crate::domain::expense::service::{PatchError, ValidationError};
use crate::shared::vision::ExtractionError;

/// Ошибки API-слоя: каждая превращается в HTTP-статус
/// с JSON-телом `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    #[error("{0}")]
    BadRequest(String),

    #[error("Failed to parse receipt: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Row {0} no longer exists")]
    StaleHandle(u32),

    #[error("Failed to write to Google Sheets: {0}")]
    Store(String),
}

impl From<SheetError> for ApiError {
    fn from(e: SheetError) -> Self {
        match e {
            SheetError::StaleHandle(row) => ApiError::StaleHandle(row),
            other => ApiError::Store(other.to_string()),
        }
    }
}

impl From<PatchError> for ApiError {
    fn from(e: PatchError) -> Self {
        match e {
            PatchError::Validation(v) => v.into(),
            PatchError::Sheet(s) => s.into(),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::StaleHandle(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Validation(ValidationError::InvalidAmount).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Extraction(ExtractionError::Timeout).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::StaleHandle(5).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Store("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_stale_handle_is_not_a_store_failure() {
        let err: ApiError = SheetError::StaleHandle(7).into();
        assert!(matches!(err, ApiError::StaleHandle(7)));
    }
}
