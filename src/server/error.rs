//! API error types

use crate::search::types::RequestError;
use crate::storage::{StorageError, MAX_WINDOW_DAYS};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned by the search API, rendered as `{success:false,error,code}`
#[derive(Debug, Clone, Serialize, Error)]
#[error("{code} ({status}): {message}")]
pub struct ApiError {
    /// HTTP status code
    #[serde(skip)]
    pub status: StatusCode,

    /// Human readable message
    pub message: String,

    /// Stable machine readable code
    pub code: &'static str,
}

impl ApiError {
    fn with_code(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
        }
    }

    /// 400 Bad Request
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// 422 Unprocessable Entity, for requests that fail validation
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
    }

    /// 500 Internal Server Error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_ERROR")
    }

    /// 503, the place store cannot be reached
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::SERVICE_UNAVAILABLE, message, "STORE_UNAVAILABLE")
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Poisoned => Self::unavailable(err.to_string()),
            StorageError::InvalidWindow(days) => Self::bad_request(format!(
                "days must be between 1 and {MAX_WINDOW_DAYS}, got {days}"
            )),
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.message,
            "code": self.code,
        }));

        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn rendered(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_empty_query_renders_as_validation_error() {
        let (status, body) = rendered(RequestError::EmptyQuery.into()).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["error"].as_str().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_invalid_window_renders_as_bad_request() {
        let (status, body) = rendered(StorageError::InvalidWindow(100_000_000).into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body["error"].as_str().unwrap().contains("100000000"));
    }

    #[test]
    fn test_storage_errors_map_to_status() {
        assert_eq!(
            ApiError::from(StorageError::Poisoned).status,
            StatusCode::SERVICE_UNAVAILABLE
        );

        let error = ApiError::from(StorageError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.code, "INTERNAL_ERROR");
    }
}
