use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unprocessable document: {0}")]
    UnprocessableDocument(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => Self::ValidationError(msg),
            AppError::Chunking { .. } => Self::UnprocessableDocument(err.to_string()),
            AppError::ExternalService(_) => {
                tracing::warn!(error = %err, "upstream language model failed");
                Self::UpstreamError(err.to_string())
            }
            _ => {
                tracing::error!("Internal error: {:?}", err);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InternalError(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            Self::ValidationError(message) => (StatusCode::BAD_REQUEST, message),
            Self::UnprocessableDocument(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            Self::UpstreamError(message) => (StatusCode::BAD_GATEWAY, message),
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                status: "error".to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;

    fn assert_status_code<T: IntoResponse + Debug>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn test_app_error_to_api_error_conversion() {
        let validation = AppError::Validation("Please upload 1-3 PDF files (received 4)".into());
        let api_error = ApiError::from(validation);
        assert!(
            matches!(api_error, ApiError::ValidationError(msg) if msg == "Please upload 1-3 PDF files (received 4)")
        );

        let chunking = AppError::chunking("scan.pdf", "Failed to parse PDF: invalid xref");
        let api_error = ApiError::from(chunking);
        assert!(
            matches!(api_error, ApiError::UnprocessableDocument(msg) if msg.contains("scan.pdf"))
        );

        let upstream = AppError::ExternalService("429 rate limited".into());
        let api_error = ApiError::from(upstream);
        assert!(matches!(api_error, ApiError::UpstreamError(msg) if msg.contains("429")));

        let internal_error = AppError::Io(std::io::Error::other("io error"));
        let api_error = ApiError::from(internal_error);
        assert!(matches!(api_error, ApiError::InternalError(_)));
    }

    #[test]
    fn test_api_error_response_status_codes() {
        assert_status_code(
            ApiError::InternalError("server error".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
        assert_status_code(
            ApiError::ValidationError("invalid input".to_string()),
            StatusCode::BAD_REQUEST,
        );
        assert_status_code(
            ApiError::UnprocessableDocument("bad pdf".to_string()),
            StatusCode::UNPROCESSABLE_ENTITY,
        );
        assert_status_code(
            ApiError::UpstreamError("LLM API error: 500".to_string()),
            StatusCode::BAD_GATEWAY,
        );
    }

    #[test]
    fn test_error_messages() {
        let message = "invalid data format";
        let error = ApiError::ValidationError(message.to_string());
        assert_eq!(error.to_string(), format!("Validation error: {message}"));

        let message = "model unavailable";
        let error = ApiError::UpstreamError(message.to_string());
        assert_eq!(error.to_string(), format!("Upstream error: {message}"));
    }

    #[test]
    fn test_internal_error_sanitization() {
        let api_error = ApiError::from(AppError::InternalError("db password incorrect".into()));

        assert!(matches!(&api_error, ApiError::InternalError(msg) if msg == "Internal server error"));
        assert_status_code(api_error, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
