//! Error taxonomy → HTTP mapping. Wraps `WireError` (the
//! engine-level taxonomy) plus a request-validation variant for payloads
//! that fail before ever reaching an engine, generalizing an
//! `ErrorResponse`/`IntoResponse` pair.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use wireline_core::error::WireError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            ApiError::Wire(WireError::InvalidInput(_)) => (StatusCode::BAD_REQUEST, "invalid_input"),
            ApiError::Wire(WireError::Unauthorized) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Wire(WireError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Wire(WireError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Wire(WireError::ProviderError(_)) => (StatusCode::BAD_GATEWAY, "provider_error"),
            ApiError::Wire(WireError::TransientDependency(_)) => (StatusCode::SERVICE_UNAVAILABLE, "transient_dependency"),
            ApiError::Wire(WireError::Config(_))
            | ApiError::Wire(WireError::Cache(_))
            | ApiError::Wire(WireError::Queue(_))
            | ApiError::Wire(WireError::Serialization(_))
            | ApiError::Wire(WireError::Io(_))
            | ApiError::Wire(WireError::Internal(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
            metrics::counter!("api.errors.internal").increment(1);
            return (status, Json(ErrorBody { error: kind, message: "internal error".to_string() })).into_response();
        }
        metrics::counter!("api.errors", "kind" => kind).increment(1);
        (status, Json(ErrorBody { error: kind, message: self.to_string() })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
