use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use zahouse_agent::ProviderError;
use zahouse_core::{document::DocumentError, gate::GateError};

/// Every handler failure, rendered as `{"error": ..., "details": ...}`.
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("A valid admin key is required.")]
    Unauthorized,
    #[error("{0}")]
    Internal(String),
}

pub(crate) fn internal(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("internal error: {e}");
    ApiError::Internal(e.to_string())
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Gate(GateError::EmptyRequest) => StatusCode::BAD_REQUEST,
            Self::Gate(GateError::EmailRequired) => StatusCode::FORBIDDEN,
            Self::Document(DocumentError::Unsupported(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Document(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            Self::BadRequest(_) | Self::Gate(GateError::EmptyRequest) => "Invalid request",
            Self::Gate(GateError::EmailRequired) => "Email required",
            Self::Document(DocumentError::Unsupported(_)) => "Unsupported file",
            Self::Document(_) => "Could not read contract",
            Self::Provider(_) => "Audit failed",
            Self::Unauthorized => "Unauthorized",
            Self::Internal(_) => "Internal error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = %status, "request failed: {self}");
        }
        let mut body = json!({
            "error": self.summary(),
            "details": self.to_string(),
        });
        if matches!(self, Self::Gate(GateError::EmailRequired)) {
            body["gate"] = json!("email");
        }
        (status, Json(body)).into_response()
    }
}
