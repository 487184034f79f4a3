//! Error types for DocStamp API

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docstamp_core::SignError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid JSON body: {0}")]
    Json(#[from] JsonRejection),

    #[error(transparent)]
    Sign(#[from] SignError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            // 413 for oversized bodies, 415 for a missing JSON content type
            ApiError::Json(rejection) => rejection.status(),
            ApiError::Sign(e) => match e {
                SignError::NotFound(_) => StatusCode::NOT_FOUND,
                SignError::InvalidDocumentId(_) | SignError::InvalidField { .. } => {
                    StatusCode::BAD_REQUEST
                }
                SignError::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                SignError::CorruptDocument(_)
                | SignError::PageNotFound { .. }
                | SignError::DegenerateGeometry(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SignError::SerializationError(_) | SignError::PersistenceError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::Json(rejection) => rejection.body_text(),
            ApiError::Sign(e) if !status.is_server_error() => e.to_string(),
            ApiError::Sign(e) => {
                tracing::error!("Signing failed: {}", e);
                match e {
                    SignError::SerializationError(_) => "Failed to serialize signed document",
                    _ => "Failed to persist signed document",
                }
                .to_string()
            }
        };

        let body = Json(json!({
            "ok": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
