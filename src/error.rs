use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

use crate::types::now_ms;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Json(_) | AppError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "status": "rejected",
            "error": self.to_string(),
            "timestamp": now_ms(),
        });
        (status, Json(body)).into_response()
    }
}
