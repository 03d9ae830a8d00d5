use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("Activity not found")]
    NotFound,

    #[error("{0}")]
    Internal(String), // Failure while building or storing a new activity

    #[error("Error: {0}")]
    Error(String), // Allows custom application errors
}

impl ActivityError {
    const CREATE_FAILED: &str = "Failed to create activity";
    const UNKNOWN_ERROR: &str = "Unknown error";
}

impl IntoResponse for ActivityError {
    fn into_response(self) -> Response {
        match self {
            ActivityError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": ActivityError::NotFound.to_string() })),
            )
                .into_response(),
            ActivityError::Internal(msg) => {
                let details = if msg.trim().is_empty() {
                    Self::UNKNOWN_ERROR.to_string()
                } else {
                    msg
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": Self::CREATE_FAILED,
                        "details": details,
                    })),
                )
                    .into_response()
            }
            other => {
                log::error!("Unexpected error reached the HTTP layer: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "An unexpected error occurred",
                        "details": other.to_string(),
                    })),
                )
                    .into_response()
            }
        }
    }
}
