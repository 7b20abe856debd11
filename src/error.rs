use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the user account handlers.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// Login handle matched no record.
    #[error("user not found")]
    UnknownUser,

    /// Login handle matched but the password did not verify.
    #[error("wrong password")]
    WrongPassword,

    #[error("user not found")]
    NotFound,

    /// Photo could not be written.
    #[error("storage error: {0}")]
    Storage(anyhow::Error),

    #[error("password hashing failed: {0}")]
    Hash(anyhow::Error),

    /// Underlying store failure.
    #[error("database error: {0}")]
    Persistence(anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownUser | AppError::WrongPassword => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Hash(_) | AppError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Storage(e) => json!({ "message": "Failed to store profile photo.", "error": e.to_string() }),
            AppError::Hash(e) => json!({ "message": "Failed to process password.", "error": e.to_string() }),
            AppError::Persistence(e) => json!({ "message": "Database error.", "error": e.to_string() }),
            other => json!({ "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
