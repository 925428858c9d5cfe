//! Error responses of the authentication service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Custom error type for authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not authorized to access this route")]
    Unauthorized,

    #[error("Not allowed to change this account")]
    Forbidden,

    #[error("User not found")]
    NotFound,

    #[error("Email is already registered")]
    Conflict,

    #[error("Too many login attempts, please try again later")]
    TooManyRequests,

    #[error("Internal server error")]
    InternalServerError,
}

impl AuthError {
    /// Stable kind tag exposed to clients
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "ValidationError",
            AuthError::InvalidCredentials | AuthError::Unauthorized => "Unauthorized",
            AuthError::Forbidden => "Forbidden",
            AuthError::NotFound => "NotFound",
            AuthError::Conflict => "ConflictError",
            AuthError::TooManyRequests => "TooManyRequests",
            AuthError::InternalServerError => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AuthError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        }));

        (self.status(), body).into_response()
    }
}
