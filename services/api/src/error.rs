//! Error kinds surfaced by the API service
//!
//! Every error reaching HTTP carries a stable `kind` tag. Database and storage
//! details are logged here and replaced by a generic message in the body.
//! `PersistenceError` is reserved for metadata writes that fail after their
//! blob was stored; any other store failure is an `InternalError`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::{DatabaseError, StorageError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("You are not allowed to access this resource")]
    Forbidden,

    #[error("Not authorized to access this route")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Persistence error: {0}")]
    Persistence(DatabaseError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    /// Stable tag clients can match on
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::Forbidden => "Forbidden",
            ApiError::Unauthorized => "Unauthorized",
            ApiError::Validation(_) => "ValidationError",
            ApiError::Storage(_) => "StorageError",
            ApiError::Persistence(_) => "PersistenceError",
            ApiError::Conflict(_) => "ConflictError",
            ApiError::Database(_) | ApiError::Internal => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Storage(_)
            | ApiError::Persistence(_)
            | ApiError::Database(_)
            | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Storage(_) => "File storage failed".to_string(),
            ApiError::Persistence(_) => "Saving data failed".to_string(),
            ApiError::Database(_) => ApiError::Internal.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(
            self,
            ApiError::Storage(_)
                | ApiError::Persistence(_)
                | ApiError::Database(_)
                | ApiError::Internal
        ) {
            error!("{}", self);
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "kind": self.kind(),
                "message": self.public_message(),
            }
        }));

        (self.status(), body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
