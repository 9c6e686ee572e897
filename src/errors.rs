use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// One invalid field in a rejected payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("validation failed")]
    Validation { fields: Vec<FieldError> },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("database error")]
    Database(#[from] sea_orm::DbErr),
    #[error("stored document could not be decoded")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(fields: Vec<FieldError>) -> Self {
        AppError::Validation { fields }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound { entity, id } => (
                StatusCode::NOT_FOUND,
                json!({"error": format!("{} not found", entity), "id": id}),
            ),
            AppError::Validation { fields } => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Invalid data", "details": fields}),
            ),
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({"error": message}))
            }
            AppError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, json!({"error": message}))
            }
            // Store failures are logged with detail server-side and kept
            // generic on the wire.
            AppError::Database(err) => {
                error!("database error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "Internal server error"}))
            }
            AppError::Decode(err) => {
                error!("document decode error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "Internal server error"}))
            }
            AppError::Internal(message) => {
                error!("internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "Internal server error"}))
            }
        };

        (status, Json(body)).into_response()
    }
}
