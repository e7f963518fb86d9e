use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use sqlx::error::ErrorKind;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Constraint {constraint} violated: {message}")]
    Constraint {
        constraint: &'static str,
        message: String,
    },
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let sqlx::Error::Database(db_err) = &err else {
            return AppError::Database(err);
        };

        let message = db_err.message();
        let (constraint, message) = match db_err.kind() {
            ErrorKind::UniqueViolation if message.contains("courses.name") => {
                ("name_unique", "The course name must be unique.".to_string())
            }
            ErrorKind::UniqueViolation => ("unique", message.to_string()),
            ErrorKind::CheckViolation if message.contains("name_description_check") => (
                "name_description_check",
                "The course title must not be the description.".to_string(),
            ),
            ErrorKind::CheckViolation => ("check", message.to_string()),
            ErrorKind::ForeignKeyViolation => (
                "foreign_key",
                "The referenced record does not exist or is still in use.".to_string(),
            ),
            ErrorKind::NotNullViolation => ("not_null", message.to_string()),
            // SQLite reports some foreign-key actions with a generic code.
            _ if message.contains("FOREIGN KEY constraint failed") => (
                "foreign_key",
                "The referenced record does not exist or is still in use.".to_string(),
            ),
            _ => return AppError::Database(err),
        };

        AppError::Constraint { constraint, message }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Constraint { message, .. } => (StatusCode::CONFLICT, message),
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}
