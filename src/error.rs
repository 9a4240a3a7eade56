use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tokio_postgres::error::SqlState;

use crate::templates::{ErrorTemplate, Nav};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(ref err) => {
                if err.contains("timeout") {
                    tracing::warn!("PostgreSQL operation timeout: {}", err);
                } else {
                    tracing::error!("PostgreSQL database error: {}", err);
                }

                let user_message = if err.contains("timeout") {
                    "Database operation timed out, please try again"
                } else if err.contains("unavailable") || err.contains("connection") {
                    "Database service is temporarily unavailable"
                } else {
                    "A database error occurred"
                };

                (StatusCode::INTERNAL_SERVER_ERROR, user_message.to_string())
            }
            AppError::Validation(ref message) => {
                tracing::debug!("Validation error: {}", message);
                (StatusCode::BAD_REQUEST, message.clone())
            }
            AppError::NotFound(ref resource) => {
                tracing::debug!("Resource not found: {}", resource);
                (StatusCode::NOT_FOUND, format!("{} not found", resource))
            }
            AppError::Conflict(ref message) => {
                tracing::debug!("Constraint conflict: {}", message);
                (StatusCode::CONFLICT, message.clone())
            }
            AppError::Forbidden(ref message) => {
                tracing::debug!("Forbidden: {}", message);
                (StatusCode::FORBIDDEN, message.clone())
            }
            AppError::Internal(ref err) => {
                tracing::error!("Internal server error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let page = ErrorTemplate {
            nav: Nav::default(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
        };

        match page.render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(err) => {
                tracing::error!("Failed to render error page: {}", err);
                (status, page.message).into_response()
            }
        }
    }
}

// PostgreSQL error mapping
impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.code() {
            Some(&SqlState::UNIQUE_VIOLATION) => {
                let text = err.to_string();
                let message = if text.contains("username") {
                    "A user with that username already exists.".to_string()
                } else if text.contains("slug") {
                    "A group with that slug already exists.".to_string()
                } else {
                    "Resource already exists".to_string()
                };
                AppError::Conflict(message)
            }
            Some(&SqlState::FOREIGN_KEY_VIOLATION) => {
                AppError::Validation("Referenced resource does not exist".to_string())
            }
            Some(&SqlState::NOT_NULL_VIOLATION) => {
                AppError::Validation("Required field is missing".to_string())
            }
            Some(&SqlState::CHECK_VIOLATION) => {
                let message = if err.to_string().contains("user_not_author") {
                    "Users cannot follow themselves".to_string()
                } else {
                    "Data validation constraint violated".to_string()
                };
                AppError::Validation(message)
            }
            Some(&SqlState::STRING_DATA_RIGHT_TRUNCATION) => {
                AppError::Validation("Text data exceeds maximum length".to_string())
            }
            Some(&SqlState::CONNECTION_EXCEPTION)
            | Some(&SqlState::CONNECTION_DOES_NOT_EXIST)
            | Some(&SqlState::CONNECTION_FAILURE) => {
                tracing::error!("PostgreSQL connection error: {}", err);
                AppError::Database("Database connection unavailable".to_string())
            }
            _ => {
                tracing::error!("Unhandled PostgreSQL error: {} (code: {:?})", err, err.code());
                AppError::Database("Database operation failed".to_string())
            }
        }
    }
}

// Connection pool error mapping
impl From<deadpool_postgres::PoolError> for AppError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Timeout(_) => {
                tracing::warn!("Database connection pool timeout: {}", err);
                AppError::Database("Database connection timeout".to_string())
            }
            deadpool_postgres::PoolError::Closed => {
                tracing::error!("Database connection pool is closed: {}", err);
                AppError::Database("Database service unavailable".to_string())
            }
            _ => {
                tracing::error!("Database connection pool error: {}", err);
                AppError::Database("Database connection unavailable".to_string())
            }
        }
    }
}

impl From<askama::Error> for AppError {
    fn from(err: askama::Error) -> Self {
        AppError::Internal(anyhow::anyhow!("template rendering failed: {}", err))
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        AppError::Internal(anyhow::anyhow!("session error: {}", err))
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
