use std::collections::BTreeSet;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::AuthError;
use crate::repository::{join_ids, RepositoryError};
use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<ValidationError>),

    #[error("Item {0} is not available")]
    NotAvailable(i64),

    #[error("Unknown categories: {}", join_ids(.0))]
    MissingCategories(BTreeSet<i64>),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Pool(e) => AppError::Pool(e),
            RepositoryError::Sql(e) => AppError::Database(e),
            RepositoryError::NotFound(_) => AppError::NotFound,
            RepositoryError::NotAvailable(id) => AppError::NotAvailable(id),
            RepositoryError::MissingCategories(ids) => AppError::MissingCategories(ids),
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            RepositoryError::InvalidAmount => {
                AppError::BadRequest("deposit out of range".to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidToken => AppError::Unauthorized,
            AuthError::UsernameTaken | AuthError::EmailTaken => {
                AppError::BadRequest(err.to_string())
            }
            AuthError::Hash(e) => AppError::Internal(e.to_string()),
            AuthError::Pool(e) => AppError::Pool(e),
            AuthError::Sql(e) => AppError::Database(e),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(vec![err])
    }
}

impl From<Vec<ValidationError>> for AppError {
    fn from(errs: Vec<ValidationError>) -> Self {
        AppError::Validation(errs)
    }
}

fn internal() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "Internal server error" }),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "Not found" })),
            AppError::Unauthorized => {
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Bearer")],
                    Json(json!({ "error": "Not authenticated" })),
                )
                    .into_response();
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Validation(errs) => {
                let detail: Vec<_> = errs
                    .iter()
                    .map(|e| json!({ "field": e.field(), "message": e.to_string() }))
                    .collect();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "error": "Validation failed", "detail": detail }),
                )
            }
            AppError::NotAvailable(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Item not available" }),
            ),
            AppError::MissingCategories(ids) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": self.to_string(), "missing": ids }),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                internal()
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                internal()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal()
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                internal()
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
