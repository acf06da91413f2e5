//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("unknown column '{column}' on entity '{entity}'")]
    UnknownColumn { entity: String, column: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("duplicate entity name: {0}")]
    DuplicateEntity(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("settings: {0}")]
    Settings(String),
}

/// Outcome vocabulary of the storage gateway. Constraint names are carried so
/// the service can tell which unique field or which reference failed.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("unique constraint violated: {}", .constraint.as_deref().unwrap_or("unnamed"))]
    UniqueViolation { constraint: Option<String> },
    #[error("foreign key constraint violated: {}", .constraint.as_deref().unwrap_or("unnamed"))]
    ForeignKeyViolation { constraint: Option<String> },
    #[error("no rows affected")]
    NotFound,
    #[error("database: {0}")]
    Db(#[source] sqlx::Error),
    #[error("storage backend: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Db(err)
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {message}")]
    Conflict {
        message: String,
        field: Option<String>,
    },
    #[error("referenced entity not found: {message}")]
    ReferencedEntityNotFound {
        message: String,
        column: Option<String>,
        entity: Option<String>,
    },
    #[error("identity is immutable: '{column}' cannot be changed")]
    IdentityImmutable { column: String },
    #[error("stale write: {0}")]
    StaleWrite(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AppError {
    /// Stable machine-readable code, also used as the `error.code` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict { .. } => "conflict",
            AppError::ReferencedEntityNotFound { .. } => "referenced_entity_not_found",
            AppError::IdentityImmutable { .. } => "identity_immutable",
            AppError::StaleWrite(_) => "stale_write",
            AppError::Validation(_) => "validation_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::Storage(StorageError::NotFound) => "not_found",
            AppError::Storage(_) => "storage_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ReferencedEntityNotFound { .. } => StatusCode::CONFLICT,
            AppError::IdentityImmutable { .. } => StatusCode::BAD_REQUEST,
            AppError::StaleWrite(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Conflict { field: Some(field), .. } => Some(serde_json::json!({ "field": field })),
            AppError::ReferencedEntityNotFound { column, entity, .. } if column.is_some() || entity.is_some() => {
                Some(serde_json::json!({ "column": column, "entity": entity }))
            }
            AppError::IdentityImmutable { column } => Some(serde_json::json!({ "field": column })),
            _ => None,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        (status, Json(body)).into_response()
    }
}
