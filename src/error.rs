use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::catalogue::CatalogueError;
use crate::models::{BookableState, EnrolmentStatus};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Which uniqueness rule a duplicate submission ran into.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateScope {
    Course,
    Class,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{}", match .scope {
        DuplicateScope::Course => "Student is already enrolled in this course",
        DuplicateScope::Class => "Student is already enrolled in this class",
    })]
    DuplicateEnrolment { scope: DuplicateScope },

    #[error("{}", match .state {
        BookableState::FullyBooked => "This course is full",
        _ => "This course is not open for enrolment",
    })]
    CourseNotBookable { state: BookableState },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: EnrolmentStatus, to: EnrolmentStatus },

    #[error("Fields cannot change once classes exist: {}", .0.join(", "))]
    FrozenFields(Vec<&'static str>),

    #[error("Early bird deadline has passed; choose between quoted price {quoted} and regular price {regular}")]
    PriceDecisionRequired { quoted: Decimal, regular: Decimal },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error")]
    InternalServerError,
}

impl AppError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, details) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, None),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Some(serde_json::json!({ "fields": fields })),
            ),
            AppError::DuplicateEnrolment { scope } => (
                StatusCode::CONFLICT,
                Some(serde_json::json!({ "scope": scope })),
            ),
            AppError::CourseNotBookable { state } => (
                StatusCode::CONFLICT,
                Some(serde_json::json!({ "state": state })),
            ),
            AppError::InvalidStateTransition { from, to } => (
                StatusCode::CONFLICT,
                Some(serde_json::json!({ "from": from, "to": to })),
            ),
            AppError::FrozenFields(fields) => (
                StatusCode::CONFLICT,
                Some(serde_json::json!({ "fields": fields })),
            ),
            AppError::PriceDecisionRequired { quoted, regular } => (
                StatusCode::CONFLICT,
                Some(serde_json::json!({
                    "options": { "keep_quoted": quoted, "apply_regular": regular }
                })),
            ),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, None),
            AppError::Conflict(_) => (StatusCode::CONFLICT, None),
            AppError::Catalogue(e) => {
                error!("catalogue error: {}", e);
                (StatusCode::BAD_GATEWAY, None)
            }
            AppError::Database(e) => {
                error!("database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::Migration(e) => {
                error!("migration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::Config(_) | AppError::InternalServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let message = match &self {
            AppError::Database(_) => "Database error occurred".to_string(),
            _ => message,
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}
