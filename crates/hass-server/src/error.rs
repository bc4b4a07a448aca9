//! API error type and its HTTP mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hass_integrity::{AcknowledgeError, TransitionError};
use hass_shared::{ValidationError, ValidationFailed};
use serde::Serialize;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String, Vec<ValidationError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    /// A request the extractors could not decode, with axum's status
    #[error("{1}")]
    Rejected(StatusCode, String),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ValidationError>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(..) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Rejected(status, _) => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthorized() -> Self {
        AppError::Unauthorized("Could not validate credentials".to_string())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into(), Vec::new())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Internal(err) = &self {
            tracing::error!(error = ?err, "request failed");
        }
        let body = match self {
            AppError::Validation(detail, errors) => ErrorBody { detail, errors },
            other => ErrorBody {
                detail: other.to_string(),
                errors: Vec::new(),
            },
        };
        (status, Json(body)).into_response()
    }
}

macro_rules! from_rejection {
    ($($rejection:ty),+) => {
        $(impl From<$rejection> for AppError {
            fn from(rejection: $rejection) -> Self {
                AppError::Rejected(rejection.status(), rejection.body_text())
            }
        })+
    };
}

from_rejection!(JsonRejection, PathRejection, QueryRejection);

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, .. } => AppError::NotFound(kind.to_string()),
            StoreError::Duplicate(what) => AppError::Conflict(format!("{} already exists", what)),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::InvalidReference(kind) => {
                AppError::validation(format!("{} references a record that does not exist", kind))
            }
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<ValidationFailed> for AppError {
    fn from(err: ValidationFailed) -> Self {
        AppError::Validation(err.to_string(), err.errors)
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::Conflict(err.to_string())
    }
}

impl From<AcknowledgeError> for AppError {
    fn from(err: AcknowledgeError) -> Self {
        match err {
            AcknowledgeError::NoSuchEvent(index) => AppError::NotFound(format!("Event {}", index)),
            AcknowledgeError::NotRequired(_) => AppError::BadRequest(err.to_string()),
            AcknowledgeError::AlreadyAcknowledged(_) => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::from(err).into()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.into())
    }
}

pub type ApiResult<T> = Result<T, AppError>;
